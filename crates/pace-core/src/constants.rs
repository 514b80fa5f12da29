/// Nominal repaint rate in Hz.
pub const DEFAULT_TARGET_RATE: f64 = 60.0;

/// Rolling frame-time window length.
pub const DEFAULT_RING_SIZE: usize = 60;

/// Errors a subsystem may report before it is disabled for good.
pub const DEFAULT_MAX_SUBSYSTEM_ERRORS: u32 = 5;

/// Share of the target period handed out to subsystems.
pub const FRAME_BUDGET_RATIO: f64 = 0.8;

/// Band thresholds as multiples of the target period.
pub const EXCELLENT_RATIO: f64 = 0.6;
pub const GOOD_RATIO: f64 = 0.8;
pub const ACCEPTABLE_RATIO: f64 = 1.0;
pub const POOR_RATIO: f64 = 1.2;
pub const CRITICAL_RATIO: f64 = 1.5;

/// A frame longer than this multiple of the period counts as dropped.
pub const DROPPED_FRAME_RATIO: f64 = CRITICAL_RATIO;

/// Discrete quality ladder, lowest first.
pub const QUALITY_LADDER: [f64; 5] = [0.1, 0.25, 0.5, 0.75, 1.0];

/// Consecutive poor frames that force emergency mode.
pub const EMERGENCY_ENTER_STREAK: u32 = 5;

/// Consecutive good frames that end emergency mode.
pub const EMERGENCY_EXIT_STREAK: u32 = 30;

/// Consecutive good frames that earn one quality step up.
pub const QUALITY_STEP_UP_STREAK: u32 = 10;

/// Budget multiplier while thermally throttled.
pub const THERMAL_BUDGET_SCALE: f64 = 0.7;

/// Budget multiplier while in emergency mode.
pub const EMERGENCY_BUDGET_SCALE: f64 = 0.5;

/// Power-save target rate: `max(POWER_SAVE_MIN_RATE, POWER_SAVE_RATE_SCALE * rate)`.
pub const POWER_SAVE_RATE_SCALE: f64 = 0.6;
pub const POWER_SAVE_MIN_RATE: f64 = 30.0;

/// UI budget never scales below this fraction of its base.
pub const UI_BUDGET_FLOOR: f64 = 0.5;

/// Deferred tasks are skipped when less than this much budget remains (ms).
pub const MIN_TASK_WINDOW_MS: f64 = 0.5;

/// Share of the remaining budget the task drain may consume.
pub const TASK_WINDOW_RATIO: f64 = 0.8;

/// Default per-task time slice (ms).
pub const DEFAULT_TASK_MAX_TIME_MS: f64 = 2.0;

/// Invocations after which an always-incomplete task is dropped.
pub const MAX_TASK_ATTEMPTS: u32 = 5;

/// Subsystem name under which task failures are reported.
pub const TASK_SCHEDULER_SUBSYSTEM: &str = "task_scheduler";

/// Sampler defaults.
pub const DEFAULT_SAMPLE_INTERVAL_MS: f64 = 1000.0;
pub const DEFAULT_MAX_SAMPLES: usize = 300;

/// Samples included in a performance report.
pub const REPORT_RECENT_SAMPLES: usize = 10;

/// Health score: stddev (ms) at which the variance term reaches zero.
pub const HEALTH_STDDEV_SPAN_MS: f64 = 5.0;

/// Health score: weight of the drop rate.
pub const HEALTH_DROP_WEIGHT: f64 = 10.0;

/// Health score: multiplier applied while in emergency mode.
pub const HEALTH_EMERGENCY_FACTOR: f64 = 0.3;

/// Health score: penalty per disabled subsystem.
pub const HEALTH_DISABLED_PENALTY: f64 = 0.1;
