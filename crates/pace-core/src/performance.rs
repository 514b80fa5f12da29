//! [`PerformanceCore`]: the frame loop's single point of contact.
//!
//! Per frame the host calls [`PerformanceCore::frame_begin`], brackets each
//! required subsystem with [`subsystem_begin`](PerformanceCore::subsystem_begin)
//! / [`subsystem_end`](PerformanceCore::subsystem_end), then spends what is
//! left on [`process_tasks`](PerformanceCore::process_tasks). Everything runs
//! on the caller's thread; alerts are delivered before the emitting call
//! returns.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use serde::Serialize;

use crate::alert::{Alert, AlertBus, AlertEvent, ListenerId};
use crate::budget::BudgetTable;
use crate::clock::{Clock, MonotonicClock};
use crate::config::{self, BandSource, CoreConfig};
use crate::constants::{
    DEFAULT_TASK_MAX_TIME_MS, POWER_SAVE_MIN_RATE, POWER_SAVE_RATE_SCALE, REPORT_RECENT_SAMPLES,
    TASK_SCHEDULER_SUBSYSTEM, THERMAL_BUDGET_SCALE,
};
use crate::error::FrameError;
use crate::frame::{FrameConfig, PerformanceBand};
use crate::health::{HealthInputs, health_score};
use crate::metrics::FrameMetrics;
use crate::mode::{Decision, ModeFlags, StreakTracker};
use crate::monitor::{Sample, Sampler};
use crate::quality::{Feature, QualityChange, QualityController, QualitySettings};
use crate::report::PerformanceReport;
use crate::tasks::{DrainReport, SchedulerStats, TaskPriority, TaskResult, TaskScheduler};
use crate::timer::{FrameTimers, SubsystemReport, SubsystemTimer};

/// Returned by [`PerformanceCore::frame_begin`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameInfo {
    pub frame_number: u64,
    /// Milliseconds available to subsystems this frame.
    pub budget: f64,
    pub quality_level: f64,
    pub emergency_mode: bool,
}

pub struct PerformanceCore {
    config: CoreConfig,
    clock: Box<dyn Clock>,
    frame: FrameConfig,
    metrics: FrameMetrics,
    quality: QualityController,
    budgets: BudgetTable,
    flags: ModeFlags,
    streaks: StreakTracker,
    timers: FrameTimers,
    last_frame: Vec<SubsystemTimer>,
    frame_number: u64,
    frame_start: f64,
    last_frame_time: Option<f64>,
    last_band: Option<PerformanceBand>,
    critical: BTreeSet<String>,
    disabled: BTreeSet<String>,
    error_counts: BTreeMap<String, u32>,
    last_errors: BTreeMap<String, String>,
    exceedances: BTreeMap<String, u64>,
    tasks: TaskScheduler,
    sampler: Sampler,
    alerts: AlertBus,
}

impl fmt::Debug for PerformanceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceCore")
            .field("frame_number", &self.frame_number)
            .field("target_rate", &self.frame.target_rate())
            .field("quality_level", &self.quality.level())
            .field("flags", &self.flags)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl PerformanceCore {
    /// Build a core on the real monotonic clock.
    pub fn new(config: CoreConfig) -> config::Result<Self> {
        Self::with_clock(config, Box::new(MonotonicClock::new()))
    }

    /// Build a core on an injected clock (replays, tests, custom hosts).
    pub fn with_clock(config: CoreConfig, clock: Box<dyn Clock>) -> config::Result<Self> {
        config.validate()?;
        let frame = FrameConfig::new(config.target_rate);
        let quality = QualityController::new();
        let mut budgets = BudgetTable::new(config.base_budgets.clone());
        budgets.rescale(quality.level(), false, false);
        let now = clock.now_ms();

        Ok(Self {
            metrics: FrameMetrics::new(config.ring_size, frame.target_period()),
            streaks: StreakTracker::new(config.streaks.clone()),
            critical: config.critical_subsystems.iter().cloned().collect(),
            sampler: Sampler::new(&config.monitoring),
            frame,
            quality,
            budgets,
            clock,
            flags: ModeFlags::default(),
            timers: FrameTimers::default(),
            last_frame: Vec::new(),
            frame_number: 0,
            frame_start: now,
            last_frame_time: None,
            last_band: None,
            disabled: BTreeSet::new(),
            error_counts: BTreeMap::new(),
            last_errors: BTreeMap::new(),
            exceedances: BTreeMap::new(),
            tasks: TaskScheduler::new(),
            alerts: AlertBus::new(),
            config,
        })
    }

    // -----------------------------------------------------------------------
    // Frame API
    // -----------------------------------------------------------------------

    /// Mark the start of a frame. Call exactly once at the top of every frame.
    pub fn frame_begin(&mut self) -> FrameInfo {
        let now = self.clock.now_ms();

        let mut measured = None;
        if let Some(last) = self.last_frame_time {
            let duration = now - last;
            if duration < 0.0 {
                self.invariant_violation(format!(
                    "frame duration {duration:.3}ms is negative; clock went backwards"
                ));
            } else {
                let dropped = self.frame.is_dropped(duration);
                self.metrics.record(duration, dropped);
                if dropped {
                    tracing::debug!(frame = self.frame_number, duration, "dropped frame");
                }
                measured = Some(duration);
            }
        }

        self.last_frame_time = Some(now);
        self.frame_start = now;
        self.frame_number += 1;
        self.last_frame = self.timers.iter().cloned().collect();
        self.timers.clear();

        if let Some(duration) = measured {
            let figure = match self.config.band_source {
                BandSource::LastFrame => duration,
                BandSource::Average => self.metrics.average(),
            };
            self.evaluate(figure);
        }

        self.tick_sampler(now);

        FrameInfo {
            frame_number: self.frame_number,
            budget: self.frame.frame_budget(),
            quality_level: self.quality.level(),
            emergency_mode: self.flags.emergency,
        }
    }

    /// Start timing `name`. `None` when the subsystem is disabled.
    pub fn subsystem_begin(&mut self, name: &str) -> Option<SubsystemTimer> {
        if self.disabled.contains(name) {
            tracing::trace!(subsystem = name, "begin on disabled subsystem ignored");
            return None;
        }
        let now = self.clock.now_ms();
        let (timer, replaced) = self.timers.begin(name, now);
        if replaced {
            tracing::warn!(subsystem = name, "subsystem timer restarted within one frame");
            self.emit(AlertEvent::TimerOverwritten {
                subsystem: name.to_string(),
            });
        }
        Some(timer)
    }

    /// Stop timing `name` and check it against its budget.
    pub fn subsystem_end(&mut self, name: &str) -> Result<SubsystemReport, FrameError> {
        let now = self.clock.now_ms();
        let budget = self.budgets.get(name);
        let Some(report) = self.timers.end(name, now, budget) else {
            tracing::warn!(subsystem = name, "subsystem_end without a running timer");
            return Err(FrameError::TimerMissing(name.to_string()));
        };

        if report.exceeded {
            *self.exceedances.entry(name.to_string()).or_default() += 1;
            tracing::debug!(
                subsystem = name,
                duration = report.duration,
                budget,
                "subsystem over budget"
            );
            self.emit(AlertEvent::BudgetExceeded {
                subsystem: name.to_string(),
                duration: report.duration,
                budget,
            });
        }
        Ok(report)
    }

    /// Run `f` bracketed by begin/end for `name`. The timer is closed even if
    /// `f` panics; the panic then continues unwinding. `None` when `name` is
    /// disabled, in which case `f` is not called.
    pub fn with_subsystem<R>(
        &mut self,
        name: &str,
        f: impl FnOnce() -> R,
    ) -> Option<(R, SubsystemReport)> {
        self.subsystem_begin(name)?;
        let outcome = catch_unwind(AssertUnwindSafe(f));
        // `f` cannot reach the core, so the timer begun above is still running.
        let report = self.subsystem_end(name).ok();
        match outcome {
            Ok(value) => report.map(|report| (value, report)),
            Err(payload) => resume_unwind(payload),
        }
    }

    /// Whether `name` may start more work this frame.
    pub fn can_continue(&self, name: &str) -> bool {
        if self.disabled.contains(name) {
            return false;
        }
        if self.flags.emergency && !self.critical.contains(name) {
            return false;
        }
        self.remaining_budget() >= self.budgets.get(name)
    }

    /// Milliseconds of frame budget left, never negative.
    pub fn remaining_budget(&self) -> f64 {
        let elapsed = self.clock.now_ms() - self.frame_start;
        (self.frame.frame_budget() - elapsed).max(0.0)
    }

    // -----------------------------------------------------------------------
    // Mode API
    // -----------------------------------------------------------------------

    pub fn trigger_emergency_mode(&mut self, reason: &str) {
        self.enter_emergency(reason.to_string());
    }

    pub fn set_thermal_throttling(&mut self, on: bool, temperature: Option<f64>) {
        if temperature.is_some() {
            self.flags.temperature = temperature;
        }
        if on == self.flags.thermal_throttling {
            return;
        }
        self.flags.thermal_throttling = on;

        if on {
            tracing::warn!(?temperature, "thermal throttling engaged");
            self.budgets.scale_all(THERMAL_BUDGET_SCALE);
            // The forced step adjusts the dials only; budgets were scaled above.
            if self.quality.index() > 1
                && let Some(change) = self.quality.step_down()
            {
                self.announce_quality(change);
            }
        } else {
            tracing::info!(?temperature, "thermal throttling released");
            self.rescale_budgets();
        }
        self.emit(AlertEvent::ThermalThrottling {
            active: on,
            temperature: self.flags.temperature,
        });
    }

    pub fn set_power_save_mode(&mut self, on: bool, battery_level: Option<f64>) {
        if let Some(level) = battery_level {
            self.flags.battery_level = Some(level.clamp(0.0, 1.0));
        }
        if on == self.flags.power_save {
            return;
        }
        self.flags.power_save = on;

        if on {
            let rate = (POWER_SAVE_RATE_SCALE * self.frame.target_rate()).max(POWER_SAVE_MIN_RATE);
            self.frame.set_target_rate(rate);
            tracing::info!(
                target_rate = rate,
                battery = ?self.flags.battery_level,
                "power save engaged"
            );
            self.step_quality_down();
        } else {
            self.frame.set_target_rate(self.config.target_rate);
            tracing::info!(target_rate = self.config.target_rate, "power save released");
        }
        self.emit(AlertEvent::PowerSaveMode {
            active: on,
            battery_level: self.flags.battery_level,
            target_rate: self.frame.target_rate(),
        });
    }

    /// Count an error against `name`, disabling it once the limit is hit.
    /// Disabled subsystems stay disabled for the life of the core.
    pub fn report_subsystem_error(&mut self, name: &str, error: impl fmt::Display) {
        let message = error.to_string();
        let count = {
            let count = self.error_counts.entry(name.to_string()).or_default();
            *count += 1;
            *count
        };
        tracing::warn!(subsystem = name, count, error = %message, "subsystem error");
        self.last_errors.insert(name.to_string(), message.clone());

        if count >= self.config.max_subsystem_errors && self.disabled.insert(name.to_string()) {
            tracing::error!(subsystem = name, count, "subsystem disabled");
            self.emit(AlertEvent::SubsystemDisabled {
                subsystem: name.to_string(),
                error_count: count,
                last_error: message,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Quality API
    // -----------------------------------------------------------------------

    pub fn quality_level(&self) -> f64 {
        self.quality.level()
    }

    pub fn quality_index(&self) -> usize {
        self.quality.index()
    }

    pub fn quality_settings(&self) -> QualitySettings {
        self.quality.settings()
    }

    pub fn should_enable(&self, feature: Feature) -> bool {
        self.quality.settings().should_enable(feature)
    }

    // -----------------------------------------------------------------------
    // Task API
    // -----------------------------------------------------------------------

    /// Queue a job at normal priority with the default time slice.
    pub fn schedule(&mut self, id: impl Into<String>, job: impl FnMut() -> TaskResult + 'static) {
        self.tasks
            .schedule(id, TaskPriority::Normal, DEFAULT_TASK_MAX_TIME_MS, job);
    }

    pub fn schedule_with(
        &mut self,
        id: impl Into<String>,
        priority: TaskPriority,
        max_time: f64,
        job: impl FnMut() -> TaskResult + 'static,
    ) {
        self.tasks.schedule(id, priority, max_time, job);
    }

    /// Drain deferred work from the leftover budget. Call after the required
    /// subsystems of the frame have ended. Only critical tasks run in
    /// emergency mode, and nothing runs once the task scheduler itself has
    /// been disabled. Each failed job counts against the scheduler before the
    /// next one starts, so the drain stops as soon as that disables it.
    pub fn process_tasks(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        if self.disabled.contains(TASK_SCHEDULER_SUBSYSTEM) {
            return report;
        }
        let Some(deadline) = TaskScheduler::window_end(self.clock.as_ref(), self.remaining_budget())
        else {
            return report;
        };
        let lowest = if self.flags.emergency {
            TaskPriority::Critical
        } else {
            TaskPriority::Idle
        };

        while self
            .tasks
            .drain_until(self.clock.as_ref(), deadline, lowest, &mut report)
        {
            if let Some((id, error)) = report.failures.last() {
                let message = format!("task '{id}': {error}");
                self.report_subsystem_error(TASK_SCHEDULER_SUBSYSTEM, message);
            }
            if self.disabled.contains(TASK_SCHEDULER_SUBSYSTEM) {
                tracing::warn!(
                    queued = self.tasks.len(),
                    "task scheduler disabled mid-drain; leaving the rest queued"
                );
                break;
            }
        }
        report
    }

    pub fn clear_completed(&mut self) {
        self.tasks.clear_completed();
    }

    pub fn is_task_completed(&self, id: &str) -> bool {
        self.tasks.is_completed(id)
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.tasks.stats()
    }

    // -----------------------------------------------------------------------
    // Observability
    // -----------------------------------------------------------------------

    pub fn on_alert(&mut self, listener: impl FnMut(&Alert) + 'static) -> ListenerId {
        self.alerts.subscribe(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.alerts.unsubscribe(id)
    }

    pub fn alerts(&self) -> &AlertBus {
        &self.alerts
    }

    pub fn start_monitoring(&mut self, interval_ms: f64, max_samples: usize) -> config::Result<()> {
        self.sampler.start(interval_ms, max_samples)
    }

    pub fn stop_monitoring(&mut self) {
        self.sampler.stop();
    }

    pub fn samples(&self, n: usize) -> Vec<Sample> {
        self.sampler.recent(n)
    }

    pub fn health_score(&self) -> f64 {
        health_score(&HealthInputs {
            current_rate: self.metrics.current_rate(),
            target_rate: self.frame.target_rate(),
            stddev: self.metrics.stddev(),
            dropped_frames: self.metrics.dropped_frames(),
            total_frames: self.metrics.total_frames(),
            emergency: self.flags.emergency,
            disabled_subsystems: self.disabled.len(),
        })
    }

    pub fn performance_report(&self) -> PerformanceReport {
        PerformanceReport {
            timestamp: self.clock.now_ms(),
            frame_number: self.frame_number,
            target_rate: self.frame.target_rate(),
            target_period: self.frame.target_period(),
            frame_budget: self.frame.frame_budget(),
            thresholds: *self.frame.thresholds(),
            metrics: self.metrics.snapshot(),
            last_band: self.last_band,
            quality_level: self.quality.level(),
            quality_settings: self.quality.settings(),
            mode: self.flags,
            budgets: self.budgets.active().clone(),
            last_frame: self.last_frame.clone(),
            disabled_subsystems: self.disabled.iter().cloned().collect(),
            error_counts: self.error_counts.clone(),
            last_errors: self.last_errors.clone(),
            budget_exceedances: self.exceedances.clone(),
            recent_samples: self.sampler.recent(REPORT_RECENT_SAMPLES),
            scheduler: self.tasks.stats(),
            alert_counts: self.alerts.counts().clone(),
            health_score: self.health_score(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn frame_config(&self) -> &FrameConfig {
        &self.frame
    }

    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    pub fn mode(&self) -> ModeFlags {
        self.flags
    }

    pub fn is_emergency(&self) -> bool {
        self.flags.emergency
    }

    pub fn budget(&self, name: &str) -> f64 {
        self.budgets.get(name)
    }

    pub fn budgets(&self) -> &BTreeMap<String, f64> {
        self.budgets.active()
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }

    pub fn error_count(&self, name: &str) -> u32 {
        self.error_counts.get(name).copied().unwrap_or(0)
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn last_band(&self) -> Option<PerformanceBand> {
        self.last_band
    }

    pub fn streaks(&self) -> &StreakTracker {
        &self.streaks
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn evaluate(&mut self, frame_ms: f64) {
        let band = self.frame.thresholds().classify(frame_ms);
        self.last_band = Some(band);

        match self.streaks.observe(band, self.flags.emergency) {
            Decision::Hold => {}
            Decision::StepDown => self.step_quality_down(),
            Decision::StepUp => {
                if let Some(change) = self.quality.step_up() {
                    self.rescale_budgets();
                    self.announce_quality(change);
                }
            }
            Decision::EnterEmergency => {
                let reason = format!(
                    "{} consecutive {} frames",
                    self.streaks.limits().enter_emergency,
                    band.label()
                );
                self.enter_emergency(reason);
            }
            Decision::ExitEmergency => self.exit_emergency(),
        }
    }

    fn step_quality_down(&mut self) {
        if let Some(change) = self.quality.step_down() {
            self.rescale_budgets();
            self.announce_quality(change);
        }
    }

    fn enter_emergency(&mut self, reason: String) {
        if self.flags.emergency {
            return;
        }
        self.flags.emergency = true;
        self.streaks.reset();
        let change = self.quality.force_minimum();
        self.rescale_budgets();
        if let Some(change) = change {
            self.announce_quality(change);
        }
        tracing::warn!(
            %reason,
            average = self.metrics.average(),
            rate = self.metrics.current_rate(),
            "entering emergency mode"
        );
        self.emit(AlertEvent::EmergencyMode {
            reason,
            average_frame_time: self.metrics.average(),
            current_rate: self.metrics.current_rate(),
        });
    }

    fn exit_emergency(&mut self) {
        self.flags.emergency = false;
        self.rescale_budgets();
        tracing::info!(
            average = self.metrics.average(),
            rate = self.metrics.current_rate(),
            "leaving emergency mode"
        );
        self.emit(AlertEvent::EmergencyModeExit {
            average_frame_time: self.metrics.average(),
            current_rate: self.metrics.current_rate(),
        });
    }

    fn rescale_budgets(&mut self) {
        self.budgets.rescale(
            self.quality.level(),
            self.flags.thermal_throttling,
            self.flags.emergency,
        );
    }

    fn announce_quality(&mut self, change: QualityChange) {
        tracing::info!(from = change.from, to = change.to, "quality changed");
        self.emit(AlertEvent::QualityChanged {
            from: change.from,
            to: change.to,
        });
    }

    fn tick_sampler(&mut self, now: f64) {
        if !self.sampler.due(now) {
            return;
        }
        let sample = Sample {
            timestamp: now,
            rate: self.metrics.current_rate(),
            frame_time: self.metrics.average(),
            level: self.quality.level(),
            emergency: self.flags.emergency,
            thermal: self.flags.thermal_throttling,
            power_save: self.flags.power_save,
            health_score: self.health_score(),
        };
        self.sampler.record(sample);
    }

    /// Fatal in debug builds; an alert in release builds.
    fn invariant_violation(&mut self, detail: String) {
        if cfg!(debug_assertions) {
            panic!("invariant violated: {detail}");
        }
        tracing::error!(%detail, "invariant violated");
        self.emit(AlertEvent::InvariantViolation { detail });
    }

    fn emit(&mut self, event: AlertEvent) {
        let now = self.clock.now_ms();
        self.alerts.emit(now, event);
    }
}
