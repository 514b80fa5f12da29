//! Frame pacing core for soft-real-time render loops.
//!
//! Measures frame health against a target rate, enforces per-subsystem time
//! budgets inside each frame, walks a discrete quality ladder up and down,
//! drops into an emergency mode when the loop degrades, and drains deferred
//! work from whatever budget is left over.
//!
//! Single-threaded and host-driven: the core never sleeps, spawns, or reads
//! wall time except through its injected [`Clock`].

pub mod alert;
pub mod budget;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod health;
pub mod metrics;
pub mod mode;
pub mod monitor;
pub mod performance;
pub mod quality;
pub mod report;
pub mod tasks;
pub mod timer;

pub use alert::{Alert, AlertBus, AlertEvent, AlertKind, ListenerId};
pub use budget::BudgetTable;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BandSource, CoreConfig, MonitorConfig, StreakConfig};
pub use constants::{QUALITY_LADDER, TASK_SCHEDULER_SUBSYSTEM};
pub use error::{ConfigError, FrameError, TaskError};
pub use frame::{FrameConfig, PerformanceBand, Thresholds};
pub use health::{HealthInputs, health_score};
pub use metrics::{FrameMetrics, MetricsSnapshot};
pub use mode::{Decision, ModeFlags, StreakTracker};
pub use monitor::{Sample, Sampler};
pub use performance::{FrameInfo, PerformanceCore};
pub use quality::{Feature, QualityChange, QualityController, QualitySettings};
pub use report::PerformanceReport;
pub use tasks::{DrainReport, SchedulerStats, TaskPriority, TaskResult, TaskScheduler, TaskStatus};
pub use timer::{SubsystemReport, SubsystemTimer};
