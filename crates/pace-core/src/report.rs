use std::collections::BTreeMap;

use serde::Serialize;

use crate::alert::AlertKind;
use crate::frame::{PerformanceBand, Thresholds};
use crate::metrics::MetricsSnapshot;
use crate::mode::ModeFlags;
use crate::monitor::Sample;
use crate::quality::QualitySettings;
use crate::tasks::SchedulerStats;
use crate::timer::SubsystemTimer;

/// Point-in-time snapshot of the whole core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub timestamp: f64,
    pub frame_number: u64,
    pub target_rate: f64,
    pub target_period: f64,
    pub frame_budget: f64,
    pub thresholds: Thresholds,
    pub metrics: MetricsSnapshot,
    pub last_band: Option<PerformanceBand>,
    pub quality_level: f64,
    pub quality_settings: QualitySettings,
    pub mode: ModeFlags,
    pub budgets: BTreeMap<String, f64>,
    /// Timers of the most recently completed frame.
    pub last_frame: Vec<SubsystemTimer>,
    pub disabled_subsystems: Vec<String>,
    pub error_counts: BTreeMap<String, u32>,
    pub last_errors: BTreeMap<String, String>,
    pub budget_exceedances: BTreeMap<String, u64>,
    pub recent_samples: Vec<Sample>,
    pub scheduler: SchedulerStats,
    pub alert_counts: BTreeMap<AlertKind, u64>,
    pub health_score: f64,
}

impl PerformanceReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Short human-readable summary, one fact per line.
    pub fn summary(&self) -> String {
        let mode = if self.mode.emergency {
            "emergency"
        } else {
            "normal"
        };
        let mut out = String::new();
        out.push_str(&format!("frames:     {}\n", self.metrics.total_frames));
        out.push_str(&format!(
            "rate:       {:.1} / {:.1} Hz\n",
            self.metrics.current_rate, self.target_rate
        ));
        out.push_str(&format!(
            "frame time: {:.2} ms avg, {:.2} ms stddev\n",
            self.metrics.average, self.metrics.stddev
        ));
        out.push_str(&format!("dropped:    {}\n", self.metrics.dropped_frames));
        out.push_str(&format!("quality:    {:.2}\n", self.quality_level));
        out.push_str(&format!("mode:       {mode}\n"));
        out.push_str(&format!(
            "thermal:    {}\npower save: {}\n",
            self.mode.thermal_throttling, self.mode.power_save
        ));
        if !self.disabled_subsystems.is_empty() {
            out.push_str(&format!(
                "disabled:   {}\n",
                self.disabled_subsystems.join(", ")
            ));
        }
        out.push_str(&format!(
            "tasks:      {} completed, {} queued, {} dropped, {} failed\n",
            self.scheduler.completed,
            self.scheduler.queued,
            self.scheduler.dropped,
            self.scheduler.failed
        ));
        out.push_str(&format!("health:     {:.3}\n", self.health_score));
        out
    }
}
