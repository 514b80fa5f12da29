//! Target rate, derived period/budget, and performance bands.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCEPTABLE_RATIO, CRITICAL_RATIO, DROPPED_FRAME_RATIO, EXCELLENT_RATIO, FRAME_BUDGET_RATIO,
    GOOD_RATIO, POOR_RATIO,
};

/// Target rate and the values derived from it. Only [`FrameConfig::new`] and
/// [`FrameConfig::set_target_rate`] write these, so period, budget and
/// thresholds always agree with the rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameConfig {
    target_rate: f64,
    target_period: f64,
    frame_budget: f64,
    thresholds: Thresholds,
}

impl FrameConfig {
    pub fn new(target_rate: f64) -> Self {
        let target_period = 1000.0 / target_rate;
        Self {
            target_rate,
            target_period,
            frame_budget: FRAME_BUDGET_RATIO * target_period,
            thresholds: Thresholds::for_period(target_period),
        }
    }

    pub fn set_target_rate(&mut self, rate: f64) {
        *self = Self::new(rate);
    }

    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    /// Milliseconds per frame at the target rate.
    pub fn target_period(&self) -> f64 {
        self.target_period
    }

    /// Milliseconds per frame handed out to subsystems.
    pub fn frame_budget(&self) -> f64 {
        self.frame_budget
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn is_dropped(&self, duration_ms: f64) -> bool {
        duration_ms > DROPPED_FRAME_RATIO * self.target_period
    }
}

/// Band boundaries in ms.
///
/// `excellent`, `good` and `acceptable` are inclusive upper bounds of their
/// bands. Anything above `acceptable` is Poor up to and including
/// `critical`, and Critical beyond it, which is also where frames count as
/// dropped. `poor` is the early-warning line reported to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub excellent: f64,
    pub good: f64,
    pub acceptable: f64,
    pub poor: f64,
    pub critical: f64,
}

impl Thresholds {
    pub fn for_period(period: f64) -> Self {
        Self {
            excellent: EXCELLENT_RATIO * period,
            good: GOOD_RATIO * period,
            acceptable: ACCEPTABLE_RATIO * period,
            poor: POOR_RATIO * period,
            critical: CRITICAL_RATIO * period,
        }
    }

    pub fn classify(&self, frame_ms: f64) -> PerformanceBand {
        if frame_ms <= self.excellent {
            PerformanceBand::Excellent
        } else if frame_ms <= self.good {
            PerformanceBand::Good
        } else if frame_ms <= self.acceptable {
            PerformanceBand::Acceptable
        } else if frame_ms <= self.critical {
            PerformanceBand::Poor
        } else {
            PerformanceBand::Critical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Critical,
}

impl PerformanceBand {
    /// Poor or Critical.
    pub fn is_degraded(self) -> bool {
        self >= PerformanceBand::Poor
    }

    /// Excellent or Good.
    pub fn is_healthy(self) -> bool {
        self <= PerformanceBand::Good
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Poor => "poor",
            Self::Critical => "critical",
        }
    }
}
