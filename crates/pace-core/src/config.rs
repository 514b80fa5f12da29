//! Construction parameters for [`PerformanceCore`](crate::PerformanceCore).
//!
//! Every field has a default, so a TOML file only needs to name what it
//! changes:
//!
//! ```toml
//! target_rate = 120.0
//! critical_subsystems = ["rendering"]
//!
//! [base_budgets]
//! rendering = 4.0
//!
//! [streaks]
//! exit_emergency = 60
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_SAMPLES, DEFAULT_MAX_SUBSYSTEM_ERRORS, DEFAULT_RING_SIZE,
    DEFAULT_SAMPLE_INTERVAL_MS, DEFAULT_TARGET_RATE, EMERGENCY_ENTER_STREAK,
    EMERGENCY_EXIT_STREAK, QUALITY_STEP_UP_STREAK,
};
use crate::error::ConfigError;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Base per-subsystem budgets in milliseconds at full quality.
pub const DEFAULT_BASE_BUDGETS: [(&str, f64); 6] = [
    ("consciousness", 2.0),
    ("animation", 4.0),
    ("rendering", 8.0),
    ("ui", 1.0),
    ("networking", 0.5),
    ("overhead", 1.17),
];

/// Subsystems still allowed to run in emergency mode.
pub const DEFAULT_CRITICAL_SUBSYSTEMS: [&str; 2] = ["rendering", "consciousness"];

/// Which frame-time figure the evaluation step classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSource {
    /// Duration of the frame that just ended.
    #[default]
    LastFrame,
    /// Average over the rolling window.
    Average,
}

/// Streak lengths driving the quality/emergency state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreakConfig {
    pub enter_emergency: u32,
    pub exit_emergency: u32,
    pub step_up: u32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            enter_emergency: EMERGENCY_ENTER_STREAK,
            exit_emergency: EMERGENCY_EXIT_STREAK,
            step_up: QUALITY_STEP_UP_STREAK,
        }
    }
}

/// Sampler settings used when monitoring is switched on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Start sampling immediately at construction.
    pub enabled: bool,
    pub interval_ms: f64,
    pub max_samples: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub target_rate: f64,
    pub ring_size: usize,
    pub max_subsystem_errors: u32,
    pub critical_subsystems: Vec<String>,
    pub band_source: BandSource,
    pub base_budgets: BTreeMap<String, f64>,
    pub streaks: StreakConfig,
    pub monitoring: MonitorConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            target_rate: DEFAULT_TARGET_RATE,
            ring_size: DEFAULT_RING_SIZE,
            max_subsystem_errors: DEFAULT_MAX_SUBSYSTEM_ERRORS,
            critical_subsystems: DEFAULT_CRITICAL_SUBSYSTEMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            band_source: BandSource::default(),
            base_budgets: DEFAULT_BASE_BUDGETS
                .iter()
                .map(|(name, ms)| (name.to_string(), *ms))
                .collect(),
            streaks: StreakConfig::default(),
            monitoring: MonitorConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML. Only fails if a budget name cannot be a TOML key,
    /// which never happens for string keys.
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn with_target_rate(mut self, rate: f64) -> Self {
        self.target_rate = rate;
        self
    }

    pub fn with_ring_size(mut self, size: usize) -> Self {
        self.ring_size = size;
        self
    }

    pub fn with_band_source(mut self, source: BandSource) -> Self {
        self.band_source = source;
        self
    }

    pub fn with_budget(mut self, name: &str, ms: f64) -> Self {
        self.base_budgets.insert(name.to_string(), ms);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_rate.is_finite() || self.target_rate <= 0.0 {
            return Err(ConfigError::InvalidTargetRate(self.target_rate));
        }
        if self.ring_size == 0 {
            return Err(ConfigError::EmptyRing);
        }
        if self.max_subsystem_errors == 0 {
            return Err(ConfigError::ZeroErrorLimit);
        }
        for (name, &value) in &self.base_budgets {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidBudget {
                    name: name.clone(),
                    value,
                });
            }
        }
        if self.streaks.enter_emergency == 0 {
            return Err(ConfigError::ZeroStreak("enter_emergency"));
        }
        if self.streaks.exit_emergency == 0 {
            return Err(ConfigError::ZeroStreak("exit_emergency"));
        }
        if self.streaks.step_up == 0 {
            return Err(ConfigError::ZeroStreak("step_up"));
        }
        validate_monitoring(self.monitoring.interval_ms, self.monitoring.max_samples)
    }
}

pub(crate) fn validate_monitoring(interval_ms: f64, max_samples: usize) -> Result<()> {
    if !interval_ms.is_finite() || interval_ms <= 0.0 {
        return Err(ConfigError::InvalidMonitoring(format!(
            "interval must be positive, got {interval_ms}"
        )));
    }
    if max_samples == 0 {
        return Err(ConfigError::InvalidMonitoring(
            "max_samples must be at least 1".into(),
        ));
    }
    Ok(())
}
