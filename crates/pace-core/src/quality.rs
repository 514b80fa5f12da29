//! Discrete quality ladder and the renderer-facing dials derived from it.
//!
//! The controller only tracks an index into [`QUALITY_LADDER`]. The scalar
//! level, the [`QualitySettings`] dials, and the feature gates are all pure
//! functions of that index, so two cores at the same index always hand the
//! renderer identical settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::QUALITY_LADDER;

/// Saturating position on the quality ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityController {
    index: usize,
}

/// A level change produced by a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityChange {
    pub from: f64,
    pub to: f64,
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityController {
    /// Starts at the top of the ladder.
    pub fn new() -> Self {
        Self {
            index: Self::max_index(),
        }
    }

    pub const fn max_index() -> usize {
        QUALITY_LADDER.len() - 1
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn level(&self) -> f64 {
        QUALITY_LADDER[self.index]
    }

    pub fn settings(&self) -> QualitySettings {
        QualitySettings::for_level(self.level())
    }

    /// Move one rung up. `None` when already at the top.
    pub fn step_up(&mut self) -> Option<QualityChange> {
        self.set_index((self.index + 1).min(Self::max_index()))
    }

    /// Move one rung down. `None` when already at the bottom.
    pub fn step_down(&mut self) -> Option<QualityChange> {
        self.set_index(self.index.saturating_sub(1))
    }

    /// Jump straight to the lowest rung.
    pub fn force_minimum(&mut self) -> Option<QualityChange> {
        self.set_index(0)
    }

    fn set_index(&mut self, index: usize) -> Option<QualityChange> {
        if index == self.index {
            return None;
        }
        let from = self.level();
        self.index = index;
        Some(QualityChange {
            from,
            to: self.level(),
        })
    }
}

/// Renderer dials, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    pub node_count: f64,
    pub geometry_detail: f64,
    pub shadow_quality: f64,
    pub antialiasing: f64,
    pub effects_intensity: f64,
    pub animation_smoothing: f64,
}

impl QualitySettings {
    pub fn for_level(level: f64) -> Self {
        let node_count = if level < 0.3 {
            2.0 * level
        } else {
            (0.6 + 0.4 * level).min(1.0)
        };
        let shadow_quality = if level < 0.5 { 0.0 } else { level * level };
        let antialiasing = if level < 0.25 {
            0.0
        } else if level < 0.5 {
            0.5
        } else {
            1.0
        };
        Self {
            node_count,
            geometry_detail: level.powf(1.5),
            shadow_quality,
            antialiasing,
            effects_intensity: level,
            animation_smoothing: level.max(0.2),
        }
    }

    /// Whether `feature` clears its threshold at these settings.
    pub fn should_enable(&self, feature: Feature) -> bool {
        self.dial(feature) >= feature.threshold()
    }

    fn dial(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Shadows => self.shadow_quality,
            Feature::Antialiasing => self.antialiasing,
            Feature::PostProcessing | Feature::ParticleEffects => self.effects_intensity,
            Feature::Reflections => self.geometry_detail,
        }
    }
}

/// Optional renderer features gated on quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Shadows,
    Antialiasing,
    PostProcessing,
    ParticleEffects,
    Reflections,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Shadows,
        Feature::Antialiasing,
        Feature::PostProcessing,
        Feature::ParticleEffects,
        Feature::Reflections,
    ];

    pub fn threshold(self) -> f64 {
        match self {
            Feature::Shadows => 0.5,
            Feature::Antialiasing => 0.25,
            Feature::PostProcessing => 0.3,
            Feature::ParticleEffects => 0.4,
            Feature::Reflections => 0.7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::Shadows => "shadows",
            Feature::Antialiasing => "antialiasing",
            Feature::PostProcessing => "postprocessing",
            Feature::ParticleEffects => "particle_effects",
            Feature::Reflections => "reflections",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shadows" => Ok(Feature::Shadows),
            "antialiasing" => Ok(Feature::Antialiasing),
            "postprocessing" | "post_processing" => Ok(Feature::PostProcessing),
            "particleeffects" | "particle_effects" => Ok(Feature::ParticleEffects),
            "reflections" => Ok(Feature::Reflections),
            other => Err(format!("unknown feature '{other}'")),
        }
    }
}
