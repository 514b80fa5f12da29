//! Unit-interval health score.
//!
//! Rate, jitter and drop rate multiply together, so one bad factor pulls the
//! whole score down. Emergency mode scales the product; each disabled
//! subsystem subtracts a flat penalty afterwards.

use crate::constants::{
    HEALTH_DISABLED_PENALTY, HEALTH_DROP_WEIGHT, HEALTH_EMERGENCY_FACTOR, HEALTH_STDDEV_SPAN_MS,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInputs {
    pub current_rate: f64,
    pub target_rate: f64,
    pub stddev: f64,
    pub dropped_frames: u64,
    pub total_frames: u64,
    pub emergency: bool,
    pub disabled_subsystems: usize,
}

pub fn health_score(inputs: &HealthInputs) -> f64 {
    let fps_ratio = (inputs.current_rate / inputs.target_rate).min(1.0);
    let variance_term = (1.0 - inputs.stddev / HEALTH_STDDEV_SPAN_MS).max(0.0);
    let drop_term = if inputs.total_frames == 0 {
        1.0
    } else {
        let drop_rate = inputs.dropped_frames as f64 / inputs.total_frames as f64;
        (1.0 - HEALTH_DROP_WEIGHT * drop_rate).max(0.0)
    };
    let emergency_factor = if inputs.emergency {
        HEALTH_EMERGENCY_FACTOR
    } else {
        1.0
    };
    let penalty = HEALTH_DISABLED_PENALTY * inputs.disabled_subsystems as f64;

    let score = fps_ratio * variance_term * drop_term * emergency_factor - penalty;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}
