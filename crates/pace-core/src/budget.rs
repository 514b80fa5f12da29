use std::collections::BTreeMap;

use crate::constants::{EMERGENCY_BUDGET_SCALE, THERMAL_BUDGET_SCALE, UI_BUDGET_FLOOR};

/// Per-subsystem time budgets: immutable base values plus the active table
/// the frame loop checks against.
///
/// Each entry caps one subsystem. The entries are not required to fit inside
/// the frame budget together.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetTable {
    base: BTreeMap<String, f64>,
    active: BTreeMap<String, f64>,
}

impl BudgetTable {
    pub fn new(base: BTreeMap<String, f64>) -> Self {
        Self {
            active: base.clone(),
            base,
        }
    }

    /// Rebuild the active table from base values.
    ///
    /// Animation and rendering follow the quality level, UI follows it down
    /// to a floor, and everything else keeps its base value. Thermal and
    /// emergency multipliers apply on top, in that order.
    pub fn rescale(&mut self, level: f64, thermal: bool, emergency: bool) {
        let mut modifier = 1.0;
        if thermal {
            modifier *= THERMAL_BUDGET_SCALE;
        }
        if emergency {
            modifier *= EMERGENCY_BUDGET_SCALE;
        }
        self.active = self
            .base
            .iter()
            .map(|(name, &base)| {
                let scaled = match name.as_str() {
                    "animation" | "rendering" => base * level,
                    "ui" => base * level.max(UI_BUDGET_FLOOR),
                    _ => base,
                };
                (name.clone(), scaled * modifier)
            })
            .collect();
    }

    /// Multiply every active budget in place.
    pub fn scale_all(&mut self, factor: f64) {
        for value in self.active.values_mut() {
            *value *= factor;
        }
    }

    /// Active budget for `name`; unknown subsystems get zero.
    pub fn get(&self, name: &str) -> f64 {
        self.active.get(name).copied().unwrap_or(0.0)
    }

    pub fn base(&self, name: &str) -> Option<f64> {
        self.base.get(name).copied()
    }

    pub fn active(&self) -> &BTreeMap<String, f64> {
        &self.active
    }

    pub fn total(&self) -> f64 {
        self.active.values().sum()
    }
}
