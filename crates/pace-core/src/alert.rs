//! Synchronous in-process alert bus.
//!
//! Listeners run on the caller's stack before the emitting method returns.
//! A listener that panics is logged and skipped; it stays subscribed and
//! never takes the frame loop down with it.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;

/// Alerts kept for reporting after delivery.
const ALERT_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    EmergencyMode,
    EmergencyModeExit,
    QualityChanged,
    ThermalThrottling,
    PowerSaveMode,
    SubsystemDisabled,
    BudgetExceeded,
    TimerOverwritten,
    InvariantViolation,
}

impl AlertKind {
    pub fn name(self) -> &'static str {
        match self {
            AlertKind::EmergencyMode => "emergency_mode",
            AlertKind::EmergencyModeExit => "emergency_mode_exit",
            AlertKind::QualityChanged => "quality_changed",
            AlertKind::ThermalThrottling => "thermal_throttling",
            AlertKind::PowerSaveMode => "power_save_mode",
            AlertKind::SubsystemDisabled => "subsystem_disabled",
            AlertKind::BudgetExceeded => "budget_exceeded",
            AlertKind::TimerOverwritten => "timer_overwritten",
            AlertKind::InvariantViolation => "invariant_violation",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Alert payload, shaped by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertEvent {
    EmergencyMode {
        reason: String,
        average_frame_time: f64,
        current_rate: f64,
    },
    EmergencyModeExit {
        average_frame_time: f64,
        current_rate: f64,
    },
    QualityChanged {
        from: f64,
        to: f64,
    },
    ThermalThrottling {
        active: bool,
        temperature: Option<f64>,
    },
    PowerSaveMode {
        active: bool,
        battery_level: Option<f64>,
        target_rate: f64,
    },
    SubsystemDisabled {
        subsystem: String,
        error_count: u32,
        last_error: String,
    },
    BudgetExceeded {
        subsystem: String,
        duration: f64,
        budget: f64,
    },
    TimerOverwritten {
        subsystem: String,
    },
    InvariantViolation {
        detail: String,
    },
}

impl AlertEvent {
    pub fn kind(&self) -> AlertKind {
        match self {
            AlertEvent::EmergencyMode { .. } => AlertKind::EmergencyMode,
            AlertEvent::EmergencyModeExit { .. } => AlertKind::EmergencyModeExit,
            AlertEvent::QualityChanged { .. } => AlertKind::QualityChanged,
            AlertEvent::ThermalThrottling { .. } => AlertKind::ThermalThrottling,
            AlertEvent::PowerSaveMode { .. } => AlertKind::PowerSaveMode,
            AlertEvent::SubsystemDisabled { .. } => AlertKind::SubsystemDisabled,
            AlertEvent::BudgetExceeded { .. } => AlertKind::BudgetExceeded,
            AlertEvent::TimerOverwritten { .. } => AlertKind::TimerOverwritten,
            AlertEvent::InvariantViolation { .. } => AlertKind::InvariantViolation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub timestamp: f64,
    #[serde(flatten)]
    pub event: AlertEvent,
}

impl Alert {
    pub fn kind(&self) -> AlertKind {
        self.event.kind()
    }
}

/// Handle returned by [`AlertBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Alert)>;

#[derive(Default)]
pub struct AlertBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
    counts: BTreeMap<AlertKind, u64>,
    history: VecDeque<Alert>,
}

impl fmt::Debug for AlertBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertBus")
            .field("listeners", &self.listeners.len())
            .field("counts", &self.counts)
            .finish()
    }
}

impl AlertBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Alert) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, timestamp: f64, event: AlertEvent) {
        let alert = Alert { timestamp, event };
        *self.counts.entry(alert.kind()).or_default() += 1;

        for (id, listener) in &mut self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&alert))).is_err() {
                tracing::error!(listener = id.0, kind = %alert.kind(), "alert listener panicked");
            }
        }

        if self.history.len() == ALERT_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(alert);
    }

    pub fn count(&self, kind: AlertKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<AlertKind, u64> {
        &self.counts
    }

    /// Most recent alerts, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Alert> {
        self.history.iter()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
