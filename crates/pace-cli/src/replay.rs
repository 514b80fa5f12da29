//! Drive a [`PerformanceCore`] through a recorded or synthetic trace.
//!
//! Each trace entry is the wall time one frame took. The frame is split
//! across a fixed workload of subsystems, deferred tasks get whatever budget
//! is left, and the clock is padded out to the recorded duration. A frame
//! whose simulated work overruns the entry takes as long as the work did.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use pace_core::{
    Alert, Clock, CoreConfig, ManualClock, PerformanceCore, PerformanceReport, TaskPriority,
    TaskStatus,
};

/// Subsystems exercised every frame and the share of the frame each takes.
pub const WORKLOAD: [(&str, f64); 5] = [
    ("consciousness", 0.12),
    ("animation", 0.24),
    ("rendering", 0.48),
    ("ui", 0.06),
    ("networking", 0.03),
];

/// Clock cost of one task step.
const TASK_STEP_MS: f64 = 0.25;
/// Steps a replay task needs before it reports completion.
const TASK_STEPS: u32 = 3;

pub struct ReplayOutcome {
    pub report: PerformanceReport,
    pub alerts: Vec<Alert>,
}

pub fn replay(config: CoreConfig, frames: &[f64], tasks: usize) -> Result<ReplayOutcome> {
    let clock = ManualClock::new();
    let critical = config.critical_subsystems.clone();
    let mut core = PerformanceCore::with_clock(config, Box::new(clock.clone()))?;

    let alerts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&alerts);
    core.on_alert(move |alert: &Alert| {
        tracing::info!(at = alert.timestamp, kind = %alert.kind(), "alert");
        sink.borrow_mut().push(alert.clone());
    });

    for i in 0..tasks {
        let tick = clock.clone();
        let mut steps = 0;
        core.schedule_with(
            format!("task-{i}"),
            TaskPriority::ALL[i % TaskPriority::ALL.len()],
            1.0,
            move || {
                tick.advance(TASK_STEP_MS);
                steps += 1;
                Ok(if steps >= TASK_STEPS {
                    TaskStatus::Complete
                } else {
                    TaskStatus::Incomplete
                })
            },
        );
    }

    core.frame_begin();
    for &duration in frames {
        let start = clock.now_ms();
        for (name, share) in WORKLOAD {
            let essential = critical.iter().any(|c| c == name);
            if core.is_emergency() && !essential {
                continue;
            }
            let tick = clock.clone();
            if core.with_subsystem(name, move || tick.advance(share * duration)).is_none() {
                tracing::trace!(subsystem = name, "skipped disabled subsystem");
            }
        }
        core.process_tasks();

        let used = clock.now_ms() - start;
        if used < duration {
            clock.advance(duration - used);
        }
        core.frame_begin();
    }

    let alerts = alerts.borrow().clone();
    Ok(ReplayOutcome {
        report: core.performance_report(),
        alerts,
    })
}
