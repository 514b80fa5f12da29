//! Real-time ticker on the monotonic clock.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use pace_core::{CoreConfig, PerformanceCore, PerformanceReport};
use tokio::time::MissedTickBehavior;

use crate::replay::WORKLOAD;

/// Run frames at the configured target rate for `seconds`, burning
/// `load_ms` of CPU per frame across the workload. Ctrl-C stops early.
pub async fn run_live(config: CoreConfig, seconds: f64, load_ms: f64) -> Result<PerformanceReport> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be positive, got {seconds}");
    }
    if !load_ms.is_finite() || load_ms < 0.0 {
        bail!("--load-ms must be non-negative, got {load_ms}");
    }

    let critical = config.critical_subsystems.clone();
    let mut core = PerformanceCore::new(config)?;
    core.on_alert(|alert| {
        tracing::warn!(at = alert.timestamp, kind = %alert.kind(), "alert");
    });

    let mut rate = core.frame_config().target_rate();
    let mut ticker = ticker_for(rate);
    let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(seconds);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    tracing::warn!("ctrl-c handler failed: {e}");
                }
                tracing::info!("interrupted");
                break;
            }
            _ = tokio::time::sleep_until(deadline) => break,
            _ = ticker.tick() => {}
        }

        let info = core.frame_begin();
        tracing::trace!(frame = info.frame_number, quality = info.quality_level, "tick");

        for (name, share) in WORKLOAD {
            if info.emergency_mode && !critical.iter().any(|c| c == name) {
                continue;
            }
            core.with_subsystem(name, || spin_for(share * load_ms));
        }
        core.process_tasks();

        let current = core.frame_config().target_rate();
        if current != rate {
            rate = current;
            ticker = ticker_for(rate);
        }
    }

    Ok(core.performance_report())
}

fn ticker_for(rate: f64) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / rate));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Busy-wait to stand in for CPU-bound subsystem work.
fn spin_for(ms: f64) {
    let end = Instant::now() + Duration::from_secs_f64(ms / 1000.0);
    while Instant::now() < end {
        std::hint::spin_loop();
    }
}
