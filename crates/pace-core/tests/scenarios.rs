//! End-to-end frame loop scenarios driven through a manual clock:
//! steady state, degradation into emergency, recovery, subsystem disable,
//! thermal and power-save inputs, and deferred task fairness.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use pace_core::{
    Alert, AlertEvent, AlertKind, BandSource, CoreConfig, Feature, FrameError, ManualClock,
    PerformanceBand, PerformanceCore, TASK_SCHEDULER_SUBSYSTEM, TaskPriority, TaskStatus,
};

const PERIOD: f64 = 1000.0 / 60.0;

fn setup() -> (PerformanceCore, ManualClock) {
    setup_with(CoreConfig::default())
}

fn setup_with(config: CoreConfig) -> (PerformanceCore, ManualClock) {
    let clock = ManualClock::new();
    let mut core = PerformanceCore::with_clock(config, Box::new(clock.clone())).unwrap();
    // Baseline frame: nothing measured yet.
    core.frame_begin();
    (core, clock)
}

fn record_alerts(core: &mut PerformanceCore) -> Rc<RefCell<Vec<Alert>>> {
    let alerts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&alerts);
    core.on_alert(move |alert| sink.borrow_mut().push(alert.clone()));
    alerts
}

fn feed(core: &mut PerformanceCore, clock: &ManualClock, ms: f64) {
    clock.advance(ms);
    core.frame_begin();
}

fn count(alerts: &Rc<RefCell<Vec<Alert>>>, kind: AlertKind) -> usize {
    alerts.borrow().iter().filter(|a| a.kind() == kind).count()
}

// ---------------------------------------------------------------------------
// Scenario 1: steady state
// ---------------------------------------------------------------------------

#[test]
fn steady_state_stays_normal_at_full_quality() {
    let (mut core, clock) = setup();
    let alerts = record_alerts(&mut core);

    for _ in 0..120 {
        feed(&mut core, &clock, 16.0);
        assert!(!core.is_emergency());
    }

    assert_eq!(core.metrics().dropped_frames(), 0);
    assert_eq!(core.metrics().total_frames(), 120);
    assert_eq!(core.quality_level(), 1.0);
    assert_eq!(count(&alerts, AlertKind::QualityChanged), 0);
    assert_eq!(core.last_band(), Some(PerformanceBand::Acceptable));
    assert_relative_eq!(core.metrics().current_rate(), 62.5);
}

// ---------------------------------------------------------------------------
// Scenario 2 + 3: degradation into emergency, then recovery
// ---------------------------------------------------------------------------

fn degrade(core: &mut PerformanceCore, clock: &ManualClock) {
    for _ in 0..3 {
        feed(core, clock, 14.0);
    }
}

#[test]
fn gradual_degradation_steps_down_then_enters_emergency() {
    let (mut core, clock) = setup();
    let alerts = record_alerts(&mut core);
    degrade(&mut core, &clock);
    assert_eq!(core.quality_level(), 1.0);

    feed(&mut core, &clock, 22.0);
    assert_eq!(core.last_band(), Some(PerformanceBand::Poor));
    assert_eq!(core.quality_level(), 0.75);
    for _ in 0..2 {
        feed(&mut core, &clock, 22.0);
    }
    assert!(alerts.borrow().iter().any(|a| matches!(
        a.event,
        AlertEvent::QualityChanged { from, to } if from == 1.0 && to == 0.75
    )));
    assert!(!core.is_emergency());

    feed(&mut core, &clock, 22.0);
    assert!(!core.is_emergency());
    feed(&mut core, &clock, 22.0);
    assert!(core.is_emergency());
    assert_eq!(count(&alerts, AlertKind::EmergencyMode), 1);
    assert!(alerts.borrow().iter().any(|a| matches!(
        &a.event,
        AlertEvent::EmergencyMode { reason, .. } if reason == "5 consecutive poor frames"
    )));
    assert_eq!(core.quality_level(), 0.1);
    // base 8.0 * level 0.1 * emergency 0.5
    assert_relative_eq!(core.budget("rendering"), 0.4);
    assert_relative_eq!(core.budget("consciousness"), 1.0);
}

#[test]
fn recovery_exits_emergency_on_thirtieth_good_frame() {
    let (mut core, clock) = setup();
    let alerts = record_alerts(&mut core);
    degrade(&mut core, &clock);
    for _ in 0..5 {
        feed(&mut core, &clock, 22.0);
    }
    assert!(core.is_emergency());

    for _ in 0..29 {
        feed(&mut core, &clock, 12.0);
    }
    assert!(core.is_emergency());
    assert_eq!(count(&alerts, AlertKind::EmergencyModeExit), 0);

    feed(&mut core, &clock, 12.0);
    assert!(!core.is_emergency());
    assert_eq!(count(&alerts, AlertKind::EmergencyModeExit), 1);
    assert_relative_eq!(core.budget("rendering"), 0.8);
    assert_relative_eq!(core.budget("consciousness"), 2.0);
    assert_eq!(core.quality_level(), 0.1);

    for _ in 0..10 {
        feed(&mut core, &clock, 12.0);
    }
    assert_eq!(core.quality_level(), 0.25);
    for _ in 0..30 {
        feed(&mut core, &clock, 12.0);
    }
    assert_eq!(core.quality_level(), 1.0);
}

#[test]
fn five_frames_at_one_point_three_periods_enter_emergency_on_the_fifth() {
    for source in [BandSource::LastFrame, BandSource::Average] {
        let (mut core, clock) = setup_with(CoreConfig::default().with_band_source(source));
        let alerts = record_alerts(&mut core);
        for i in 1..=5 {
            feed(&mut core, &clock, 1.3 * PERIOD);
            assert_eq!(core.last_band(), Some(PerformanceBand::Poor));
            assert_eq!(core.is_emergency(), i == 5, "frame {i} with {source:?}");
        }
        assert_eq!(count(&alerts, AlertKind::EmergencyMode), 1);
    }
}

#[test]
fn emergency_restricts_work_to_critical_subsystems() {
    let (mut core, _clock) = setup();
    core.trigger_emergency_mode("manual");
    assert!(core.is_emergency());
    assert!(core.can_continue("rendering"));
    assert!(core.can_continue("consciousness"));
    assert!(!core.can_continue("ui"));
    assert!(!core.can_continue("animation"));

    // Triggering again is not a second transition.
    core.trigger_emergency_mode("again");
    assert_eq!(core.alerts().count(AlertKind::EmergencyMode), 1);
}

// ---------------------------------------------------------------------------
// Scenario 4: subsystem disable
// ---------------------------------------------------------------------------

#[test]
fn subsystem_disabled_after_five_errors() {
    let (mut core, _clock) = setup();
    let alerts = record_alerts(&mut core);

    for i in 1..=4 {
        core.report_subsystem_error("animation", format!("glitch {i}"));
        assert!(core.can_continue("animation"));
    }
    core.report_subsystem_error("animation", "glitch 5");
    assert!(!core.can_continue("animation"));
    assert!(core.is_disabled("animation"));
    assert!(core.subsystem_begin("animation").is_none());

    core.report_subsystem_error("animation", "glitch 6");
    assert_eq!(count(&alerts, AlertKind::SubsystemDisabled), 1);
    assert_eq!(core.error_count("animation"), 6);

    let report = core.performance_report();
    assert_eq!(report.disabled_subsystems, vec!["animation"]);
    assert_eq!(report.last_errors["animation"], "glitch 6");
}

// ---------------------------------------------------------------------------
// Scenario 5 + 6: thermal and power inputs
// ---------------------------------------------------------------------------

#[test]
fn thermal_throttling_scales_budgets_and_steps_down() {
    let (mut core, _clock) = setup();
    let alerts = record_alerts(&mut core);

    core.set_thermal_throttling(true, Some(88.0));
    assert_relative_eq!(core.budget("rendering"), 5.6, epsilon = 1e-9);
    assert_eq!(core.quality_level(), 0.75);
    assert_eq!(count(&alerts, AlertKind::ThermalThrottling), 1);
    assert_eq!(core.mode().temperature, Some(88.0));

    // Already on: no second transition.
    core.set_thermal_throttling(true, None);
    assert_eq!(count(&alerts, AlertKind::ThermalThrottling), 1);

    core.set_thermal_throttling(false, None);
    assert_relative_eq!(core.budget("rendering"), 6.0);
    assert_eq!(count(&alerts, AlertKind::ThermalThrottling), 2);
}

#[test]
fn thermal_throttling_does_not_step_below_second_rung() {
    let (mut core, _clock) = setup();
    core.trigger_emergency_mode("test");
    assert_eq!(core.quality_index(), 0);
    core.set_thermal_throttling(true, None);
    assert_eq!(core.quality_index(), 0);
    assert_relative_eq!(core.budget("rendering"), 8.0 * 0.1 * 0.5 * 0.7);
}

#[test]
fn thermal_throttling_survives_emergency_exit() {
    let (mut core, clock) = setup();
    degrade(&mut core, &clock);
    for _ in 0..5 {
        feed(&mut core, &clock, 22.0);
    }
    assert!(core.is_emergency());
    core.set_thermal_throttling(true, None);

    for _ in 0..30 {
        feed(&mut core, &clock, 12.0);
    }
    assert!(!core.is_emergency());
    assert!(core.mode().thermal_throttling);
    // base * level 0.1 * thermal 0.7, no emergency halving
    assert_relative_eq!(core.budget("rendering"), 8.0 * 0.1 * 0.7, epsilon = 1e-9);
    assert_relative_eq!(core.budget("consciousness"), 2.0 * 0.7, epsilon = 1e-9);

    core.set_thermal_throttling(false, None);
    assert_relative_eq!(core.budget("rendering"), 0.8, epsilon = 1e-9);
}

#[test]
fn power_save_lowers_target_rate_and_quality() {
    let (mut core, _clock) = setup();
    let alerts = record_alerts(&mut core);

    core.set_power_save_mode(true, Some(0.2));
    let fc = core.frame_config();
    assert_relative_eq!(fc.target_rate(), 36.0);
    assert_relative_eq!(fc.target_period(), 27.777_777_777_777_78, epsilon = 1e-9);
    assert_relative_eq!(fc.frame_budget(), 0.8 * 1000.0 / 36.0, epsilon = 1e-9);
    assert_relative_eq!(fc.thresholds().poor, 1.2 * 1000.0 / 36.0, epsilon = 1e-9);
    assert_eq!(core.quality_level(), 0.75);
    assert_eq!(core.mode().battery_level, Some(0.2));
    assert_eq!(count(&alerts, AlertKind::PowerSaveMode), 1);

    core.set_power_save_mode(false, None);
    assert_relative_eq!(core.frame_config().target_rate(), 60.0);
    assert_eq!(count(&alerts, AlertKind::PowerSaveMode), 2);
}

#[test]
fn power_save_changes_band_boundaries() {
    let (mut core, clock) = setup();
    core.set_power_save_mode(true, None);
    // 27ms is dropped at 60Hz but acceptable at 36Hz.
    feed(&mut core, &clock, 27.0);
    assert_eq!(core.last_band(), Some(PerformanceBand::Acceptable));
}

// ---------------------------------------------------------------------------
// Per-frame budgets
// ---------------------------------------------------------------------------

#[test]
fn subsystem_over_budget_is_reported() {
    let (mut core, clock) = setup();
    let alerts = record_alerts(&mut core);

    let timer = core.subsystem_begin("rendering").unwrap();
    assert_eq!(timer.start, 0.0);
    clock.advance(10.0);
    let report = core.subsystem_end("rendering").unwrap();
    assert!(report.exceeded);
    assert_relative_eq!(report.duration, 10.0);
    assert_relative_eq!(report.efficiency, 0.8);
    assert_eq!(count(&alerts, AlertKind::BudgetExceeded), 1);
    assert_eq!(core.performance_report().budget_exceedances["rendering"], 1);
}

#[test]
fn remaining_budget_and_can_continue_track_elapsed_time() {
    let (mut core, clock) = setup();
    assert_relative_eq!(core.remaining_budget(), 0.8 * PERIOD);
    clock.advance(5.0);
    assert_relative_eq!(core.remaining_budget(), 0.8 * PERIOD - 5.0);
    assert!(core.can_continue("rendering")); // 8.33 >= 8.0
    clock.advance(1.0);
    assert!(!core.can_continue("rendering"));
    assert!(core.can_continue("ui"));
    clock.advance(100.0);
    assert_eq!(core.remaining_budget(), 0.0);
}

#[test]
fn pairing_mistakes_are_reported_not_fatal() {
    let (mut core, clock) = setup();
    let alerts = record_alerts(&mut core);

    assert_eq!(
        core.subsystem_end("ui"),
        Err(FrameError::TimerMissing("ui".to_string()))
    );

    core.subsystem_begin("ui");
    clock.advance(0.2);
    core.subsystem_begin("ui");
    clock.advance(0.3);
    let report = core.subsystem_end("ui").unwrap();
    assert_relative_eq!(report.duration, 0.3);
    assert_eq!(count(&alerts, AlertKind::TimerOverwritten), 1);
}

#[test]
fn timers_reset_each_frame_and_show_in_report() {
    let (mut core, clock) = setup();
    core.subsystem_begin("ui");
    clock.advance(0.5);
    core.subsystem_end("ui").unwrap();
    feed(&mut core, &clock, 15.0);

    assert!(core.subsystem_end("ui").is_err());
    let report = core.performance_report();
    assert_eq!(report.last_frame.len(), 1);
    assert_eq!(report.last_frame[0].name, "ui");
    assert_eq!(report.last_frame[0].duration, Some(0.5));
}

#[test]
fn with_subsystem_closes_the_timer() {
    let (mut core, clock) = setup();
    let tick = clock.clone();
    let (value, report) = core
        .with_subsystem("animation", move || {
            tick.advance(2.0);
            42
        })
        .unwrap();
    assert_eq!(value, 42);
    assert_relative_eq!(report.duration, 2.0);
    assert!(!report.exceeded);

    core.report_subsystem_error("ui", "x");
    for _ in 0..4 {
        core.report_subsystem_error("ui", "x");
    }
    assert!(core.with_subsystem("ui", || ()).is_none());
}

#[test]
fn with_subsystem_closes_the_timer_when_work_panics() {
    let (mut core, clock) = setup();
    let alerts = record_alerts(&mut core);
    let tick = clock.clone();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        core.with_subsystem("rendering", move || {
            tick.advance(10.0);
            panic!("render blew up");
        })
    }));
    assert!(outcome.is_err());
    // 10ms against an 8ms budget: the timer was ended and measured.
    assert_eq!(count(&alerts, AlertKind::BudgetExceeded), 1);
    let report = core.performance_report();
    assert_eq!(report.last_frame[0].name, "rendering");
    assert_eq!(report.last_frame[0].duration, Some(10.0));
}

#[test]
fn feature_gates_follow_quality() {
    let (mut core, _clock) = setup();
    assert!(core.should_enable(Feature::Reflections));
    core.trigger_emergency_mode("test");
    assert!(!core.should_enable(Feature::Shadows));
    assert_eq!(core.quality_settings().animation_smoothing, 0.2);
}

// ---------------------------------------------------------------------------
// Deferred tasks
// ---------------------------------------------------------------------------

#[test]
fn critical_tasks_run_before_high_tasks() {
    let (mut core, _clock) = setup();
    let order = Rc::new(RefCell::new(Vec::new()));
    for (id, priority) in [
        ("high-1", TaskPriority::High),
        ("crit-1", TaskPriority::Critical),
        ("high-2", TaskPriority::High),
        ("crit-2", TaskPriority::Critical),
    ] {
        let order = Rc::clone(&order);
        core.schedule_with(id, priority, 2.0, move || {
            order.borrow_mut().push(id);
            Ok(TaskStatus::Complete)
        });
    }
    let report = core.process_tasks();
    assert_eq!(report.completed, 4);
    assert_eq!(*order.borrow(), vec!["crit-1", "crit-2", "high-1", "high-2"]);
    assert!(core.is_task_completed("high-2"));
    core.clear_completed();
    assert!(!core.is_task_completed("high-2"));
}

#[test]
fn always_incomplete_task_dropped_after_five_attempts() {
    let (mut core, _clock) = setup();
    let calls = Rc::new(RefCell::new(0));
    let c = Rc::clone(&calls);
    core.schedule("spin", move || {
        *c.borrow_mut() += 1;
        Ok(TaskStatus::Incomplete)
    });
    core.process_tasks();
    assert_eq!(*calls.borrow(), 5);
    assert_eq!(core.scheduler_stats().dropped, 1);
    assert_eq!(core.scheduler_stats().queued, 0);
}

#[test]
fn no_tasks_when_budget_is_spent() {
    let (mut core, clock) = setup();
    core.schedule("late", || Ok(TaskStatus::Complete));
    clock.advance(13.0); // 0.33ms left
    let report = core.process_tasks();
    assert_eq!(report.executed, 0);
    assert_eq!(core.scheduler_stats().queued, 1);
}

#[test]
fn failing_tasks_count_against_the_task_scheduler() {
    let (mut core, _clock) = setup();
    for i in 0..5 {
        core.schedule(format!("bad-{i}"), || Err("nope".into()));
    }
    core.schedule_with("after", TaskPriority::Idle, 2.0, || Ok(TaskStatus::Complete));
    core.process_tasks();
    assert_eq!(core.error_count(TASK_SCHEDULER_SUBSYSTEM), 5);
    assert!(core.is_disabled(TASK_SCHEDULER_SUBSYSTEM));
    assert!(!core.is_task_completed("after"));

    // Disabled scheduler leaves the queue alone.
    core.schedule("never", || Ok(TaskStatus::Complete));
    let report = core.process_tasks();
    assert_eq!(report.executed, 0);
}

#[test]
fn scheduler_disable_stops_the_drain_in_progress() {
    let (mut core, _clock) = setup();
    let ran = Rc::new(RefCell::new(Vec::new()));
    for i in 0..5 {
        core.schedule_with(format!("bad-{i}"), TaskPriority::High, 2.0, || {
            Err("nope".into())
        });
    }
    for i in 0..3 {
        let log = Rc::clone(&ran);
        core.schedule_with(format!("low-{i}"), TaskPriority::Low, 2.0, move || {
            log.borrow_mut().push(i);
            Ok(TaskStatus::Complete)
        });
    }

    let seen_at_disable = Rc::new(RefCell::new(None));
    let seen = Rc::clone(&seen_at_disable);
    let log = Rc::clone(&ran);
    core.on_alert(move |alert| {
        if alert.kind() == AlertKind::SubsystemDisabled {
            *seen.borrow_mut() = Some(log.borrow().len());
        }
    });

    let report = core.process_tasks();
    assert_eq!(*seen_at_disable.borrow(), Some(0));
    assert!(ran.borrow().is_empty());
    assert_eq!(report.executed, 5);
    assert_eq!(report.failures.len(), 5);
    assert!(core.is_disabled(TASK_SCHEDULER_SUBSYSTEM));
    assert_eq!(core.scheduler_stats().queued_by_priority[3], 3);
}

#[test]
fn emergency_mode_only_drains_critical_tasks() {
    let (mut core, _clock) = setup();
    core.trigger_emergency_mode("test");
    core.schedule_with("crit", TaskPriority::Critical, 2.0, || Ok(TaskStatus::Complete));
    core.schedule_with("low", TaskPriority::Low, 2.0, || Ok(TaskStatus::Complete));
    let report = core.process_tasks();
    assert_eq!(report.executed, 1);
    assert!(core.is_task_completed("crit"));
    assert_eq!(core.scheduler_stats().queued_by_priority[3], 1);
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

#[test]
fn monitoring_samples_on_interval_into_bounded_ring() {
    let (mut core, clock) = setup();
    core.start_monitoring(100.0, 5).unwrap();
    for _ in 0..100 {
        feed(&mut core, &clock, 16.0);
    }
    // 1600ms of frames, one sample per >=100ms, capped at 5.
    let samples = core.samples(usize::MAX);
    assert_eq!(samples.len(), 5);
    for pair in samples.windows(2) {
        assert!(pair[1].timestamp - pair[0].timestamp >= 100.0);
    }
    assert_eq!(core.performance_report().recent_samples.len(), 5);

    core.stop_monitoring();
    feed(&mut core, &clock, 500.0);
    assert_eq!(core.samples(usize::MAX).last(), samples.last());
}

#[test]
fn report_serializes_to_json() {
    let (mut core, clock) = setup();
    feed(&mut core, &clock, 16.0);
    core.set_thermal_throttling(true, None);
    let json: serde_json::Value =
        serde_json::from_str(&core.performance_report().to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["frame_number"], 2);
    assert_eq!(json["mode"]["thermal_throttling"], true);
    assert_eq!(json["last_band"], "acceptable");
    assert_eq!(json["alert_counts"]["thermal_throttling"], 1);
    assert!(json["budgets"]["rendering"].as_f64().unwrap() > 0.0);
}

#[test]
fn removed_listener_stops_receiving() {
    let (mut core, _clock) = setup();
    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    let id = core.on_alert(move |_| *h.borrow_mut() += 1);
    core.set_thermal_throttling(true, None);
    assert!(core.remove_listener(id));
    core.set_thermal_throttling(false, None);
    // Thermal entry emits QualityChanged + ThermalThrottling.
    assert_eq!(*hits.borrow(), 2);
}

#[test]
fn panicking_listener_is_contained() {
    let (mut core, _clock) = setup();
    core.on_alert(|_| panic!("listener bug"));
    core.trigger_emergency_mode("test");
    assert!(core.is_emergency());
}

#[test]
fn same_inputs_give_same_state() {
    let run = || {
        let (mut core, clock) = setup();
        core.start_monitoring(50.0, 20).unwrap();
        let trace = [14.0, 22.0, 30.0, 12.0, 9.0, 40.0, 16.0];
        for (i, ms) in trace.iter().cycle().take(90).enumerate() {
            feed(&mut core, &clock, *ms);
            if i % 7 == 0 {
                core.report_subsystem_error("networking", "timeout");
            }
        }
        core.performance_report()
    };
    assert_eq!(run(), run());
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "invariant violated"))]
fn clock_going_backwards_is_an_invariant_violation() {
    let (mut core, clock) = setup();
    clock.set(-5.0);
    core.frame_begin();
    // Release builds only: the sample is discarded and an alert raised.
    assert_eq!(core.alerts().count(AlertKind::InvariantViolation), 1);
    assert_eq!(core.metrics().total_frames(), 0);
}

#[test]
fn construction_validates_config() {
    assert!(PerformanceCore::new(CoreConfig::default().with_target_rate(-1.0)).is_err());
    assert!(PerformanceCore::new(CoreConfig::default()).is_ok());
}
