//! Manual move, jog and motor check.

mod common;

use common::{Rig, step_until, wait_for};
use gecko_common::prelude::*;
use gecko_testbed::manual::{self, Jogger, ManualOutcome};
use std::thread;
use std::time::Duration;

const PULSE: Duration = Duration::from_millis(1);

#[test]
fn test_move_until_steps_trigger() {
    let rig = Rig::new();
    let triggers = [Trigger::new(TriggerKind::Steps, Comparator::Ge, 5.0)];

    let outcome = manual::move_until_trigger(&rig.ctx, "z", Direction::Negative, &triggers, PULSE)
        .expect("move");

    assert_eq!(outcome, ManualOutcome::Triggered);
    assert_eq!(rig.rises(Axis::Z), 5);
    assert_eq!(rig.state().position(Axis::Z), 5);
    assert!(!rig.state().is_running());

    let logs = rig.recorder.logs();
    assert!(logs.contains(&"Axis Z: steps >= 5, manual move trigger fired".to_string()));
    assert!(logs.contains(&"Manual move stopped due to trigger".to_string()));
    assert_eq!(logs.last().map(String::as_str), Some("Manual move completed"));
}

#[test]
fn test_move_any_trigger_fires() {
    let rig = Rig::new();
    rig.force_on_pulse(Axis::Y, |n| {
        ForceReading::new(0.0, if n >= 2 { 1.5 } else { 0.0 }, 0.0)
    });
    let triggers = [
        Trigger::new(TriggerKind::Steps, Comparator::Ge, 100.0),
        Trigger::force(ForceAxis::Fy, Comparator::Ge, 1.0),
    ];

    let outcome =
        manual::move_until_trigger(&rig.ctx, "Y", Direction::Positive, &triggers, PULSE)
            .expect("move");

    assert_eq!(outcome, ManualOutcome::Triggered);
    assert_eq!(rig.rises(Axis::Y), 2);
    assert_eq!(rig.state().position(Axis::Y), -2);
}

#[test]
fn test_move_stops_on_flag_clear() {
    let rig = Rig::new();
    let ctx = rig.ctx.clone();
    let handle = thread::spawn(move || {
        manual::move_until_trigger(&ctx, "X", Direction::Positive, &[], PULSE)
    });

    assert!(wait_for(Duration::from_secs(1), || rig.rises(Axis::X) > 3));
    rig.state().stop();

    let outcome = handle.join().expect("join").expect("move");
    assert_eq!(outcome, ManualOutcome::Stopped);
}

#[test]
fn test_invalid_axis_rejected() {
    let rig = Rig::new();
    let result = manual::move_until_trigger(&rig.ctx, "W", Direction::Positive, &[], PULSE);

    assert!(matches!(result, Err(TestbedError::InvalidAxis(_))));
    assert!(!rig.state().is_running());
    assert!(rig.recorder.logs().is_empty());
}

#[test]
fn test_move_rejected_during_sequence() {
    let rig = Rig::new();
    let sequencer = rig.sequencer();
    let step = step_until(Axis::Z, Direction::Negative, 1e9);
    let sequence = Sequence::new().with_program(Axis::Z, AxisProgram::new(vec![step]));
    let handle = thread::spawn(move || sequencer.run(&sequence));
    assert!(wait_for(Duration::from_secs(1), || rig.rises(Axis::Z) > 0));

    let result = manual::move_until_trigger(&rig.ctx, "X", Direction::Positive, &[], PULSE);
    assert!(matches!(result, Err(TestbedError::ActivityAlreadyRunning)));
    assert!(rig.state().is_running());
    assert_eq!(rig.rises(Axis::X), 0);

    // The sequence keeps going.
    let before = rig.rises(Axis::Z);
    assert!(wait_for(Duration::from_secs(1), || rig.rises(Axis::Z) > before));

    rig.state().stop();
    handle.join().expect("join").expect("run");
}

#[test]
fn test_pulse_failure_halts_move() {
    let rig = Rig::new();
    rig.steps[Axis::X.index()].set_failing(true);

    let result = manual::move_until_trigger(&rig.ctx, "X", Direction::Positive, &[], PULSE);

    assert!(matches!(result, Err(TestbedError::ActuatorTransport(_))));
    assert!(rig.state().emergency_raised());
    assert!(!rig.state().is_running());
}

#[test]
fn test_jog_start_stop() {
    let rig = Rig::new();
    let jogger = Jogger::new(rig.ctx.clone());

    jogger.start("X", true).expect("start");
    assert!(rig.state().is_jogging(Axis::X));
    assert!(wait_for(Duration::from_secs(1), || rig.rises(Axis::X) > 5));

    // Starting again is a no-op.
    jogger.start("X", true).expect("restart");

    jogger.stop("X").expect("stop");
    assert!(!rig.state().is_jogging(Axis::X));
    let settled = rig.rises(Axis::X);
    thread::sleep(Duration::from_millis(10));
    assert_eq!(rig.rises(Axis::X), settled);
    assert_eq!(rig.state().position(Axis::X), -(settled as i64));
}

#[test]
fn test_jog_and_run_flag_exclude_each_other() {
    let rig = Rig::new();
    let jogger = Jogger::new(rig.ctx.clone());

    jogger.start("Y", false).expect("start");
    let result = manual::move_until_trigger(&rig.ctx, "X", Direction::Positive, &[], PULSE);
    assert!(matches!(result, Err(TestbedError::ActivityAlreadyRunning)));
    assert!(!rig.state().is_running());
    jogger.stop_all();

    let guard = rig.state().try_begin().expect("claim");
    assert!(matches!(
        jogger.start("Y", true),
        Err(TestbedError::ActivityAlreadyRunning)
    ));
    assert!(!rig.state().is_jogging(Axis::Y));
    drop(guard);
}

#[test]
fn test_emergency_stop_ends_jogs() {
    let rig = Rig::new();
    let jogger = Jogger::new(rig.ctx.clone());
    jogger.start("X", true).expect("start X");
    jogger.start("Z", false).expect("start Z");

    rig.ctx.halt("operator emergency stop");
    jogger.stop_all();

    assert!(!rig.state().any_jogging());
    let x = rig.rises(Axis::X);
    let z = rig.rises(Axis::Z);
    thread::sleep(Duration::from_millis(10));
    assert_eq!((rig.rises(Axis::X), rig.rises(Axis::Z)), (x, z));
}

#[test]
fn test_jog_invalid_axis() {
    let rig = Rig::new();
    let jogger = Jogger::new(rig.ctx.clone());
    assert!(matches!(
        jogger.start("Q", true),
        Err(TestbedError::InvalidAxis(_))
    ));
    assert!(!rig.state().any_jogging());
}

#[test]
fn test_motor_check_drives_all_axes_both_ways() {
    let rig = Rig::new();

    manual::motor_check(&rig.ctx).expect("check");

    for axis in Axis::ALL {
        assert!(rig.rises(axis) > 0, "axis {axis} never pulsed");
        // Direction output went high for the positive half.
        assert!(rig.dirs[axis.index()].rises() >= 1);
        // Ends on the negative half.
        assert!(!rig.dirs[axis.index()].is_high());
    }
    assert_eq!(rig.state().positions(), [0, 0, 0]);
    assert!(!rig.state().is_running());

    let logs = rig.recorder.logs();
    assert_eq!(logs.first().map(String::as_str), Some("Motor check started"));
    assert_eq!(logs.last().map(String::as_str), Some("Motor check completed"));
}

#[test]
fn test_motor_check_failure_halts() {
    let rig = Rig::new();
    rig.steps[Axis::Y.index()].set_failing(true);

    let result = manual::motor_check(&rig.ctx);

    assert!(matches!(result, Err(TestbedError::ActuatorTransport(_))));
    assert!(rig.state().emergency_raised());
    assert!(!rig.state().is_running());
}

#[test]
fn test_manual_motion_refused_after_sensor_fault() {
    let rig = Rig::new();
    rig.state().set_sensor_fault(true);
    let triggers = [Trigger::force(ForceAxis::Fz, Comparator::Ge, 2.0)];

    let moved = manual::move_until_trigger(&rig.ctx, "Z", Direction::Negative, &triggers, PULSE);
    assert!(matches!(moved, Err(TestbedError::SensorTransport(_))));

    let jogger = Jogger::new(rig.ctx.clone());
    assert!(matches!(
        jogger.start("Z", false),
        Err(TestbedError::SensorTransport(_))
    ));
    assert!(matches!(
        manual::motor_check(&rig.ctx),
        Err(TestbedError::SensorTransport(_))
    ));

    assert_eq!(rig.rises(Axis::Z), 0);
    assert!(!rig.state().is_running());
    assert!(!rig.state().any_jogging());
    assert!(rig.recorder.logs().is_empty());
}
