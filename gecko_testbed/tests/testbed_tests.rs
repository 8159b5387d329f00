//! End-to-end runs of the testbed facade on the simulation driver.

mod common;

use common::{Recorder, fast_motion, wait_for};
use gecko_common::prelude::*;
use gecko_testbed::drivers::simulation::{SensorTap, SimulationDriver};
use gecko_testbed::{RunOutcome, Testbed, TestbedState};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Bench {
    testbed: Testbed,
    tap: SensorTap,
    recorder: Arc<Recorder>,
    dir: TempDir,
}

fn config(dir: &TempDir) -> TestbedConfig {
    let mut config = TestbedConfig::default();
    config.sensor.poll_interval_ms = 1;
    config.motion = fast_motion();
    config.calibration.file = dir.path().join("calibration.json");
    config.logging.log_dir = dir.path().join("logs");
    config
}

fn bench_in(dir: TempDir) -> Bench {
    let mut driver = SimulationDriver::new().with_frame_period(Duration::from_millis(1));
    let tap = driver.sensor_tap();
    // Log capture only; its counters are not the testbed's.
    let recorder = Arc::new(Recorder::new(Arc::new(TestbedState::new(
        CalibrationProfile::default(),
    ))));
    let testbed = Testbed::new(&config(&dir), &mut driver, recorder.clone()).expect("testbed");
    testbed.start().expect("start");
    Bench {
        testbed,
        tap,
        recorder,
        dir,
    }
}

fn bench() -> Bench {
    bench_in(TempDir::new().expect("tempdir"))
}

fn press_until(fz: f64) -> Sequence {
    let mut step = Step::new(Axis::Z, Direction::Negative, Duration::from_millis(1));
    step.triggers
        .push(Trigger::force(ForceAxis::Fz, Comparator::Ge, fz));
    Sequence::new().with_program(Axis::Z, AxisProgram::new(vec![step]))
}

#[test]
fn test_run_against_contact_model() {
    let bench = bench();

    let report = bench
        .testbed
        .run_sequence(&press_until(0.5))
        .expect("run");

    assert!(matches!(report.outcome, RunOutcome::Completed));
    assert_eq!(bench.testbed.status().positions, [0, 0, 0]);
    assert_eq!(
        bench.recorder.count_containing("movement break trigger fired"),
        1
    );

    let location = report.log_location.expect("log written");
    assert_eq!(bench.testbed.last_log_location(), Some(location.clone()));
    assert!(location.starts_with(bench.dir.path().join("logs").to_str().unwrap()));
    let text = std::fs::read_to_string(&location).expect("read log");
    assert!(text.contains("TestBed Config"));
    assert!(text.contains("Breaking movement on Z axis"));
    assert!(text.contains("steps X 0 | Y 0 | Z"));

    bench.testbed.shutdown().expect("shutdown");
}

#[test]
fn test_background_run_and_stop() {
    let bench = bench();
    let handle = bench
        .testbed
        .start_sequence(press_until(1e6))
        .expect("start");
    assert!(bench.testbed.status().running);

    assert!(matches!(
        bench.testbed.start_sequence(press_until(1.0)),
        Err(TestbedError::ActivityAlreadyRunning)
    ));
    assert!(matches!(
        bench
            .testbed
            .move_until_trigger("X", Direction::Positive, &[], Duration::from_millis(1)),
        Err(TestbedError::ActivityAlreadyRunning)
    ));

    assert!(wait_for(Duration::from_secs(2), || {
        bench.testbed.status().positions[Axis::Z.index()] > 10
    }));
    bench.testbed.stop_sequence();
    let report = handle.join().expect("join").expect("run");

    assert!(matches!(report.outcome, RunOutcome::Cancelled));
    assert!(!bench.testbed.status().running);
    assert!(!bench.testbed.status().emergency);
    assert_eq!(bench.testbed.last_log_location(), report.log_location);
}

#[test]
fn test_emergency_stop_always_succeeds() {
    let bench = bench();
    bench.testbed.emergency_stop();
    assert!(bench.testbed.status().emergency);

    bench.testbed.start_jog("Y", true).expect("jog");
    let rejected = bench
        .testbed
        .start_sequence(press_until(1.0))
        .err()
        .expect("rejected while jogging");
    assert!(matches!(rejected, TestbedError::ActivityAlreadyRunning));

    bench.testbed.emergency_stop();
    let status = bench.testbed.status();
    assert!(!status.running);
    assert!(status.emergency);
    assert!(!bench.testbed.context().state.any_jogging());
}

#[test]
fn test_sensor_failure_halts_run() {
    let bench = bench();
    let handle = bench
        .testbed
        .start_sequence(press_until(1e6))
        .expect("start");
    assert!(wait_for(Duration::from_secs(2), || {
        bench.testbed.status().positions[Axis::Z.index()] > 5
    }));

    bench.tap.set_failing(true);
    let report = handle.join().expect("join").expect("run");

    assert!(matches!(report.outcome, RunOutcome::Halted(_)));
    let status = bench.testbed.status();
    assert!(status.sensor_fault);
    assert!(status.emergency);
    assert_eq!(bench.recorder.count_containing("Force sensor failure"), 1);

    assert!(matches!(
        bench.testbed.run_sequence(&press_until(1.0)),
        Err(TestbedError::SensorTransport(_))
    ));
}

#[test]
fn test_recalibration_persists() {
    let bench = bench();
    let profile = CalibrationProfile::with_factors(12.0, 13.0, 14.0);

    bench.testbed.recalibrate(profile).expect("recalibrate");
    assert_eq!(bench.testbed.context().state.calibration(), profile);
    assert_eq!(bench.recorder.count_containing("Calibration updated"), 1);
    assert!(bench.dir.path().join("calibration.json").exists());

    let mut driver = SimulationDriver::new();
    let again = Testbed::new(&config(&bench.dir), &mut driver, bench.recorder.clone())
        .expect("testbed");
    assert_eq!(again.context().state.calibration(), profile);
}

#[test]
fn test_defaults_without_calibration_file() {
    let bench = bench();
    assert_eq!(
        bench.testbed.context().state.calibration(),
        TestbedConfig::default().calibration.defaults()
    );
}

#[test]
fn test_invalid_calibration_rejected() {
    let bench = bench();
    let before = bench.testbed.context().state.calibration();

    let result = bench
        .testbed
        .recalibrate(CalibrationProfile::with_factors(f64::NAN, 1.0, 1.0));

    assert!(result.is_err());
    assert_eq!(bench.testbed.context().state.calibration(), before);
}

#[test]
fn test_zero_sensor_resends_init() {
    let bench = bench();
    let sent = bench.tap.commands().len();
    assert_eq!(sent, SENSOR_INIT_SEQUENCE.len());

    bench.testbed.zero_sensor().expect("zero");
    assert_eq!(bench.tap.commands().len(), 2 * sent);

    bench.testbed.shutdown().expect("shutdown");
    assert_eq!(
        bench.tap.commands().last().map(Vec::as_slice),
        Some(SENSOR_STOP_COMMAND)
    );
}

#[test]
fn test_motor_check_through_facade() {
    let bench = bench();
    bench.testbed.motor_check().expect("check");
    assert_eq!(bench.recorder.count_containing("Motor check completed"), 1);
    assert_eq!(bench.testbed.status().positions, [0, 0, 0]);
}

#[test]
fn test_status_serializes() {
    let bench = bench();
    let value = serde_json::to_value(bench.testbed.status()).expect("json");
    assert_eq!(value["running"], false);
    assert_eq!(value["positions"], serde_json::json!([0, 0, 0]));
    assert!(value["force"].get("F_shear").is_some());
}
