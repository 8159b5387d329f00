//! # Gecko Testbed Binary
//!
//! Command-line front end of the testbed controller.
//!
//! # Usage
//!
//! ```bash
//! # Run a sequence on the simulated rig
//! gecko_testbed -s run demos/sequence.json
//!
//! # Move Z down until Fz reaches 2 N or 5 s pass
//! gecko_testbed move Z --negative -t "Fz (N) >= 2" -t "duration >= 5"
//!
//! # Jog X in the positive direction for 2 seconds
//! gecko_testbed jog X --positive --secs 2
//!
//! # Store new calibration factors
//! gecko_testbed calibrate 20 20 20.4
//!
//! # Stream telemetry as JSON lines
//! gecko_testbed -s monitor --secs 10 --json
//! ```

#![deny(warnings)]

use clap::{Parser, Subcommand};
use gecko_common::prelude::*;
use gecko_testbed::events::FanoutSink;
use gecko_testbed::{
    ChannelSink, DriverRegistry, RunOutcome, Telemetry, TelemetrySink, Testbed, TracingSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Gecko Testbed - triggered motion sequencing for a three-axis force rig
#[derive(Parser, Debug)]
#[command(name = "gecko_testbed")]
#[command(version)]
#[command(about = "Triggered motion sequencing for a three-axis force testbed")]
#[command(long_about = None)]
struct Args {
    /// Path to the testbed configuration file
    #[arg(short, long, default_value = "config/testbed.toml")]
    config: PathBuf,

    /// Use the simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Driver to load (ignored with --simulate)
    #[arg(short, long, default_value = "hardware")]
    driver: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a sequence file
    Run {
        /// Sequence JSON
        sequence: PathBuf,
    },
    /// Move one axis until a trigger fires
    Move {
        /// Axis label (X, Y, Z)
        axis: String,
        /// Move in the negative direction
        #[arg(long)]
        negative: bool,
        /// Stop trigger, e.g. "Fz (N) >= 2" (repeatable, any fires)
        #[arg(short, long = "trigger")]
        triggers: Vec<String>,
        /// Pulse width [ms]
        #[arg(long, default_value_t = 1)]
        pulse_ms: u64,
    },
    /// Jog one axis for a while
    Jog {
        /// Axis label (X, Y, Z)
        axis: String,
        /// Jog in the positive direction
        #[arg(long)]
        positive: bool,
        /// Jog time [s]
        #[arg(long, default_value_t = 1.0)]
        secs: f64,
    },
    /// Square-wave every axis in both directions
    MotorCheck,
    /// Store new calibration factors [N/V]
    Calibrate {
        /// Fx factor
        fx: f64,
        /// Fy factor
        fy: f64,
        /// Fz factor
        fz: f64,
        /// Offsets [N] as "Fx,Fy,Fz"
        #[arg(long, value_delimiter = ',', num_args = 3)]
        offsets: Option<Vec<f64>>,
    },
    /// Print telemetry as JSON lines
    Monitor {
        /// Monitor time [s]
        #[arg(long, default_value_t = 5.0)]
        secs: f64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Testbed failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = TestbedConfig::load_or_default(&args.config)?;
    setup_tracing(&args, &config);

    info!("Gecko Testbed v{} starting...", env!("CARGO_PKG_VERSION"));

    let registry = DriverRegistry::with_builtin();
    let driver_name = if args.simulate {
        info!("Simulation mode enabled");
        "simulation"
    } else {
        args.driver.as_str()
    };
    let mut driver = registry.create_driver(driver_name).inspect_err(|_| {
        warn!("Available drivers: {:?}", registry.list_drivers());
    })?;

    let (tx, rx) = mpsc::channel();
    let monitor = matches!(args.command, Command::Monitor { .. });
    let sink: Arc<dyn TelemetrySink> = if monitor {
        Arc::new(
            FanoutSink::default()
                .with(Arc::new(TracingSink))
                .with(Arc::new(ChannelSink::new(tx))),
        )
    } else {
        Arc::new(TracingSink)
    };

    let testbed = Arc::new(Testbed::new(&config, driver.as_mut(), sink)?);

    let handler = Arc::clone(&testbed);
    ctrlc::set_handler(move || {
        info!("Received interrupt, stopping motion");
        handler.emergency_stop();
    })?;

    testbed.start()?;
    let result = execute(&testbed, args.command, &rx);
    if let Err(e) = testbed.shutdown() {
        warn!("Shutdown incomplete: {}", e);
    }
    result?;

    info!("Gecko Testbed shutdown complete");
    Ok(())
}

fn execute(
    testbed: &Testbed,
    command: Command,
    telemetry: &Receiver<Telemetry>,
) -> Result<(), TestbedError> {
    match command {
        Command::Run { sequence } => {
            let text = std::fs::read_to_string(&sequence).map_err(|e| {
                TestbedError::InvalidSequence(format!("cannot read {sequence:?}: {e}"))
            })?;
            let sequence = Sequence::from_json(&text)?;
            let report = testbed.run_sequence(&sequence)?;
            match &report.outcome {
                RunOutcome::Completed => info!(
                    "Sequence completed ({} iterations)",
                    report.iterations_completed
                ),
                RunOutcome::Cancelled => warn!("Sequence cancelled"),
                RunOutcome::Halted(reason) => error!("Sequence halted: {}", reason),
            }
            if let Some(e) = report.log_error {
                return Err(e);
            }
            Ok(())
        }
        Command::Move {
            axis,
            negative,
            triggers,
            pulse_ms,
        } => {
            let triggers = triggers
                .iter()
                .map(|t| t.parse())
                .collect::<Result<Vec<Trigger>, _>>()?;
            let outcome = testbed.move_until_trigger(
                &axis,
                Direction::from_flag(!negative),
                &triggers,
                Duration::from_millis(pulse_ms),
            )?;
            info!("Manual move ended: {:?}", outcome);
            Ok(())
        }
        Command::Jog {
            axis,
            positive,
            secs,
        } => {
            testbed.start_jog(&axis, positive)?;
            thread::sleep(Duration::from_secs_f64(secs.max(0.0)));
            testbed.stop_jog(&axis)
        }
        Command::MotorCheck => testbed.motor_check(),
        Command::Calibrate {
            fx,
            fy,
            fz,
            offsets,
        } => {
            let mut profile = CalibrationProfile::with_factors(fx, fy, fz);
            if let Some([ox, oy, oz]) = offsets.as_deref().and_then(|o| <[f64; 3]>::try_from(o).ok())
            {
                profile.offsets = ChannelValues {
                    fx: ox,
                    fy: oy,
                    fz: oz,
                };
            }
            testbed.recalibrate(profile)
        }
        Command::Monitor { secs } => {
            let deadline = Instant::now() + Duration::from_secs_f64(secs.max(0.0));
            loop {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                match telemetry.recv_timeout(left) {
                    Ok(message) => println!(
                        "{}",
                        serde_json::json!({
                            "type": message.channel(),
                            "payload": message.payload(),
                        })
                    ),
                    Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
                }
            }
            let status = testbed.status();
            println!(
                "{}",
                serde_json::to_string(&status).unwrap_or_else(|e| e.to_string())
            );
            Ok(())
        }
    }
}

/// Setup tracing subscriber based on CLI arguments and configuration.
fn setup_tracing(args: &Args, config: &TestbedConfig) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.shared.log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_names(true)
            .init();
    }
}
