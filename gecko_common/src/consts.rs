//! Protocol, safety and timing constants.
//!
//! Defaults here are used when the TOML configuration omits a value.

/// Number of motion axes on the testbed.
pub const AXIS_COUNT: usize = 3;

// ─── Force sensor frame ─────────────────────────────────────────────

/// Frame-start marker byte.
pub const FRAME_START: u8 = 0xA5;

/// Fixed frame terminator (CR LF).
pub const FRAME_TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// Total frame length in bytes, marker and terminator included.
pub const FRAME_LEN: usize = 11;

/// Raw ADC code corresponding to 0 V.
pub const ADC_MIDPOINT: f64 = 32768.0;

/// Full-scale input voltage of the sensor amplifier [V].
pub const ADC_FULL_SCALE_VOLTS: f64 = 2.0;

/// Command that stops sensor data transmission (also the first init command).
pub const SENSOR_STOP_COMMAND: &[u8] = &[0x23];

/// Wait after [`SENSOR_STOP_COMMAND`] [ms].
pub const SENSOR_STOP_DELAY_MS: u64 = 500;

/// Sensor initialisation procedure: `(command bytes, delay after [ms])`.
///
/// Stop streaming, unlock, select 12.5 Hz output, zero the three channels,
/// start streaming.
pub const SENSOR_INIT_SEQUENCE: &[(&[u8], u64)] = &[
    (&[0x23], 500),
    (&[0x26, 0x01, 0x62, 0x65, 0x72, 0x6C, 0x69, 0x6E], 100),
    (&[0x12, 0xA6], 100),
    (&[0x0C, 0x01], 500),
    (&[0x0C, 0x02], 500),
    (&[0x0C, 0x03], 500),
    (&[0x24], 500),
];

// ─── Safety ─────────────────────────────────────────────────────────

/// Default hard force ceiling [N]. Any force trigger fires above it.
pub const DEFAULT_MAX_FORCE_LIMIT: f64 = 10.0;

/// Default band around the hold target considered "on target" [N].
pub const DEFAULT_HOLD_TOLERANCE: f64 = 0.1;

// ─── Calibration defaults [N/V] ─────────────────────────────────────

/// Default Fx scale factor.
pub const DEFAULT_FX_FACTOR: f64 = 10.0 / 0.5;
/// Default Fy scale factor.
pub const DEFAULT_FY_FACTOR: f64 = 10.0 / 0.5;
/// Default Fz scale factor.
pub const DEFAULT_FZ_FACTOR: f64 = 10.0 / 0.49;

// ─── Serial link ────────────────────────────────────────────────────

/// Default sensor serial port.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
/// Default sensor baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
