//! Framed force channel over a sensor transport.

use super::frame::decode_frame;
use crate::state::TestbedState;
use crate::transport::SensorTransport;
use gecko_common::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Decodes readings from a sensor transport.
///
/// The transport lock is held for one frame at a time, so zeroing and
/// shutdown interleave with polling at frame boundaries.
pub struct ForceChannel {
    transport: Mutex<Box<dyn SensorTransport>>,
    state: Arc<TestbedState>,
    command_delays: bool,
}

impl ForceChannel {
    /// Channel publishing into `state`.
    pub fn new(transport: Box<dyn SensorTransport>, state: Arc<TestbedState>) -> Self {
        Self {
            transport: Mutex::new(transport),
            state,
            command_delays: true,
        }
    }

    /// Builder: skip the inter-command delays of init and shutdown.
    pub fn without_command_delays(mut self) -> Self {
        self.command_delays = false;
        self
    }

    fn pause(&self, ms: u64) {
        if self.command_delays {
            thread::sleep(Duration::from_millis(ms));
        }
    }

    /// Send the device configuration sequence.
    ///
    /// The sensor tares on init, so this also zeroes it.
    pub fn initialize(&self) -> Result<(), TestbedError> {
        let mut transport = self.transport.lock();
        info!("Initializing force sensor on {}", transport.name());
        for (command, delay_ms) in SENSOR_INIT_SEQUENCE {
            transport.write_all(command)?;
            self.pause(*delay_ms);
        }
        Ok(())
    }

    /// Stop the data stream and release the transport.
    pub fn shutdown(&self) -> Result<(), TestbedError> {
        let mut transport = self.transport.lock();
        info!("Stopping force sensor on {}", transport.name());
        transport.write_all(SENSOR_STOP_COMMAND)?;
        self.pause(SENSOR_STOP_DELAY_MS);
        transport.close()
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on read timeout or when the frame is malformed;
    /// a decoded reading is published to the shared state before it is
    /// returned.
    pub fn poll(&self) -> Result<Option<ForceReading>, TestbedError> {
        let bytes = {
            let mut transport = self.transport.lock();
            read_frame(transport.as_mut())?
        };
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        match decode_frame(&bytes, &self.state.calibration()) {
            Ok(reading) => {
                self.state.publish_force(reading);
                Ok(Some(reading))
            }
            Err(e) => {
                debug!("Dropping frame: {}", e);
                Ok(None)
            }
        }
    }

    /// Endless stream of readings; ends after the first transport error.
    pub fn readings(&self) -> Readings<'_> {
        Readings {
            channel: self,
            failed: false,
        }
    }
}

/// Bytes scanned for a start marker before a poll gives up.
const SYNC_SCAN_LIMIT: usize = 4 * FRAME_LEN;

/// Scan for the start marker, then read the rest of one frame.
///
/// Returns `None` if the marker was not seen before a timeout or within
/// [`SYNC_SCAN_LIMIT`] bytes. A timeout mid-frame returns the short frame,
/// which then fails validation.
pub fn read_frame(transport: &mut dyn SensorTransport) -> Result<Option<Vec<u8>>, TestbedError> {
    let mut byte = [0u8; 1];
    let mut scanned = 0;
    loop {
        if scanned == SYNC_SCAN_LIMIT || transport.read(&mut byte)? == 0 {
            return Ok(None);
        }
        scanned += 1;
        if byte[0] == FRAME_START {
            break;
        }
    }

    let mut frame = vec![0u8; FRAME_LEN];
    frame[0] = FRAME_START;
    let mut filled = 1;
    while filled < FRAME_LEN {
        let n = transport.read(&mut frame[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    frame.truncate(filled);
    Ok(Some(frame))
}

/// Iterator over decoded readings of a [`ForceChannel`].
pub struct Readings<'a> {
    channel: &'a ForceChannel,
    failed: bool,
}

impl Iterator for Readings<'_> {
    type Item = Result<ForceReading, TestbedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.channel.poll() {
                Ok(Some(reading)) => return Some(Ok(reading)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
