//! Serial link to the force sensor.

use crate::transport::SensorTransport;
use gecko_common::config::SensorConfig;
use gecko_common::prelude::*;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Sensor transport over a serial port.
pub struct SerialSensor {
    path: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialSensor {
    /// Open the configured port.
    pub fn open(config: &SensorConfig) -> Result<Self, TestbedError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| TestbedError::SensorTransport(format!("{}: {e}", config.port)))?;
        Ok(Self {
            path: config.port.clone(),
            port: Some(port),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, TestbedError> {
        self.port
            .as_mut()
            .ok_or_else(|| TestbedError::SensorTransport(format!("{} is closed", self.path)))
    }
}

impl SensorTransport for SerialSensor {
    fn name(&self) -> &str {
        &self.path
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TestbedError> {
        let path = self.path.clone();
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(TestbedError::SensorTransport(format!("{path}: {e}"))),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TestbedError> {
        let path = self.path.clone();
        let port = self.port()?;
        port.write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(|e| TestbedError::SensorTransport(format!("{path}: {e}")))
    }

    fn close(&mut self) -> Result<(), TestbedError> {
        self.port = None;
        Ok(())
    }
}
