//! Background force polling.

use super::channel::ForceChannel;
use crate::context::MotionContext;
use crate::events::MotionEvent;
use gecko_common::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Thread reading the force channel and publishing every reading.
///
/// A transport failure, or no valid frame for longer than the staleness
/// limit, marks the sensor faulted and halts any running activity; the
/// thread then exits.
pub struct ForcePoller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ForcePoller {
    /// Start polling `channel`, sleeping `interval` after each reading and
    /// giving up once no valid frame arrived for `stale_after`.
    pub fn spawn(
        channel: Arc<ForceChannel>,
        ctx: MotionContext,
        interval: Duration,
        stale_after: Duration,
    ) -> Result<Self, TestbedError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("force-poller".into())
            .spawn(move || poll_loop(&channel, &ctx, interval, stale_after, &flag))
            .map_err(|e| TestbedError::Spawn(format!("force poller: {e}")))?;
        info!("Force poller started ({} ms)", interval.as_millis());
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Whether the poll thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Force poller panicked");
            }
            debug!("Force poller stopped");
        }
    }
}

impl Drop for ForcePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(
    channel: &ForceChannel,
    ctx: &MotionContext,
    interval: Duration,
    stale_after: Duration,
    stop: &AtomicBool,
) {
    let mut last_valid = Instant::now();
    while !stop.load(Ordering::Acquire) {
        match channel.poll() {
            Ok(Some(reading)) => {
                last_valid = Instant::now();
                ctx.events.force(reading);
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
            }
            Ok(None) => {
                let silent = last_valid.elapsed();
                if silent > stale_after {
                    sensor_lost(
                        ctx,
                        &TestbedError::SensorTransport(format!(
                            "no valid frame for {} ms",
                            silent.as_millis()
                        )),
                    );
                    break;
                }
            }
            Err(e) => {
                sensor_lost(ctx, &e);
                break;
            }
        }
    }
}

fn sensor_lost(ctx: &MotionContext, e: &TestbedError) {
    error!("Force sensor lost: {}", e);
    ctx.state.set_sensor_fault(true);
    ctx.events.publish(MotionEvent::SensorFault {
        reason: e.to_string(),
    });
    if ctx.state.is_running() || ctx.state.any_jogging() {
        ctx.halt(&format!("force sensor failure: {e}"));
    }
}
