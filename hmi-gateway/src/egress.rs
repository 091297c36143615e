//! Egress scheduler
//!
//! Owns a dedicated thread that, on a fixed cadence, snapshots the
//! intent store, composes one outbound frame carrying every intent,
//! and sends it with bounded retry. The snapshot-then-encode-then-send
//! sequence is atomic per cycle, so intents sharing the frame can
//! never be sent half-stale. A failed cycle is logged and dropped; the
//! next cycle retries with fresh values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::codec::{check_range, FrameCodec};
use crate::intents::IntentStore;
use crate::transport::BusTransport;
use crate::types::SignalValue;

/// Egress-side configuration, resolved by the gateway at startup
pub struct EgressParams {
    /// Outbound frame identifier (one frame carries all intents)
    pub frame_id: u32,
    /// Cycle period
    pub cycle: Duration,
    /// Send attempts per cycle
    pub retries: u32,
    /// Backoff between attempts
    pub retry_backoff: Duration,
    /// Transport send timeout per attempt
    pub send_timeout: Duration,
}

/// The egress scheduler; `run` consumes it on its dedicated thread
pub struct EgressScheduler {
    transport: Box<dyn BusTransport>,
    codec: Arc<FrameCodec>,
    intents: Arc<IntentStore>,
    running: Arc<AtomicBool>,
    params: EgressParams,
}

impl EgressScheduler {
    pub fn new(
        transport: Box<dyn BusTransport>,
        codec: Arc<FrameCodec>,
        intents: Arc<IntentStore>,
        running: Arc<AtomicBool>,
        params: EgressParams,
    ) -> Self {
        Self {
            transport,
            codec,
            intents,
            running,
            params,
        }
    }

    /// Transmit loop; returns when the shutdown flag clears.
    ///
    /// Sleeps the remainder of the cycle period minus processing time,
    /// floored at zero, to hold a steady cadence regardless of jitter
    /// in encode/send latency.
    pub fn run(mut self) {
        log::info!(
            "Egress scheduler started: frame 0x{:X} every {:?}",
            self.params.frame_id,
            self.params.cycle
        );
        while self.running.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            self.run_cycle();
            let remaining = self.params.cycle.saturating_sub(cycle_start.elapsed());
            thread::sleep(remaining);
        }
        log::info!("Egress scheduler stopped");
    }

    /// One cycle: snapshot, validate, encode, send with bounded retry
    fn run_cycle(&mut self) {
        let snapshot = self.intents.snapshot();

        let mut values = HashMap::with_capacity(snapshot.len());
        for (name, active) in &snapshot {
            let value: i64 = if *active { 1 } else { 0 };
            // Range-check before encode; the encoder must never be
            // handed a value it would have to clamp.
            if let Some(signal) = self.codec.database().signal(self.params.frame_id, name) {
                if let Err(e) = check_range(signal, value as f64) {
                    log::error!("Skipping transmit cycle: {}", e);
                    return;
                }
            }
            values.insert(name.clone(), SignalValue::Integer(value));
        }

        let frame = match self.codec.encode(self.params.frame_id, &values) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!(
                    "Failed to encode frame 0x{:X}: {}",
                    self.params.frame_id,
                    e
                );
                return;
            }
        };

        let attempts = self.params.retries.max(1);
        for attempt in 1..=attempts {
            match self.transport.send(&frame, self.params.send_timeout) {
                Ok(()) => {
                    log::debug!(
                        "Sent 0x{:X}: {:?}, data={:02X?}",
                        frame.id,
                        snapshot,
                        frame.data
                    );
                    return;
                }
                Err(e) => {
                    log::error!(
                        "Attempt {}/{} - error sending frame 0x{:X}: {}",
                        attempt,
                        attempts,
                        frame.id,
                        e
                    );
                    if attempt < attempts {
                        thread::sleep(self.params.retry_backoff);
                    }
                }
            }
        }
        log::error!(
            "Failed to send frame 0x{:X} after {} attempts",
            frame.id,
            attempts
        );
    }
}
