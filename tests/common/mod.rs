#![allow(dead_code)]

use anyhow::{anyhow, Result};
use flume::Sender;
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use rtu_slave::{
    api::modbus::{Clock, RegisterHook, SlaveBuilder, SlaveEngine, Transport, TransportEvent},
    protocol::modbus::crc,
};

/// Everything the engine did to its capabilities, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Arm(usize),
    Transmit(Vec<u8>),
    Direction(bool),
    Delay(Duration),
    Hook(u16),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Transport double that records every call. With `completions` set it
/// reports `SendComplete` right after each transmit, like a UART whose
/// shift register drains instantly.
pub struct MockTransport {
    calls: CallLog,
    completions: Option<Sender<TransportEvent>>,
    fail_transmit: bool,
    faults: Arc<Mutex<LineFaults>>,
}

/// Pending `set_line_direction` failures, armed once the engine has started.
#[derive(Debug, Default)]
pub struct LineFaults {
    pub assert_failures: usize,
    pub release_failures: usize,
}

impl Transport for MockTransport {
    fn arm_receive(&mut self, max_len: usize) -> Result<()> {
        self.calls.lock().push(Call::Arm(max_len));
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        if self.fail_transmit {
            return Err(anyhow!("simulated UART failure"));
        }
        self.calls.lock().push(Call::Transmit(frame.to_vec()));
        if let Some(completions) = &self.completions {
            completions.send(TransportEvent::SendComplete)?;
        }
        Ok(())
    }

    fn set_line_direction(&mut self, transmit: bool) -> Result<()> {
        let mut faults = self.faults.lock();
        let failures = if transmit {
            &mut faults.assert_failures
        } else {
            &mut faults.release_failures
        };
        if *failures > 0 {
            *failures -= 1;
            return Err(anyhow!("simulated RTS failure"));
        }
        self.calls.lock().push(Call::Direction(transmit));
        Ok(())
    }
}

/// Clock driven by the test. Delays are recorded and advance time.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    calls: CallLog,
}

impl ManualClock {
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay(&self, duration: Duration) {
        self.calls.lock().push(Call::Delay(duration));
        self.now
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

/// Hook that records into the shared call log.
pub struct RecordingHook(pub CallLog);

impl RegisterHook for RecordingHook {
    fn on_register_written(&self, id: u16) {
        self.0.lock().push(Call::Hook(id));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HarnessOptions {
    pub auto_complete: bool,
    pub fail_transmit: bool,
    /// Number of `set_line_direction(true)` calls that fail before it works.
    pub assert_failures: usize,
    /// Same for `set_line_direction(false)`.
    pub release_failures: usize,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            auto_complete: true,
            fail_transmit: false,
            assert_failures: 0,
            release_failures: 0,
        }
    }
}

pub struct Harness {
    pub engine: SlaveEngine<MockTransport, ManualClock>,
    pub bus: Sender<TransportEvent>,
    pub calls: CallLog,
    pub clock: ManualClock,
}

impl Harness {
    /// Stock device map at address 1, started, with the call log cleared.
    pub fn new() -> Self {
        Self::with_builder(SlaveBuilder::new(1), HarnessOptions::default())
    }

    pub fn with_builder(builder: SlaveBuilder, options: HarnessOptions) -> Self {
        let calls = CallLog::default();
        Self::with_log(builder, options, calls)
    }

    /// Share `calls` with a hook built before the harness.
    pub fn with_log(builder: SlaveBuilder, options: HarnessOptions, calls: CallLog) -> Self {
        let (bus, events) = flume::unbounded();
        let faults = Arc::new(Mutex::new(LineFaults::default()));
        let transport = MockTransport {
            calls: calls.clone(),
            completions: options.auto_complete.then(|| bus.clone()),
            fail_transmit: options.fail_transmit,
            faults: faults.clone(),
        };
        let clock = ManualClock {
            now: Arc::new(AtomicU64::new(0)),
            calls: calls.clone(),
        };
        let mut engine = builder
            .build(transport, clock.clone(), events)
            .unwrap();
        engine.start().unwrap();
        calls.lock().clear();
        *faults.lock() = LineFaults {
            assert_failures: options.assert_failures,
            release_failures: options.release_failures,
        };

        Self {
            engine,
            bus,
            calls,
            clock,
        }
    }

    /// Deliver a raw frame without ticking.
    pub fn deliver(&self, raw: &[u8]) {
        self.bus
            .send(TransportEvent::Received(raw.to_vec().into()))
            .unwrap();
    }

    /// Deliver a raw frame, tick once and return the transmitted reply, if any.
    pub fn request(&mut self, raw: &[u8]) -> Option<Vec<u8>> {
        self.calls.lock().clear();
        self.deliver(raw);
        self.engine.tick().unwrap();
        self.transmitted().pop()
    }

    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Transmit(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }
}

/// Append the Modbus CRC to a request body.
pub fn with_crc(body: &[u8]) -> Vec<u8> {
    let mut frame = body.to_vec();
    crc::append(&mut frame);
    frame
}
