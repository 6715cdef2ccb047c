use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use flume::Sender;
use parking_lot::Mutex;
use std::{
    io::{Read, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use serialport::SerialPort;

use crate::api::{
    modbus::{Transport, TransportEvent},
    utils::open_serial_port,
};

/// Read timeout of the shared port handle; keeps the lock hold time short.
const POLL_TIMEOUT: Duration = Duration::from_millis(1);

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    /// Idle time that ends a frame. Derived from the baud rate when unset.
    pub frame_gap: Option<Duration>,
    /// Drive the RS-485 transmit-enable line through RTS.
    pub rts_direction: bool,
}

impl SerialSettings {
    pub fn new(port_name: &str, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            frame_gap: None,
            rts_direction: true,
        }
    }
}

#[derive(Debug, Default)]
struct ReceiveArm {
    armed: bool,
    max_len: usize,
}

/// Serial-port transport with idle-line framing.
///
/// A reader thread assembles bytes into frames and reports each one as a
/// [`TransportEvent::Received`]. Only bytes read while reception is armed
/// are kept; anything arriving while disarmed (our own echo on some
/// adapters, traffic during a reply) is thrown away as it is read.
pub struct SerialTransport {
    port_name: String,
    port: SharedPort,
    events: Sender<TransportEvent>,
    arm: Arc<Mutex<ReceiveArm>>,
    rts_direction: bool,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    pub fn open(settings: &SerialSettings, events: Sender<TransportEvent>) -> Result<Self> {
        let handle = open_serial_port(&settings.port_name, settings.baud_rate, POLL_TIMEOUT)?;
        let port: SharedPort = Arc::new(Mutex::new(handle));
        let arm = Arc::new(Mutex::new(ReceiveArm::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let gap = settings
            .frame_gap
            .unwrap_or_else(|| compute_gap(settings.baud_rate));

        log::info!(
            "Opened {} at {} baud (frame gap {:?})",
            settings.port_name,
            settings.baud_rate,
            gap
        );

        let reader = {
            let port = port.clone();
            let arm = arm.clone();
            let stop = stop.clone();
            let events = events.clone();
            std::thread::Builder::new()
                .name(format!("rtu-rx {}", settings.port_name))
                .spawn(move || read_loop(port, arm, events, stop, gap))
                .with_context(|| format!("Failed to spawn reader for {}", settings.port_name))?
        };

        Ok(Self {
            port_name: settings.port_name.clone(),
            port,
            events,
            arm,
            rts_direction: settings.rts_direction,
            stop,
            reader: Some(reader),
        })
    }
}

impl Transport for SerialTransport {
    fn arm_receive(&mut self, max_len: usize) -> Result<()> {
        let mut arm = self.arm.lock();
        arm.armed = true;
        arm.max_len = max_len;
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        {
            let mut port = self.port.lock();
            port.write_all(frame)
                .with_context(|| format!("Failed to write to {}", self.port_name))?;
            // Blocks until the UART has drained, so completion is real
            port.flush()
                .with_context(|| format!("Failed to flush {}", self.port_name))?;
        }
        self.events
            .send(TransportEvent::SendComplete)
            .map_err(|_| anyhow!("Event receiver for {} dropped", self.port_name))
    }

    fn set_line_direction(&mut self, transmit: bool) -> Result<()> {
        if !self.rts_direction {
            return Ok(());
        }
        self.port
            .lock()
            .write_request_to_send(transmit)
            .map_err(|err| anyhow!("Failed to set RTS on {}: {err}", self.port_name))
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

fn read_loop(
    port: SharedPort,
    arm: Arc<Mutex<ReceiveArm>>,
    events: Sender<TransportEvent>,
    stop: Arc<AtomicBool>,
    gap: Duration,
) {
    let mut assembling: Vec<u8> = Vec::with_capacity(256);
    let mut last_byte: Option<Instant> = None;
    let mut buf = [0u8; 256];

    while !stop.load(Ordering::Relaxed) {
        if let Some(t) = last_byte {
            if !assembling.is_empty() && t.elapsed() >= gap {
                finalize_frame(&mut assembling, &arm, &events);
                last_byte = None;
            }
        }

        let read = port.lock().read(&mut buf);
        match read {
            Ok(n) if n > 0 => {
                if accept_bytes(&mut assembling, &buf[..n], &arm) {
                    last_byte = Some(Instant::now());
                } else {
                    last_byte = None;
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::warn!("Serial read error: {e}");
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Append freshly read bytes to the frame being assembled. Returns `false`
/// when reception is disarmed, in which case the bytes and any partial frame
/// are dropped.
fn accept_bytes(assembling: &mut Vec<u8>, bytes: &[u8], arm: &Mutex<ReceiveArm>) -> bool {
    let arm = arm.lock();
    if !arm.armed {
        log::trace!("Discarding {} bytes read while not armed", bytes.len());
        assembling.clear();
        return false;
    }
    // One byte past the limit is enough for the engine to see an oversize frame
    let room = (arm.max_len + 1).saturating_sub(assembling.len());
    assembling.extend_from_slice(&bytes[..bytes.len().min(room)]);
    true
}

fn finalize_frame(
    assembling: &mut Vec<u8>,
    arm: &Mutex<ReceiveArm>,
    events: &Sender<TransportEvent>,
) {
    let mut arm = arm.lock();
    if !arm.armed {
        log::trace!("Discarding {} bytes received while not armed", assembling.len());
        assembling.clear();
        return;
    }
    arm.armed = false;
    drop(arm);

    let frame = Bytes::from(std::mem::take(assembling));
    if events.send(TransportEvent::Received(frame)).is_err() {
        log::warn!("Event receiver dropped, discarding frame");
    }
}

/// Modbus RTU inter-frame gap: 3.5 character times, fixed at 1.75 ms above
/// 19200 baud.
pub fn compute_gap(baud: u32) -> Duration {
    if baud > 19_200 {
        return Duration::from_micros(1_750);
    }
    let bit_time_us = 1_000_000u64 / baud.max(1) as u64;
    // start + 8 data + stop
    let byte_time_us = bit_time_us * 10;
    Duration::from_micros(byte_time_us.saturating_mul(35).saturating_div(10))
}
