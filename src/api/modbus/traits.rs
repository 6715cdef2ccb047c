//! Capabilities the slave engine needs from its environment
//!
//! The engine never touches hardware directly. A transport moves bytes and
//! drives the RS-485 direction line, a clock provides monotonic time and
//! short delays, and an optional hook lets the host react to register writes.
//!
//! Completion of asynchronous transport work is reported back through
//! [`TransportEvent`]s on a flume channel that the engine drains in `tick()`.
use anyhow::Result;
use bytes::Bytes;
use std::time::Duration;

/// Notifications from the transport to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete frame arrived (the line went idle).
    Received(Bytes),
    /// The last transmitted frame has fully left the wire.
    SendComplete,
}

/// Half-duplex serial link.
pub trait Transport: Send {
    /// Arm reception of the next frame of at most `max_len` bytes.
    ///
    /// The frame is delivered later as [`TransportEvent::Received`].
    fn arm_receive(&mut self, max_len: usize) -> Result<()>;

    /// Start sending `frame`. Completion is signalled with
    /// [`TransportEvent::SendComplete`].
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;

    /// Assert (`true`) or release (`false`) the transmit-enable line.
    fn set_line_direction(&mut self, transmit: bool) -> Result<()>;
}

/// Monotonic millisecond time source.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;

    /// Short wait used for bus turnaround.
    fn delay(&self, duration: Duration);
}

/// Side effect for writes to one designated register
///
/// Used by the host for domain actions such as resetting a counter when the
/// master writes its register.
pub trait RegisterHook: Send + Sync {
    fn on_register_written(&self, id: u16);
}

/// Hook that does nothing (useful for testing)
pub struct NoOpHook;

impl RegisterHook for NoOpHook {
    fn on_register_written(&self, _id: u16) {}
}

/// Hook that logs the write to the console
pub struct LoggingHook;

impl RegisterHook for LoggingHook {
    fn on_register_written(&self, id: u16) {
        log::info!("Hooked register {id} written by the bus master");
    }
}
