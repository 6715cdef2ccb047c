//! The slave engine - one owned object per station
//!
//! The engine owns the register and coil files, the watchdog and the
//! half-duplex link state. Everything happens inside [`SlaveEngine::tick`]:
//! pending transport events are drained in order, a received frame is
//! validated, dispatched and answered before the next event is looked at,
//! and the receiver is only re-armed once the reply has left the wire.
use anyhow::{Context, Result};
use std::{fmt, sync::Arc, time::Duration};

use super::traits::{Clock, RegisterHook, Transport, TransportEvent};
use crate::protocol::{
    modbus::{dispatch, validate, Dispatched, PendingResponse, MAX_FRAME_LEN},
    store::{CoilFile, RegisterFile},
    watchdog::Watchdog,
};

/// Settling delays around a transmission on an RS-485 bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turnaround {
    /// Wait before asserting the transmit-enable line.
    pub pre_transmit: Duration,
    /// Wait after releasing it.
    pub post_transmit: Duration,
}

impl Default for Turnaround {
    fn default() -> Self {
        Self {
            pre_transmit: Duration::from_millis(3),
            post_transmit: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Receiving,
    Transmitting,
}

/// The transport dropped its end of the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportClosed;

impl fmt::Display for TransportClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport event channel closed")
    }
}

impl std::error::Error for TransportClosed {}

/// Everything a [`SlaveEngine`] is built from besides its capabilities.
pub struct EngineParts {
    pub slave_address: u8,
    pub registers: RegisterFile,
    pub coils: CoilFile,
    pub turnaround: Turnaround,
    pub hook: Option<(u16, Arc<dyn RegisterHook>)>,
}

pub struct SlaveEngine<T: Transport, C: Clock> {
    slave_address: u8,
    transport: T,
    clock: C,
    events: flume::Receiver<TransportEvent>,
    registers: RegisterFile,
    coils: CoilFile,
    watchdog: Watchdog,
    turnaround: Turnaround,
    hook: Option<(u16, Arc<dyn RegisterHook>)>,
    link: LinkState,
}

impl<T: Transport, C: Clock> SlaveEngine<T, C> {
    pub fn new(
        parts: EngineParts,
        transport: T,
        clock: C,
        events: flume::Receiver<TransportEvent>,
    ) -> Self {
        let watchdog = Watchdog::new(clock.now_ms());
        Self {
            slave_address: parts.slave_address,
            transport,
            clock,
            events,
            registers: parts.registers,
            coils: parts.coils,
            watchdog,
            turnaround: parts.turnaround,
            hook: parts.hook,
            link: LinkState::Receiving,
        }
    }

    /// Release the bus and arm reception of the first frame.
    pub fn start(&mut self) -> Result<()> {
        log::info!(
            "Starting Modbus RTU slave at address {} ({} registers, {} coils)",
            self.slave_address,
            self.registers.capacity(),
            self.coils.capacity()
        );
        self.transport.set_line_direction(false)?;
        self.transport.arm_receive(MAX_FRAME_LEN)?;
        self.link = LinkState::Receiving;
        Ok(())
    }

    /// Advance the watchdog and handle every pending transport event.
    ///
    /// Call this on every iteration of the host loop.
    pub fn tick(&mut self) -> Result<()> {
        self.watchdog.check(self.clock.now_ms());

        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(flume::TryRecvError::Empty) => break,
                Err(flume::TryRecvError::Disconnected) => return Err(TransportClosed.into()),
            };

            match event {
                TransportEvent::Received(raw) => self.on_frame(&raw)?,
                TransportEvent::SendComplete => self.on_send_complete()?,
            }
        }

        Ok(())
    }

    fn on_frame(&mut self, raw: &[u8]) -> Result<()> {
        if self.link == LinkState::Transmitting {
            log::warn!(
                "Dropping {} bytes received while a reply is still in flight",
                raw.len()
            );
            return Ok(());
        }

        log::debug!("Received Modbus request: {raw:02x?}");
        let frame = match validate(raw, self.slave_address) {
            Ok(frame) => frame,
            Err(rejection) => {
                log::debug!("Dropping frame silently: {rejection}");
                return self.transport.arm_receive(MAX_FRAME_LEN);
            }
        };

        self.watchdog.feed(self.clock.now_ms());

        let Dispatched {
            response,
            register_written,
        } = dispatch(&frame, &mut self.registers, &mut self.coils);

        if let (Some(id), Some((hooked, hook))) = (register_written, &self.hook) {
            if id == *hooked {
                hook.on_register_written(id);
            }
        }

        self.send_response(response)
    }

    fn send_response(&mut self, response: PendingResponse) -> Result<()> {
        let frame = response.into_frame(self.slave_address);
        log::debug!("Send Modbus response: {frame:02x?}");

        self.clock.delay(self.turnaround.pre_transmit);
        if let Err(err) = self.begin_transmit(&frame) {
            // Reception must come back even when the line driver misbehaves
            if let Err(release_err) = self.release_line() {
                log::warn!("Failed to recover the line after a failed reply: {release_err:#}");
            }
            return Err(err);
        }
        Ok(())
    }

    fn begin_transmit(&mut self, frame: &[u8]) -> Result<()> {
        self.transport
            .set_line_direction(true)
            .context("Failed to assert the transmit line")?;
        self.link = LinkState::Transmitting;
        self.transport
            .transmit(frame)
            .context("Failed to transmit Modbus response")
    }

    fn on_send_complete(&mut self) -> Result<()> {
        if self.link != LinkState::Transmitting {
            log::trace!("Ignoring send-complete with no reply in flight");
            return Ok(());
        }
        self.release_line()
    }

    /// Release the transmit line and re-arm reception. Arming is attempted
    /// even if the release fails; the first error is returned.
    fn release_line(&mut self) -> Result<()> {
        let released = self
            .transport
            .set_line_direction(false)
            .context("Failed to release the transmit line");
        self.clock.delay(self.turnaround.post_transmit);
        self.link = LinkState::Receiving;
        let armed = self
            .transport
            .arm_receive(MAX_FRAME_LEN)
            .context("Failed to arm reception");
        released.and(armed)
    }

    pub fn is_master_silent(&self) -> bool {
        self.watchdog.is_master_silent()
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn slave_address(&self) -> u8 {
        self.slave_address
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn register_count(&self) -> u16 {
        self.registers.capacity() as u16
    }

    pub fn coil_count(&self) -> u16 {
        self.coils.capacity() as u16
    }

    pub fn get_coil(&self, id: u16) -> bool {
        self.coils.get(id as usize)
    }

    pub fn set_coil(&mut self, id: u16) {
        self.coils.set(id as usize);
    }

    pub fn clear_coil(&mut self, id: u16) {
        self.coils.clear(id as usize);
    }

    pub fn toggle_coil(&mut self, id: u16) {
        self.coils.toggle(id as usize);
    }

    pub fn get_register(&self, id: u16) -> u16 {
        self.registers.get(id as usize)
    }

    pub fn set_register(&mut self, id: u16, value: u16) {
        self.registers.set(id as usize, value);
    }
}

