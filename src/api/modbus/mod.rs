pub mod core;
pub mod slave;
pub mod traits;

use anyhow::{anyhow, ensure, Result};
use std::{sync::Arc, time::Duration};

pub use crate::protocol::modbus::{ExceptionCode, FunctionCode};
pub use crate::protocol::store::Access;

pub use self::core::{EngineParts, LinkState, SlaveEngine, TransportClosed, Turnaround};
pub use slave::run_slave_loop;
pub use traits::{Clock, LoggingHook, NoOpHook, RegisterHook, Transport, TransportEvent};

use crate::protocol::store::{
    policy_table, CoilFile, RegisterFile, DEFAULT_COIL_COUNT, DEFAULT_READ_ONLY_COILS,
    DEFAULT_READ_ONLY_REGISTERS, DEFAULT_REGISTER_COUNT,
};

/// Largest register map whose full read still fits one reply frame.
pub const MAX_REGISTER_COUNT: u16 = 125;
/// Largest coil map whose full read still fits one reply frame.
pub const MAX_COIL_COUNT: u16 = 2000;

/// Builder for a [`SlaveEngine`].
///
/// Starts from the stock device map (33 registers, 44 coils and their
/// read-only tables) which can be replaced piece by piece.
///
/// # Example
///
/// ```no_run
/// use rtu_slave::api::modbus::{LoggingHook, SlaveBuilder};
/// use rtu_slave::core::{SerialSettings, SerialTransport, SystemClock};
/// use std::sync::Arc;
///
/// let (sender, receiver) = flume::unbounded();
/// let transport = SerialTransport::open(&SerialSettings::new("/dev/ttyUSB0", 9600), sender)?;
/// let mut slave = SlaveBuilder::new(1)
///     .with_register_map(40, &[0, 1, 2])
///     .with_register_hook(27, Arc::new(LoggingHook))
///     .build(transport, SystemClock::new(), receiver)?;
/// slave.start()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct SlaveBuilder {
    slave_address: u8,
    register_count: u16,
    read_only_registers: Vec<u16>,
    coil_count: u16,
    read_only_coils: Vec<u16>,
    turnaround: Turnaround,
    hook: Option<(u16, Arc<dyn RegisterHook>)>,
}

impl SlaveBuilder {
    /// Create a new builder for the slave answering at `slave_address`.
    pub fn new(slave_address: u8) -> Self {
        Self {
            slave_address,
            register_count: DEFAULT_REGISTER_COUNT,
            read_only_registers: DEFAULT_READ_ONLY_REGISTERS.to_vec(),
            coil_count: DEFAULT_COIL_COUNT,
            read_only_coils: DEFAULT_READ_ONLY_COILS.to_vec(),
            turnaround: Turnaround::default(),
            hook: None,
        }
    }

    /// Replace the register map: `count` registers, the listed ids read-only.
    pub fn with_register_map(mut self, count: u16, read_only: &[u16]) -> Self {
        self.register_count = count;
        self.read_only_registers = read_only.to_vec();
        self
    }

    /// Replace the coil map: `count` coils, the listed ids read-only.
    pub fn with_coil_map(mut self, count: u16, read_only: &[u16]) -> Self {
        self.coil_count = count;
        self.read_only_coils = read_only.to_vec();
        self
    }

    /// Set the RS-485 settling delays.
    pub fn with_turnaround(mut self, pre_transmit: Duration, post_transmit: Duration) -> Self {
        self.turnaround = Turnaround {
            pre_transmit,
            post_transmit,
        };
        self
    }

    /// Call `hook` whenever the master writes register `id` with function 0x06.
    pub fn with_register_hook(mut self, id: u16, hook: Arc<dyn RegisterHook>) -> Self {
        self.hook = Some((id, hook));
        self
    }

    /// Check the map and assemble the engine parts.
    pub fn build_parts(self) -> Result<EngineParts> {
        ensure!(
            (1..=247).contains(&self.slave_address),
            "Slave address {} is not a unicast address (1-247)",
            self.slave_address
        );
        ensure!(
            (1..=MAX_REGISTER_COUNT).contains(&self.register_count),
            "Register count {} must be between 1 and {MAX_REGISTER_COUNT}",
            self.register_count
        );
        ensure!(
            (1..=MAX_COIL_COUNT).contains(&self.coil_count),
            "Coil count {} must be between 1 and {MAX_COIL_COUNT}",
            self.coil_count
        );
        for &id in &self.read_only_registers {
            ensure_in_map("Read-only register", id, self.register_count)?;
        }
        for &id in &self.read_only_coils {
            ensure_in_map("Read-only coil", id, self.coil_count)?;
        }
        if let Some((id, _)) = &self.hook {
            ensure_in_map("Hooked register", *id, self.register_count)?;
        }

        Ok(EngineParts {
            slave_address: self.slave_address,
            registers: RegisterFile::new(policy_table(
                self.register_count,
                &self.read_only_registers,
            )),
            coils: CoilFile::new(policy_table(self.coil_count, &self.read_only_coils)),
            turnaround: self.turnaround,
            hook: self.hook,
        })
    }

    /// Build the engine on top of a transport, a clock and the receiving end
    /// of the channel the transport reports its events on.
    pub fn build<T: Transport, C: Clock>(
        self,
        transport: T,
        clock: C,
        events: flume::Receiver<TransportEvent>,
    ) -> Result<SlaveEngine<T, C>> {
        let parts = self.build_parts()?;
        Ok(SlaveEngine::new(parts, transport, clock, events))
    }
}

fn ensure_in_map(kind: &str, id: u16, capacity: u16) -> Result<()> {
    if id >= capacity {
        return Err(anyhow!(
            "{kind} id {id} is outside the map (capacity {capacity})"
        ));
    }
    Ok(())
}
