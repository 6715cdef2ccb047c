use anyhow::Result;
use std::time::Duration;

use super::format_hex_bytes;
use crate::{
    api::modbus::{run_slave_loop, Clock, SlaveEngine, Transport},
    cli::config::SlaveBootConfig,
    core::{SerialTransport, SystemClock},
};

/// Tick period of the host loop. Short enough that replies stay well inside
/// the usual master response timeout.
const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Serve the configured register map on the serial port until Ctrl-C.
pub async fn handle_slave(config: SlaveBootConfig) -> Result<()> {
    config.validate()?;

    log::info!(
        "Starting slave on {} (address={}, baud={}, registers={}, coils={})",
        config.port_name,
        config.slave_address,
        config.baud_rate,
        config.map.register_count,
        config.map.coil_count
    );

    let (sender, receiver) = flume::unbounded();
    let transport = SerialTransport::open(&config.serial_settings(), sender)?;
    let mut engine = config
        .builder()
        .build(transport, SystemClock::new(), receiver)?;

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    let result = run_slave_loop(&mut engine, TICK_INTERVAL, shutdown).await;
    log::info!(
        "Slave {} stopped, registers: {}, coils: {}",
        engine.slave_address(),
        register_dump(&engine),
        coil_dump(&engine)
    );
    result
}

/// Register contents as big-endian hex, in id order.
fn register_dump<T: Transport, C: Clock>(engine: &SlaveEngine<T, C>) -> String {
    let bytes: Vec<u8> = (0..engine.register_count())
        .flat_map(|id| engine.get_register(id).to_be_bytes())
        .collect();
    format_hex_bytes(&bytes)
}

/// Coil states packed eight per byte, lowest id in bit 0, as a coil read
/// would return them.
fn coil_dump<T: Transport, C: Clock>(engine: &SlaveEngine<T, C>) -> String {
    let mut packed = vec![0u8; (engine.coil_count() as usize).div_ceil(8)];
    for id in 0..engine.coil_count() {
        if engine.get_coil(id) {
            packed[id as usize / 8] |= 1 << (id % 8);
        }
    }
    format_hex_bytes(&packed)
}
