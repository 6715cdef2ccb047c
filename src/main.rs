use anyhow::Result;

use rtu_slave::cli::{modbus::handle_slave, parse_args, resolve_config};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = parse_args();
    let config = resolve_config(&matches)?;

    if matches.get_flag("dump-config") {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    handle_slave(config).await
}
