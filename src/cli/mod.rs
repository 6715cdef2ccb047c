pub mod config;
pub mod modbus;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

use config::SlaveBootConfig;

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    build_command().get_matches()
}

fn build_command() -> Command {
    Command::new("rtu-slave")
        .about("Modbus RTU slave serving a register and coil map over a serial line")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file (.json or .toml)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .help("Serial port, overrides the configuration")
                .value_name("PORT"),
        )
        .arg(
            Arg::new("baud")
                .long("baud")
                .short('b')
                .help("Serial port baud rate, overrides the configuration")
                .value_name("BAUD")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("address")
                .long("address")
                .short('a')
                .help("Modbus slave address, overrides the configuration")
                .value_name("ID")
                .value_parser(clap::value_parser!(u8)),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("Print the effective configuration as JSON and exit")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Load the configuration file (defaults when absent) and apply command line
/// overrides on top of it.
pub fn resolve_config(matches: &ArgMatches) -> Result<SlaveBootConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SlaveBootConfig::from_file(path)?,
        None => SlaveBootConfig::default(),
    };

    if let Some(port) = matches.get_one::<String>("port") {
        config.port_name = port.clone();
    }
    if let Some(baud) = matches.get_one::<u32>("baud") {
        config.baud_rate = *baud;
    }
    if let Some(address) = matches.get_one::<u8>("address") {
        config.slave_address = *address;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_defaults() {
        let matches = build_command()
            .try_get_matches_from(["rtu-slave", "--port", "COM3", "-b", "19200", "-a", "12"])
            .unwrap();
        let config = resolve_config(&matches).unwrap();

        assert_eq!(config.port_name, "COM3");
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.slave_address, 12);
        assert_eq!(config.map, SlaveBootConfig::default().map);
    }

    #[test]
    fn test_dump_config_flag() {
        let matches = build_command()
            .try_get_matches_from(["rtu-slave", "--dump-config"])
            .unwrap();
        assert!(matches.get_flag("dump-config"));
        assert_eq!(resolve_config(&matches).unwrap(), SlaveBootConfig::default());
    }

    #[test]
    fn test_rejects_invalid_address() {
        assert!(build_command()
            .try_get_matches_from(["rtu-slave", "--address", "300"])
            .is_err());
    }
}
