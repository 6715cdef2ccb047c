use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    api::modbus::{LoggingHook, SlaveBuilder},
    core::SerialSettings,
    protocol::store::{
        DEFAULT_COIL_COUNT, DEFAULT_READ_ONLY_COILS, DEFAULT_READ_ONLY_REGISTERS,
        DEFAULT_REGISTER_COUNT,
    },
};

/// RS-485 settling delays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnaroundConfig {
    /// Wait before asserting the direction line (milliseconds)
    pub pre_transmit_ms: u64,
    /// Wait after releasing the direction line (milliseconds)
    pub post_transmit_ms: u64,
}

impl Default for TurnaroundConfig {
    fn default() -> Self {
        Self {
            pre_transmit_ms: 3,
            post_transmit_ms: 1,
        }
    }
}

/// Register and coil map of the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterMapConfig {
    pub register_count: u16,
    pub coil_count: u16,
    pub read_only_registers: Vec<u16>,
    pub read_only_coils: Vec<u16>,
    /// Register whose single-register writes fire the host hook
    pub hooked_register: Option<u16>,
}

impl Default for RegisterMapConfig {
    fn default() -> Self {
        Self {
            register_count: DEFAULT_REGISTER_COUNT,
            coil_count: DEFAULT_COIL_COUNT,
            read_only_registers: DEFAULT_READ_ONLY_REGISTERS.to_vec(),
            read_only_coils: DEFAULT_READ_ONLY_COILS.to_vec(),
            hooked_register: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveBootConfig {
    /// Port name
    pub port_name: String,
    /// Port baud rate
    pub baud_rate: u32,
    /// Station address this slave answers to
    pub slave_address: u8,
    /// Idle time ending a frame in milliseconds (derived from the baud rate when unset)
    pub frame_gap_ms: Option<u64>,
    /// Drive the direction line through RTS
    pub rts_direction: bool,
    pub turnaround: TurnaroundConfig,
    pub map: RegisterMapConfig,
}

impl Default for SlaveBootConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            slave_address: 1,
            frame_gap_ms: None,
            rts_direction: true,
            turnaround: TurnaroundConfig::default(),
            map: RegisterMapConfig::default(),
        }
    }
}

impl SlaveBootConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).context("Invalid JSON configuration")
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("Invalid TOML configuration")
    }

    /// Read configuration from a file, picking the format by extension
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;

        match file_path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(anyhow!(
                "Unsupported configuration format {:?} for {}",
                other.unwrap_or(""),
                file_path.display()
            )),
        }
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port_name: self.port_name.clone(),
            baud_rate: self.baud_rate,
            frame_gap: self.frame_gap_ms.map(Duration::from_millis),
            rts_direction: self.rts_direction,
        }
    }

    /// Engine builder for this configuration. The hooked register, if any,
    /// gets a [`LoggingHook`].
    pub fn builder(&self) -> SlaveBuilder {
        let mut builder = SlaveBuilder::new(self.slave_address)
            .with_register_map(self.map.register_count, &self.map.read_only_registers)
            .with_coil_map(self.map.coil_count, &self.map.read_only_coils)
            .with_turnaround(
                Duration::from_millis(self.turnaround.pre_transmit_ms),
                Duration::from_millis(self.turnaround.post_transmit_ms),
            );
        if let Some(id) = self.map.hooked_register {
            builder = builder.with_register_hook(id, Arc::new(LoggingHook));
        }
        builder
    }

    /// Check everything the engine builder checks, plus the serial settings.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.port_name.is_empty(), "Port name is required");
        anyhow::ensure!(self.baud_rate > 0, "Baud rate must be positive");
        self.builder().build_parts().map(|_| ())
    }
}
