use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Character devices probed by the serial transport, in order
pub const DEFAULT_SERIAL_PATHS: [&str; 7] = [
    "/dev/ttyS1",
    "/dev/ttyS2",
    "/dev/ttyS3",
    "/dev/ttyMT0",
    "/dev/ttyMT1",
    "/dev/usb/lp0",
    "/dev/usblp0",
];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_paths")]
    pub paths: Vec<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_serial_paths() -> Vec<String> {
    DEFAULT_SERIAL_PATHS.iter().map(|p| p.to_string()).collect()
}
fn default_baud_rate() -> u32 {
    9600
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            paths: default_serial_paths(),
            baud_rate: default_baud_rate(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UsbConfig {
    /// Bound on each bulk OUT packet
    #[serde(default = "default_chunk_timeout_ms")]
    pub chunk_timeout_ms: u64,
    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,
}

fn default_chunk_timeout_ms() -> u64 {
    5000
}
fn default_inter_chunk_delay_ms() -> u64 {
    10
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            chunk_timeout_ms: default_chunk_timeout_ms(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BluetoothConfig {
    /// Ask the permission broker before opening RFCOMM channels
    #[serde(default)]
    pub permission_gated: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ManualPrinterConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_tcp_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TcpConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_tcp_port")]
    pub default_port: u16,
    /// Printers registered at start-up
    #[serde(default)]
    pub printers: Vec<ManualPrinterConfig>,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_tcp_port() -> u16 {
    9100
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            default_port: default_tcp_port(),
            printers: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ManagerConfig {
    #[serde(default = "default_read_poll_interval_ms")]
    pub read_poll_interval_ms: u64,
    /// Read window used by each background loop iteration
    #[serde(default = "default_background_read_timeout_ms")]
    pub background_read_timeout_ms: u64,
    /// Pause between a finished write and the next status probe
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_permission_timeout_secs")]
    pub permission_timeout_secs: u64,
}

fn default_read_poll_interval_ms() -> u64 {
    100
}
fn default_background_read_timeout_ms() -> u64 {
    50
}
fn default_settle_delay_ms() -> u64 {
    100
}
fn default_write_timeout_ms() -> u64 {
    10_000
}
fn default_permission_timeout_secs() -> u64 {
    30
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            read_poll_interval_ms: default_read_poll_interval_ms(),
            background_read_timeout_ms: default_background_read_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            permission_timeout_secs: default_permission_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProbeConfig {
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// One entry per read attempt after each candidate write
    #[serde(default = "default_read_timeouts_ms")]
    pub read_timeouts_ms: Vec<u64>,
    #[serde(default = "default_inter_candidate_delay_ms")]
    pub inter_candidate_delay_ms: u64,
}

fn default_drain_timeout_ms() -> u64 {
    50
}
fn default_read_timeouts_ms() -> Vec<u64> {
    vec![100, 200, 300]
}
fn default_inter_candidate_delay_ms() -> u64 {
    100
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
            read_timeouts_ms: default_read_timeouts_ms(),
            inter_candidate_delay_ms: default_inter_candidate_delay_ms(),
        }
    }
}

/// Timeouts shared by every transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    pub connect: Duration,
    pub write: Duration,
    pub usb_chunk: Duration,
    pub usb_inter_chunk: Duration,
    pub permission: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        PrintlinkConfig::default().timeouts()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PrintlinkConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub usb: UsbConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl PrintlinkConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Local config file, e.g. config/default.toml. Every field has a default.
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. PRINTLINK__TCP__CONNECT_TIMEOUT_MS=5000)
            .add_source(Environment::with_prefix("PRINTLINK").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manager.read_poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "manager.read_poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.probe.read_timeouts_ms.is_empty() {
            return Err(ConfigError::Message(
                "probe.read_timeouts_ms needs at least one entry".into(),
            ));
        }
        Ok(())
    }

    pub fn timeouts(&self) -> TransportTimeouts {
        TransportTimeouts {
            connect: Duration::from_millis(self.tcp.connect_timeout_ms),
            write: Duration::from_millis(self.manager.write_timeout_ms),
            usb_chunk: Duration::from_millis(self.usb.chunk_timeout_ms),
            usb_inter_chunk: Duration::from_millis(self.usb.inter_chunk_delay_ms),
            permission: Duration::from_secs(self.manager.permission_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = PrintlinkConfig::default();
        assert_eq!(config.serial.paths.len(), 7);
        assert_eq!(config.serial.paths[0], "/dev/ttyS1");
        assert_eq!(config.tcp.default_port, 9100);
        assert_eq!(config.probe.read_timeouts_ms, vec![100, 200, 300]);

        let timeouts = config.timeouts();
        assert_eq!(timeouts.connect, Duration::from_secs(10));
        assert_eq!(timeouts.permission, Duration::from_secs(30));
        assert_eq!(timeouts.usb_chunk, Duration::from_millis(5000));
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("printlink-empty-{}", uuid::Uuid::new_v4()));
        let config = PrintlinkConfig::load(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.manager.read_poll_interval_ms, 100);
    }

    #[test]
    fn test_load_reads_toml_overrides() {
        let dir = std::env::temp_dir().join(format!("printlink-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut file = std::fs::File::create(dir.join("default.toml")).unwrap();
        writeln!(
            file,
            "[tcp]\nconnect_timeout_ms = 2500\n\n[[tcp.printers]]\nname = \"Dock\"\nhost = \"10.1.1.9\"\n"
        )
        .unwrap();

        let config = PrintlinkConfig::load(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.tcp.connect_timeout_ms, 2500);
        assert_eq!(config.tcp.printers.len(), 1);
        assert_eq!(config.tcp.printers[0].port, 9100);
        assert_eq!(config.usb.chunk_timeout_ms, 5000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_rejects_zero_poll_interval() {
        let dir = std::env::temp_dir().join(format!("printlink-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.toml"), "[manager]\nread_poll_interval_ms = 0\n").unwrap();

        let err = PrintlinkConfig::load(dir.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("read_poll_interval_ms"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
