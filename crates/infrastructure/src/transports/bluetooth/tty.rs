use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domain::{ConnectError, PrinterError};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{BluetoothAdapter, BondedDevice, RfcommStream, is_valid_mac};

/// Uses the kernel RFCOMM layer: bonds are read from the BlueZ state
/// directory and channels are the `/dev/rfcommN` nodes bound with
/// `rfcomm bind`.
#[derive(Debug, Clone)]
pub struct RfcommTtyAdapter {
    state_dir: PathBuf,
    bindings: PathBuf,
    dev_dir: PathBuf,
    baud_rate: u32,
}

impl Default for RfcommTtyAdapter {
    fn default() -> Self {
        Self::new("/var/lib/bluetooth", "/proc/net/rfcomm", "/dev", 9600)
    }
}

impl RfcommTtyAdapter {
    pub fn new(
        state_dir: impl Into<PathBuf>,
        bindings: impl Into<PathBuf>,
        dev_dir: impl Into<PathBuf>,
        baud_rate: u32,
    ) -> Self {
        Self {
            state_dir: state_dir.into(),
            bindings: bindings.into(),
            dev_dir: dev_dir.into(),
            baud_rate,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    fn find_node(&self, address: &str) -> Option<PathBuf> {
        let contents = std::fs::read_to_string(&self.bindings).ok()?;
        let name = bound_node(&contents, address)?;
        let path = self.dev_dir.join(name);
        path.exists().then_some(path)
    }
}

/// `Some(name)` when the `info` file records a link key
pub(crate) fn parse_bond_info(contents: &str) -> Option<Option<String>> {
    let mut name = None;
    let mut bonded = false;
    for line in contents.lines().map(str::trim) {
        if line == "[LinkKey]" {
            bonded = true;
        } else if let Some(value) = line.strip_prefix("Name=") {
            if name.is_none() && !value.is_empty() {
                name = Some(value.to_string());
            }
        }
    }
    bonded.then_some(name)
}

/// Node name bound to `mac` in a `/proc/net/rfcomm` listing
/// (`rfcomm0: 00:11:22:33:44:55 channel 1 clean`)
pub(crate) fn bound_node(listing: &str, mac: &str) -> Option<String> {
    let mac = mac.to_uppercase();
    listing
        .lines()
        .filter(|line| line.to_uppercase().contains(&mac))
        .filter_map(|line| line.split(':').next())
        .map(|name| name.trim().to_string())
        .find(|name| name.starts_with("rfcomm"))
}

fn scan_state_dir(state_dir: &Path) -> Result<Vec<BondedDevice>, PrinterError> {
    let adapters = std::fs::read_dir(state_dir).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PrinterError::Discovery("Bluetooth not available".into()),
        ErrorKind::PermissionDenied => PrinterError::Discovery("Bluetooth permissions not granted".into()),
        _ => PrinterError::Discovery(e.to_string()),
    })?;

    let mut bonded = Vec::new();
    for adapter in adapters.flatten() {
        let adapter_name = adapter.file_name().to_string_lossy().into_owned();
        if !is_valid_mac(&adapter_name) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(adapter.path()) else {
            warn!(adapter = %adapter_name, "Bluetooth adapter state unreadable");
            continue;
        };
        for entry in entries.flatten() {
            let address = entry.file_name().to_string_lossy().to_uppercase();
            if !is_valid_mac(&address) {
                continue;
            }
            let Ok(info) = std::fs::read_to_string(entry.path().join("info")) else {
                continue;
            };
            if let Some(name) = parse_bond_info(&info) {
                bonded.push(BondedDevice { address, name });
            }
        }
    }
    bonded.sort_by(|a, b| a.address.cmp(&b.address));
    Ok(bonded)
}

#[async_trait]
impl BluetoothAdapter for RfcommTtyAdapter {
    async fn bonded_devices(&self) -> Result<Vec<BondedDevice>, PrinterError> {
        let state_dir = self.state_dir.clone();
        tokio::task::spawn_blocking(move || scan_state_dir(&state_dir))
            .await
            .map_err(|e| PrinterError::Discovery(e.to_string()))?
    }

    async fn open_rfcomm(&self, address: &str, _service: Uuid) -> Result<Box<dyn RfcommStream>, ConnectError> {
        // the kernel binding already fixed the channel
        let Some(node) = self.find_node(address) else {
            return Err(ConnectError::DeviceNotFound(format!(
                "{} has no bound RFCOMM device",
                address
            )));
        };

        debug!(node = %node.display(), address = %address, "Opening RFCOMM tty");
        let port = tokio_serial::new(node.to_string_lossy(), self.baud_rate)
            .open_native_async()
            .map_err(|e| ConnectError::TransportOpenFailed(format!("{}: {}", node.display(), e)))?;
        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("printlink-bt-{}-{}", label, Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_bond_info() {
        let bonded = "[General]\nName=XP-P323B\nClass=0x040680\n\n[LinkKey]\nKey=0011\nType=4\n";
        assert_eq!(parse_bond_info(bonded), Some(Some("XP-P323B".to_string())));

        let nameless = "[General]\nClass=0x040680\n[LinkKey]\nKey=0011\n";
        assert_eq!(parse_bond_info(nameless), Some(None));

        let seen_only = "[General]\nName=Headphones\n";
        assert_eq!(parse_bond_info(seen_only), None);
    }

    #[test]
    fn test_baud_rate_override_keeps_default_paths() {
        let adapter = RfcommTtyAdapter::default().with_baud_rate(115_200);
        assert_eq!(adapter.baud_rate, 115_200);
        assert_eq!(adapter.state_dir, PathBuf::from("/var/lib/bluetooth"));
        assert_eq!(adapter.bindings, PathBuf::from("/proc/net/rfcomm"));
        assert_eq!(adapter.dev_dir, PathBuf::from("/dev"));
    }

    #[test]
    fn test_bound_node() {
        let listing = "rfcomm0: 00:11:62:AA:BB:CC channel 1 clean\nrfcomm1: 66:11:22:33:44:55 channel 1 connected\n";
        assert_eq!(bound_node(listing, "66:11:22:33:44:55"), Some("rfcomm1".to_string()));
        assert_eq!(bound_node(listing, "00:11:62:aa:bb:cc"), Some("rfcomm0".to_string()));
        assert_eq!(bound_node(listing, "00:00:00:00:00:01"), None);
    }

    #[tokio::test]
    async fn test_bonded_devices_from_state_dir() {
        let state = scratch_dir("state");
        let adapter_dir = state.join("5C:F3:70:00:00:01");
        for (mac, info) in [
            ("00:11:62:AA:BB:CC", "[General]\nName=XP-P323B\n[LinkKey]\nKey=1\n"),
            ("00:11:62:00:00:09", "[General]\nName=Speaker\n"),
        ] {
            std::fs::create_dir_all(adapter_dir.join(mac)).unwrap();
            std::fs::write(adapter_dir.join(mac).join("info"), info).unwrap();
        }
        std::fs::create_dir_all(adapter_dir.join("cache")).unwrap();

        let adapter = RfcommTtyAdapter::new(&state, "/nonexistent", "/dev", 9600);
        let devices = adapter.bonded_devices().await.unwrap();
        assert_eq!(
            devices,
            vec![BondedDevice {
                address: "00:11:62:AA:BB:CC".into(),
                name: Some("XP-P323B".into()),
            }]
        );

        std::fs::remove_dir_all(&state).ok();
    }

    #[tokio::test]
    async fn test_missing_state_dir_means_unavailable() {
        let adapter = RfcommTtyAdapter::new("/nonexistent/bluetooth", "/nonexistent", "/dev", 9600);
        assert_eq!(
            adapter.bonded_devices().await,
            Err(PrinterError::Discovery("Bluetooth not available".into()))
        );
    }

    #[tokio::test]
    async fn test_open_unbound_device() {
        let dir = scratch_dir("proc");
        let listing = dir.join("rfcomm");
        std::fs::write(&listing, "rfcomm0: 00:11:62:AA:BB:CC channel 1 clean\n").unwrap();
        let adapter = RfcommTtyAdapter::new("/nonexistent", &listing, &dir, 9600);

        let result = adapter.open_rfcomm("66:11:22:33:44:55", super::super::SPP_UUID).await;
        assert!(matches!(result, Err(ConnectError::DeviceNotFound(_))));

        // bound, but the node does not exist under the device dir
        let result = adapter.open_rfcomm("00:11:62:AA:BB:CC", super::super::SPP_UUID).await;
        assert!(matches!(result, Err(ConnectError::DeviceNotFound(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
