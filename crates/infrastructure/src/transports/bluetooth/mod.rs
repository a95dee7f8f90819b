//! Bluetooth Classic printers over the Serial Port Profile.
//!
//! Discovery lists bonded devices only; pairing happens outside this crate.
//! The adapter behind [`BluetoothAdapter`] is swappable: [`RfcommTtyAdapter`]
//! works with kernel-bound `/dev/rfcommN` nodes, and with the `bluetooth`
//! feature [`BluezAdapter`] talks to BlueZ over D-Bus directly.

#[cfg(feature = "bluetooth")]
mod bluez;
mod tty;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{ConnectError, Device, PrinterError, PrinterTransport, TransportKind, WriteError};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(feature = "bluetooth")]
pub use bluez::BluezAdapter;
pub use tty::RfcommTtyAdapter;

use super::stream_io::{ReadOutcome, read_chunk, write_all_within};
use crate::config::TransportTimeouts;
use crate::permission::{PermissionBroker, ensure_permission};

/// Serial Port Profile service class
pub const SPP_UUID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

const READ_BUFFER: usize = 1024;

/// Fallback name for bonded devices that never reported one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Byte stream of an open RFCOMM channel
pub trait RfcommStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> RfcommStream for T {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondedDevice {
    pub address: String,
    pub name: Option<String>,
}

/// Host Bluetooth stack
#[async_trait]
pub trait BluetoothAdapter: Send + Sync {
    /// Devices bonded with the local adapter. Fails with
    /// [`PrinterError::Discovery`] when no adapter is usable.
    async fn bonded_devices(&self) -> Result<Vec<BondedDevice>, PrinterError>;

    /// Open an RFCOMM channel to `service` on the device at `address`
    async fn open_rfcomm(&self, address: &str, service: Uuid) -> Result<Box<dyn RfcommStream>, ConnectError>;
}

/// `XX:XX:XX:XX:XX:XX`, either case
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

pub struct BluetoothTransport {
    adapter: Arc<dyn BluetoothAdapter>,
    broker: Arc<dyn PermissionBroker>,
    permission_gated: bool,
    timeouts: TransportTimeouts,
    stream: Option<Box<dyn RfcommStream>>,
    address: Option<String>,
    closed: bool,
}

impl BluetoothTransport {
    pub fn new(
        adapter: Arc<dyn BluetoothAdapter>,
        broker: Arc<dyn PermissionBroker>,
        permission_gated: bool,
        timeouts: TransportTimeouts,
    ) -> Self {
        Self {
            adapter,
            broker,
            permission_gated,
            timeouts,
            stream: None,
            address: None,
            closed: false,
        }
    }
}

#[async_trait]
impl PrinterTransport for BluetoothTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::BluetoothRfcomm
    }

    async fn discover(&mut self) -> Result<Vec<Device>, PrinterError> {
        let bonded = self.adapter.bonded_devices().await?;
        debug!(count = bonded.len(), "Bonded Bluetooth devices");
        Ok(bonded
            .into_iter()
            .map(|d| {
                let name = d.name.unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
                Device::new(name, d.address, TransportKind::BluetoothRfcomm)
            })
            .collect())
    }

    async fn connect(&mut self, device: &Device) -> Result<(), ConnectError> {
        self.disconnect().await;

        if !is_valid_mac(&device.address) {
            return Err(ConnectError::InvalidAddress(device.address.clone()));
        }
        if self.permission_gated {
            ensure_permission(self.broker.as_ref(), device, self.timeouts.permission).await?;
        }

        info!(address = %device.address, "Opening RFCOMM channel");
        let open = self.adapter.open_rfcomm(&device.address, SPP_UUID);
        let stream = match tokio::time::timeout(self.timeouts.connect, open).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(address = %device.address, error = %e, "RFCOMM connect failed");
                return Err(e);
            }
            Err(_) => {
                warn!(address = %device.address, "RFCOMM connect timed out");
                return Err(ConnectError::TransportOpenFailed("Connection timed out".to_string()));
            }
        };

        info!(address = %device.address, "Bluetooth printer connected");
        self.stream = Some(stream);
        self.address = Some(device.address.clone());
        self.closed = false;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let Some(stream) = self.stream.as_mut().filter(|_| !self.closed) else {
            return Err(WriteError::NotConnected);
        };

        let result = write_all_within(stream, data, self.timeouts.write).await;
        match &result {
            Ok(()) => debug!(bytes = data.len(), "Data sent over RFCOMM"),
            Err(e) => {
                error!("Bluetooth write failed: {}", e);
                self.closed = true;
            }
        }
        result
    }

    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PrinterError> {
        if self.closed {
            return Err(PrinterError::NotConnected);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(PrinterError::NotConnected);
        };

        match read_chunk(stream, timeout, READ_BUFFER).await {
            ReadOutcome::Data(bytes) => Ok(Some(bytes)),
            ReadOutcome::Idle => Ok(None),
            ReadOutcome::Closed => {
                info!("Bluetooth printer closed the channel");
                self.closed = true;
                Ok(None)
            }
            ReadOutcome::Failed(e) => {
                self.closed = true;
                Err(PrinterError::ReadFailed(e.to_string()))
            }
        }
    }

    fn can_read(&self) -> bool {
        self.stream.is_some()
    }

    fn is_live(&self) -> bool {
        self.stream.is_some() && !self.closed
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "Error closing Bluetooth printer");
            }
        }
        self.closed = false;
        if let Some(address) = self.address.take() {
            info!(address = %address, "Bluetooth printer disconnected");
        }
    }
}
