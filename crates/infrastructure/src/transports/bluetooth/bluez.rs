use async_trait::async_trait;
use bluer::rfcomm::{Profile, Role};
use bluer::{Address, Session};
use domain::{ConnectError, PrinterError};
use futures_util::StreamExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BluetoothAdapter, BondedDevice, RfcommStream};

/// BlueZ over D-Bus. Channels are opened through a client SPP profile, so
/// no `rfcomm bind` is needed.
pub struct BluezAdapter {
    session: Session,
}

impl BluezAdapter {
    pub async fn new() -> Result<Self, PrinterError> {
        let session = Session::new()
            .await
            .map_err(|e| PrinterError::Discovery(format!("Bluetooth not available: {}", e)))?;
        Ok(Self { session })
    }

    async fn adapter(&self) -> bluer::Result<bluer::Adapter> {
        self.session.default_adapter().await
    }
}

fn open_failed(e: bluer::Error) -> ConnectError {
    ConnectError::TransportOpenFailed(e.to_string())
}

#[async_trait]
impl BluetoothAdapter for BluezAdapter {
    async fn bonded_devices(&self) -> Result<Vec<BondedDevice>, PrinterError> {
        let adapter = self
            .adapter()
            .await
            .map_err(|_| PrinterError::Discovery("Bluetooth not available".into()))?;
        if !adapter.is_powered().await.unwrap_or(false) {
            return Err(PrinterError::Discovery("Bluetooth is disabled".into()));
        }

        let addresses = adapter
            .device_addresses()
            .await
            .map_err(|e| PrinterError::Discovery(e.to_string()))?;

        let mut bonded = Vec::new();
        for address in addresses {
            let Ok(device) = adapter.device(address) else {
                continue;
            };
            if !device.is_paired().await.unwrap_or(false) {
                continue;
            }
            let name = device.name().await.ok().flatten();
            bonded.push(BondedDevice {
                address: address.to_string(),
                name,
            });
        }
        debug!(count = bonded.len(), "BlueZ bonded devices");
        Ok(bonded)
    }

    async fn open_rfcomm(&self, address: &str, service: Uuid) -> Result<Box<dyn RfcommStream>, ConnectError> {
        let target: Address = address
            .parse()
            .map_err(|_| ConnectError::InvalidAddress(address.to_string()))?;
        let adapter = self.adapter().await.map_err(open_failed)?;
        let device = adapter
            .device(target)
            .map_err(|_| ConnectError::DeviceNotFound(address.to_string()))?;

        let profile = Profile {
            uuid: service,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut requests = self.session.register_profile(profile).await.map_err(open_failed)?;

        info!(address = %address, "Connecting SPP profile");
        let request = tokio::select! {
            connected = device.connect_profile(&service) => {
                connected.map_err(open_failed)?;
                requests.next().await
            }
            request = requests.next() => request,
        };

        let request = request
            .filter(|r| r.device() == target)
            .ok_or(ConnectError::NoCompatibleEndpoint)?;
        let stream = request.accept().map_err(open_failed)?;
        Ok(Box::new(stream))
    }
}
