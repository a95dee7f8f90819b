//! One manager per transport kind with a single active selection

use std::sync::{Arc, RwLock};

use domain::{ConnectionState, Device, PrinterError, PrinterTransport, TransportKind};
use infrastructure::{PermissionBroker, PrintlinkConfig, TransportFactory};
use tracing::info;

use crate::manager::{DeviceManager, ManagerTimings};
use crate::status::{ProbeTimings, StatusProbe};

pub struct PrinterRegistry {
    serial: Arc<DeviceManager>,
    usb: Arc<DeviceManager>,
    bluetooth: Arc<DeviceManager>,
    tcp: Arc<DeviceManager>,
    active: RwLock<TransportKind>,
}

impl PrinterRegistry {
    /// Each transport must report the kind of the slot it is given
    pub fn new(
        serial: Box<dyn PrinterTransport>,
        usb: Box<dyn PrinterTransport>,
        bluetooth: Box<dyn PrinterTransport>,
        tcp: Box<dyn PrinterTransport>,
        timings: ManagerTimings,
        probe: StatusProbe,
    ) -> Self {
        let manager = |transport| Arc::new(DeviceManager::new(transport, timings, probe.clone()));
        Self {
            serial: manager(serial),
            usb: manager(usb),
            bluetooth: manager(bluetooth),
            tcp: manager(tcp),
            active: RwLock::new(TransportKind::Serial),
        }
    }

    pub async fn from_config(config: &PrintlinkConfig, broker: Arc<dyn PermissionBroker>) -> Self {
        let serial = TransportFactory::create(TransportKind::Serial, config, Arc::clone(&broker)).await;
        let usb = TransportFactory::create(TransportKind::UsbBulk, config, Arc::clone(&broker)).await;
        let bluetooth = TransportFactory::create(TransportKind::BluetoothRfcomm, config, Arc::clone(&broker)).await;
        let tcp = TransportFactory::create(TransportKind::TcpSocket, config, broker).await;

        Self::new(
            Box::new(serial),
            Box::new(usb),
            Box::new(bluetooth),
            Box::new(tcp),
            ManagerTimings::from(&config.manager),
            StatusProbe::new(ProbeTimings::from(&config.probe)),
        )
    }

    pub fn manager(&self, kind: TransportKind) -> &Arc<DeviceManager> {
        match kind {
            TransportKind::Serial => &self.serial,
            TransportKind::UsbBulk => &self.usb,
            TransportKind::BluetoothRfcomm => &self.bluetooth,
            TransportKind::TcpSocket => &self.tcp,
        }
    }

    /// Make `kind` the active manager. The others keep their state.
    pub fn select(&self, kind: TransportKind) -> Arc<DeviceManager> {
        let mut active = self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *active != kind {
            info!(from = %*active, to = %kind, "Switching printer type");
            *active = kind;
        }
        Arc::clone(self.manager(kind))
    }

    pub fn active_kind(&self) -> TransportKind {
        *self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active(&self) -> Arc<DeviceManager> {
        Arc::clone(self.manager(self.active_kind()))
    }

    pub fn connection_state_for(&self, kind: TransportKind) -> ConnectionState {
        self.manager(kind).state()
    }

    /// Register a raw socket printer with the TCP manager
    pub async fn add_manual_device(&self, name: &str, host: &str, port: u16) -> Result<Device, PrinterError> {
        let device = Device::tcp(name, host, port);
        self.tcp.add_manual_device(device.clone()).await?;
        Ok(device)
    }

    /// Disconnect every manager
    pub async fn shutdown(&self) {
        for kind in TransportKind::ALL {
            let manager = self.manager(kind);
            manager.stop_scan();
            manager.disconnect().await;
        }
        info!("All printer links closed");
    }
}
