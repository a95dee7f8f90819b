pub mod bluetooth;
pub mod mock;
pub mod serial;
mod stream_io;
pub mod tcp;
pub mod usb;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{ConnectError, Device, PrinterError, PrinterTransport, TransportKind, WriteError};
use tracing::{info, warn};

pub use bluetooth::{BluetoothAdapter, BluetoothTransport, RfcommTtyAdapter};
pub use mock::{MockControl, MockTransport};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use usb::{RusbBus, UsbBulkTransport};

use crate::config::PrintlinkConfig;
use crate::permission::PermissionBroker;

/// One of the concrete printer links
pub enum AnyTransport {
    Serial(SerialTransport),
    Usb(UsbBulkTransport),
    Bluetooth(BluetoothTransport),
    Tcp(TcpTransport),
}

macro_rules! dispatch {
    ($self:expr, $t:ident => $body:expr) => {
        match $self {
            AnyTransport::Serial($t) => $body,
            AnyTransport::Usb($t) => $body,
            AnyTransport::Bluetooth($t) => $body,
            AnyTransport::Tcp($t) => $body,
        }
    };
}

#[async_trait]
impl PrinterTransport for AnyTransport {
    fn kind(&self) -> TransportKind {
        dispatch!(self, t => t.kind())
    }

    async fn discover(&mut self) -> Result<Vec<Device>, PrinterError> {
        dispatch!(self, t => t.discover().await)
    }

    async fn connect(&mut self, device: &Device) -> Result<(), ConnectError> {
        dispatch!(self, t => t.connect(device).await)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        dispatch!(self, t => t.write(data).await)
    }

    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PrinterError> {
        dispatch!(self, t => t.read(timeout).await)
    }

    fn can_read(&self) -> bool {
        dispatch!(self, t => t.can_read())
    }

    fn is_live(&self) -> bool {
        dispatch!(self, t => t.is_live())
    }

    async fn disconnect(&mut self) {
        dispatch!(self, t => t.disconnect().await)
    }

    fn add_manual_device(&mut self, device: Device) -> Result<(), PrinterError> {
        dispatch!(self, t => t.add_manual_device(device))
    }

    fn remove_manual_device(&mut self, address: &str) -> bool {
        dispatch!(self, t => t.remove_manual_device(address))
    }
}

/// Builds transports from configuration
pub struct TransportFactory;

impl TransportFactory {
    pub async fn create(
        kind: TransportKind,
        config: &PrintlinkConfig,
        broker: Arc<dyn PermissionBroker>,
    ) -> AnyTransport {
        let timeouts = config.timeouts();
        match kind {
            TransportKind::Serial => {
                AnyTransport::Serial(SerialTransport::new(config.serial.clone(), timeouts.write))
            }
            TransportKind::UsbBulk => {
                AnyTransport::Usb(UsbBulkTransport::new(Arc::new(RusbBus), broker, timeouts))
            }
            TransportKind::BluetoothRfcomm => {
                let adapter = Self::bluetooth_adapter(config).await;
                AnyTransport::Bluetooth(BluetoothTransport::new(
                    adapter,
                    broker,
                    config.bluetooth.permission_gated,
                    timeouts,
                ))
            }
            TransportKind::TcpSocket => {
                let mut tcp = TcpTransport::new(config.tcp.default_port, timeouts.connect, timeouts.write);
                for printer in &config.tcp.printers {
                    let device = Device::tcp(printer.name.clone(), &printer.host, printer.port);
                    if let Err(e) = tcp.add_manual_device(device) {
                        warn!(host = %printer.host, error = %e, "Skipping configured network printer");
                    }
                }
                AnyTransport::Tcp(tcp)
            }
        }
    }

    #[cfg(feature = "bluetooth")]
    async fn bluetooth_adapter(config: &PrintlinkConfig) -> Arc<dyn BluetoothAdapter> {
        match bluetooth::BluezAdapter::new().await {
            Ok(adapter) => Arc::new(adapter),
            Err(e) => {
                info!(error = %e, "BlueZ unavailable, using bound RFCOMM ttys");
                Arc::new(Self::tty_adapter(config))
            }
        }
    }

    #[cfg(not(feature = "bluetooth"))]
    async fn bluetooth_adapter(config: &PrintlinkConfig) -> Arc<dyn BluetoothAdapter> {
        info!("Bluetooth through bound RFCOMM ttys");
        Arc::new(Self::tty_adapter(config))
    }

    fn tty_adapter(config: &PrintlinkConfig) -> RfcommTtyAdapter {
        RfcommTtyAdapter::default().with_baud_rate(config.serial.baud_rate)
    }
}
