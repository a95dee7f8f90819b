use std::time::Duration;

use async_trait::async_trait;
use domain::{ConnectError, Device, DeviceList, PrinterError, PrinterTransport, TransportKind, WriteError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use super::stream_io::{ReadOutcome, read_chunk, write_all_within};

/// Largest chunk pulled off the socket per read
const READ_BUFFER: usize = 1024;

/// Raw socket printers (port 9100 style). No discovery protocol: the device
/// list is whatever has been registered by hand.
pub struct TcpTransport {
    manual: DeviceList,
    default_port: u16,
    connect_timeout: Duration,
    write_timeout: Duration,
    stream: Option<TcpStream>,
    address: Option<String>,
    /// Peer closed the connection or a write failed
    closed: bool,
}

impl TcpTransport {
    pub fn new(default_port: u16, connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            manual: DeviceList::new(),
            default_port,
            connect_timeout,
            write_timeout,
            stream: None,
            address: None,
            closed: false,
        }
    }

    /// Split `host[:port]`, falling back to the default port
    fn target(&self, address: &str) -> Result<(String, u16), ConnectError> {
        let invalid = || ConnectError::InvalidAddress(address.to_string());
        match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port.parse::<u16>().map_err(|_| invalid())?;
                Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
            }
            Some(_) => Err(invalid()),
            None if address.trim().is_empty() => Err(invalid()),
            None => Ok((address.trim().to_string(), self.default_port)),
        }
    }

    fn invalidate(&mut self) {
        self.closed = true;
    }
}

#[async_trait]
impl PrinterTransport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpSocket
    }

    async fn discover(&mut self) -> Result<Vec<Device>, PrinterError> {
        Ok(self.manual.iter().cloned().collect())
    }

    async fn connect(&mut self, device: &Device) -> Result<(), ConnectError> {
        self.disconnect().await;

        let (host, port) = self.target(&device.address)?;
        info!(host = %host, port, "Connecting to network printer");

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(host = %host, port, error = %e, "Network printer refused connection");
                return Err(ConnectError::TransportOpenFailed(e.to_string()));
            }
            Err(_) => {
                warn!(host = %host, port, "Network printer connection timed out");
                return Err(ConnectError::TransportOpenFailed("Connection timed out".to_string()));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "TCP_NODELAY not applied");
        }
        info!(host = %host, port, "Connected to network printer");
        self.stream = Some(stream);
        self.address = Some(device.address.clone());
        self.closed = false;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let Some(stream) = self.stream.as_mut().filter(|_| !self.closed) else {
            return Err(WriteError::NotConnected);
        };

        match write_all_within(stream, data, self.write_timeout).await {
            Ok(()) => {
                debug!(bytes = data.len(), "Data sent to network printer");
                Ok(())
            }
            Err(e) => {
                error!("Failed to write to printer: {}", e);
                self.invalidate();
                Err(e)
            }
        }
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
                info!("Network printer closed the connection");
                self.invalidate();
                Ok(None)
            }
            ReadOutcome::Failed(e) => {
                self.invalidate();
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
                debug!(error = %e, "Error closing network printer");
            }
        }
        self.closed = false;
        if let Some(address) = self.address.take() {
            info!(address = %address, "Network printer disconnected");
        }
    }

    fn add_manual_device(&mut self, device: Device) -> Result<(), PrinterError> {
        let (host, port) = self.target(&device.address).map_err(PrinterError::Connect)?;
        let device = Device::tcp(device.name, &host, port);
        info!(name = %device.name, address = %device.address, "Registered network printer");
        self.manual.upsert(device);
        Ok(())
    }

    fn remove_manual_device(&mut self, address: &str) -> bool {
        self.manual.remove(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> TcpTransport {
        TcpTransport::new(9100, Duration::from_secs(10), Duration::from_secs(10))
    }

    #[test]
    fn test_target_parsing() {
        let t = transport();
        assert_eq!(t.target("10.0.0.5:9101").unwrap(), ("10.0.0.5".to_string(), 9101));
        assert_eq!(t.target("printer.local").unwrap(), ("printer.local".to_string(), 9100));
        assert!(t.target("10.0.0.5:http").is_err());
        assert!(t.target(":9100").is_err());
        assert!(t.target("").is_err());
    }

    #[tokio::test]
    async fn test_manual_registry_dedups_by_address() {
        let mut t = transport();
        t.add_manual_device(Device::tcp("Dock A", "10.0.0.5", 9100)).unwrap();
        t.add_manual_device(Device::tcp("Dock A renamed", "10.0.0.5", 9100)).unwrap();
        t.add_manual_device(Device::new("Dock B", "10.0.0.6", TransportKind::TcpSocket)).unwrap();

        let devices = t.discover().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Dock A renamed");
        assert_eq!(devices[1].address, "10.0.0.6:9100");

        assert!(t.remove_manual_device("10.0.0.5:9100"));
        assert!(!t.remove_manual_device("10.0.0.5:9100"));
        assert_eq!(t.discover().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut t = transport();
        assert!(!t.is_live());
        assert_eq!(t.write(b"x").await, Err(WriteError::NotConnected));
        assert_eq!(t.read(Duration::from_millis(5)).await, Err(PrinterError::NotConnected));
        t.disconnect().await;
        t.disconnect().await;
    }
}
