use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use domain::{ConnectError, Device, PrinterError, PrinterTransport, TransportKind, WriteError};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use super::stream_io::write_all_within;
use crate::config::SerialConfig;

/// Address of the stand-in device reported when no printer node exists
pub const SIMULATED_ADDRESS: &str = "simulated";

type Sink = Box<dyn AsyncWrite + Send + Sync + Unpin>;

enum Handle {
    Port(Sink),
    /// Accepts and discards everything
    Simulated,
}

/// Built-in printers exposed as character devices or serial ports.
///
/// Write-only: these nodes have no return channel the printer answers on.
pub struct SerialTransport {
    config: SerialConfig,
    write_timeout: Duration,
    handle: Option<Handle>,
    address: Option<String>,
}

impl SerialTransport {
    pub fn new(config: SerialConfig, write_timeout: Duration) -> Self {
        Self {
            config,
            write_timeout,
            handle: None,
            address: None,
        }
    }

    fn device_name(path: &str) -> String {
        let file = Path::new(path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        format!("Inner Printer ({})", file)
    }

    /// Serial ports need line settings, anything else is written as a plain file
    fn is_tty(path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|f| f.to_string_lossy().starts_with("tty"))
    }

    async fn open(path: &str, baud_rate: u32) -> Result<Sink, ConnectError> {
        if Self::is_tty(path) {
            debug!(port = %path, baud_rate, "Opening serial port");
            let port = tokio_serial::new(path, baud_rate)
                .open_native_async()
                .map_err(|e| {
                    warn!(port = %path, error = %e, "Failed to open serial port");
                    ConnectError::TransportOpenFailed(format!("{}: {}", path, e))
                })?;
            Ok(Box::new(port))
        } else {
            debug!(path = %path, "Opening printer device file");
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .map_err(|e| {
                    warn!(path = %path, error = %e, "Failed to open printer device");
                    ConnectError::TransportOpenFailed(format!("{}: {}", path, e))
                })?;
            Ok(Box::new(file))
        }
    }
}

#[async_trait]
impl PrinterTransport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn discover(&mut self) -> Result<Vec<Device>, PrinterError> {
        let mut found = Vec::new();
        for path in &self.config.paths {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                debug!(path = %path, "Found printer device node");
                found.push(Device::new(Self::device_name(path), path, TransportKind::Serial));
            }
        }

        if found.is_empty() {
            debug!("No printer device nodes present, offering simulated printer");
            found.push(Device::new(
                "Inner Printer (Simulated)",
                SIMULATED_ADDRESS,
                TransportKind::Serial,
            ));
        }
        Ok(found)
    }

    async fn connect(&mut self, device: &Device) -> Result<(), ConnectError> {
        self.disconnect().await;

        let handle = if device.address == SIMULATED_ADDRESS {
            Handle::Simulated
        } else {
            if !tokio::fs::try_exists(&device.address).await.unwrap_or(false) {
                return Err(ConnectError::DeviceNotFound(device.address.clone()));
            }
            Handle::Port(Self::open(&device.address, self.config.baud_rate).await?)
        };

        info!(address = %device.address, "Serial printer connected");
        self.handle = Some(handle);
        self.address = Some(device.address.clone());
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let sink = match self.handle.as_mut() {
            None => return Err(WriteError::NotConnected),
            Some(Handle::Simulated) => {
                debug!(bytes = data.len(), "Simulated printer accepted data");
                return Ok(());
            }
            Some(Handle::Port(sink)) => sink,
        };

        match write_all_within(sink, data, self.write_timeout).await {
            Ok(()) => {
                debug!(bytes = data.len(), "Data written to serial printer");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to write to serial printer");
                Err(e)
            }
        }
    }

    async fn read(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, PrinterError> {
        Ok(None)
    }

    fn can_read(&self) -> bool {
        false
    }

    fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    async fn disconnect(&mut self) {
        if let Some(Handle::Port(mut sink)) = self.handle.take() {
            if let Err(e) = sink.shutdown().await {
                warn!(error = %e, "Error closing serial printer");
            }
        }
        if let Some(address) = self.address.take() {
            info!(address = %address, "Serial printer disconnected");
        }
    }
}
