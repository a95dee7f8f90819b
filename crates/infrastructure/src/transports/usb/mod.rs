//! USB printers over bulk endpoints.
//!
//! libusb calls block, so every bus and link operation runs on the blocking
//! pool. The claimed interface sits behind a std mutex shared with those
//! blocking tasks.

mod bus;
mod rusb_bus;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domain::{ConnectError, Device, PrinterError, PrinterTransport, TransportKind, WriteError};
use tracing::{debug, info, warn};

pub use bus::{
    BulkLink, Direction, EndpointInfo, InterfaceInfo, PRINTER_CLASS, TransferError, UsbBus,
    UsbDeviceInfo,
};
pub use rusb_bus::RusbBus;

use crate::config::TransportTimeouts;
use crate::permission::{PermissionBroker, ensure_permission};

type SharedLink = Arc<Mutex<Box<dyn BulkLink>>>;

struct OpenLink {
    link: SharedLink,
    address: String,
    out_endpoint: u8,
    out_packet: usize,
    in_endpoint: Option<(u8, usize)>,
}

pub struct UsbBulkTransport {
    bus: Arc<dyn UsbBus>,
    broker: Arc<dyn PermissionBroker>,
    timeouts: TransportTimeouts,
    open: Option<OpenLink>,
}

impl UsbBulkTransport {
    pub fn new(bus: Arc<dyn UsbBus>, broker: Arc<dyn PermissionBroker>, timeouts: TransportTimeouts) -> Self {
        Self {
            bus,
            broker,
            timeouts,
            open: None,
        }
    }

    async fn enumerate(&self) -> Result<Vec<UsbDeviceInfo>, String> {
        let bus = Arc::clone(&self.bus);
        tokio::task::spawn_blocking(move || bus.devices())
            .await
            .map_err(|e| e.to_string())?
    }

    /// Claim the first usable interface, printer class first
    async fn claim(&self, info: UsbDeviceInfo) -> Result<OpenLink, ConnectError> {
        let candidates: Vec<InterfaceInfo> = info.interface_candidates().into_iter().cloned().collect();
        if candidates.is_empty() {
            return Err(ConnectError::NoCompatibleEndpoint);
        }

        let info = Arc::new(info);
        for interface in candidates {
            let Some(out) = interface.bulk_out().copied() else {
                continue;
            };
            let bus = Arc::clone(&self.bus);
            let dev = Arc::clone(&info);
            let number = interface.number;
            let opened = tokio::task::spawn_blocking(move || bus.open(&dev, number))
                .await
                .map_err(|e| ConnectError::TransportOpenFailed(e.to_string()))?;

            match opened {
                Ok(link) => {
                    let in_endpoint = interface
                        .bulk_in()
                        .map(|ep| (ep.address, usize::from(ep.max_packet_size.max(1))));
                    info!(
                        node = %info.node(),
                        interface = number,
                        out_endpoint = out.address,
                        readable = in_endpoint.is_some(),
                        "USB printer interface claimed"
                    );
                    return Ok(OpenLink {
                        link: Arc::new(Mutex::new(link)),
                        address: info.node(),
                        out_endpoint: out.address,
                        out_packet: usize::from(out.max_packet_size.max(1)),
                        in_endpoint,
                    });
                }
                Err(ConnectError::NoCompatibleEndpoint) => {
                    debug!(interface = number, "Interface unavailable, trying next");
                }
                Err(other) => return Err(other),
            }
        }
        Err(ConnectError::NoCompatibleEndpoint)
    }
}

fn lock(link: &SharedLink) -> std::sync::MutexGuard<'_, Box<dyn BulkLink>> {
    link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared between an async writer and the blocking task doing the transfers
#[derive(Debug, Default)]
pub struct WriteProgress {
    sent: AtomicUsize,
    cancelled: AtomicBool,
}

impl WriteProgress {
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    /// No further transfer starts once this is set
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Send `data` in packets of at most `packet` bytes.
///
/// Stops at the first failed transfer or once `progress` is cancelled.
/// `progress` tracks the bytes accepted so far so a caller that gives up early
/// can still report the offset.
pub fn write_chunked(
    link: &mut dyn BulkLink,
    endpoint: u8,
    packet: usize,
    data: &[u8],
    chunk_timeout: Duration,
    pause: Duration,
    progress: &WriteProgress,
) -> Result<(), WriteError> {
    let mut offset = 0;
    for chunk in data.chunks(packet.max(1)) {
        let mut sent = 0;
        while sent < chunk.len() {
            if progress.is_cancelled() {
                debug!(offset = offset + sent, "USB write abandoned");
                return Err(WriteError::TimedOut {
                    offset: offset + sent,
                });
            }
            match link.write_bulk(endpoint, &chunk[sent..], chunk_timeout) {
                Ok(0) => {
                    return Err(WriteError::Failed {
                        offset: offset + sent,
                        reason: "USB transfer accepted no data".into(),
                    });
                }
                Ok(n) => {
                    sent += n;
                    progress.sent.store(offset + sent, Ordering::Relaxed);
                }
                Err(TransferError::Timeout) => {
                    return Err(WriteError::TimedOut {
                        offset: offset + sent,
                    });
                }
                Err(e) => {
                    return Err(WriteError::Failed {
                        offset: offset + sent,
                        reason: e.to_string(),
                    });
                }
            }
        }
        offset += sent;
        if offset < data.len() && !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
    Ok(())
}

#[async_trait]
impl PrinterTransport for UsbBulkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::UsbBulk
    }

    async fn discover(&mut self) -> Result<Vec<Device>, PrinterError> {
        let devices = self.enumerate().await.map_err(PrinterError::Discovery)?;
        let printers: Vec<Device> = devices
            .iter()
            .filter(|d| d.is_printer_candidate())
            .map(|d| Device::new(d.display_name(), d.node(), TransportKind::UsbBulk))
            .collect();
        debug!(total = devices.len(), printers = printers.len(), "USB scan finished");
        Ok(printers)
    }

    async fn connect(&mut self, device: &Device) -> Result<(), ConnectError> {
        self.disconnect().await;

        ensure_permission(self.broker.as_ref(), device, self.timeouts.permission).await?;

        let info = self
            .enumerate()
            .await
            .map_err(ConnectError::TransportOpenFailed)?
            .into_iter()
            .find(|d| d.node() == device.address)
            .ok_or_else(|| ConnectError::DeviceNotFound(device.address.clone()))?;

        self.open = Some(self.claim(info).await?);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let Some(open) = self.open.as_ref() else {
            return Err(WriteError::NotConnected);
        };

        let link = Arc::clone(&open.link);
        let (endpoint, packet) = (open.out_endpoint, open.out_packet);
        let (chunk_timeout, pause) = (self.timeouts.usb_chunk, self.timeouts.usb_inter_chunk);
        let progress = Arc::new(WriteProgress::default());
        let task_progress = Arc::clone(&progress);
        let payload = data.to_vec();

        let task = tokio::task::spawn_blocking(move || {
            let mut guard = lock(&link);
            write_chunked(&mut **guard, endpoint, packet, &payload, chunk_timeout, pause, &task_progress)
        });

        match tokio::time::timeout(self.timeouts.write, task).await {
            Ok(Ok(result)) => {
                if let Err(e) = &result {
                    warn!(error = %e, "USB write failed");
                } else {
                    debug!(bytes = data.len(), packet, "USB write complete");
                }
                result
            }
            Ok(Err(join)) => Err(WriteError::Failed {
                offset: progress.sent(),
                reason: join.to_string(),
            }),
            Err(_) => {
                progress.cancel();
                let offset = progress.sent();
                warn!(offset, total = data.len(), "USB write timed out");
                Err(WriteError::TimedOut { offset })
            }
        }
    }

    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PrinterError> {
        let Some(open) = self.open.as_ref() else {
            return Err(PrinterError::NotConnected);
        };
        let Some((endpoint, packet)) = open.in_endpoint else {
            return Ok(None);
        };

        let link = Arc::clone(&open.link);
        let result = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; packet];
            lock(&link)
                .read_bulk(endpoint, &mut buf, timeout)
                .map(|n| {
                    buf.truncate(n);
                    buf
                })
        })
        .await
        .map_err(|e| PrinterError::ReadFailed(e.to_string()))?;

        match result {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(TransferError::Timeout) => Ok(None),
            Err(e) => Err(PrinterError::ReadFailed(e.to_string())),
        }
    }

    fn can_read(&self) -> bool {
        self.open.as_ref().is_some_and(|o| o.in_endpoint.is_some())
    }

    fn is_live(&self) -> bool {
        self.open.is_some()
    }

    async fn disconnect(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        let link = open.link;
        if let Err(e) = tokio::task::spawn_blocking(move || lock(&link).release()).await {
            warn!(error = %e, "USB release task failed");
        }
        info!(node = %open.address, "USB printer disconnected");
    }
}
