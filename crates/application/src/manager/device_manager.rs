//! One manager per transport kind: owns the transport, drives the connection
//! state machine and runs the background read loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use domain::status::hex_preview;
use domain::status::queries::TSPL_INFO;
use domain::{
    ConnectError, ConnectionState, Device, PrinterError, PrinterStatus, PrinterTransport, ReceivedChunk,
    TransportKind,
};
use infrastructure::config::ManagerConfig;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::signals::{ManagerSignals, ManagerSnapshot};
use crate::status::StatusProbe;

type SharedTransport = Arc<Mutex<Box<dyn PrinterTransport>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerTimings {
    pub read_poll_interval: Duration,
    pub background_read_timeout: Duration,
    /// Quiet time required after a write before the next status probe
    pub settle_delay: Duration,
}

impl Default for ManagerTimings {
    fn default() -> Self {
        Self::from(&ManagerConfig::default())
    }
}

impl From<&ManagerConfig> for ManagerTimings {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            read_poll_interval: Duration::from_millis(config.read_poll_interval_ms),
            background_read_timeout: Duration::from_millis(config.background_read_timeout_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Floor for the read loop tick; a zero period would stall the timer
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Wait after sending `~!I` before reading the reply
const INFO_REPLY_DELAY: Duration = Duration::from_millis(300);

struct ReadLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Clears the in-flight flag however the connect future ends
struct ConnectingGuard<'a>(&'a AtomicBool);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DeviceManager {
    kind: TransportKind,
    transport: SharedTransport,
    signals: Arc<ManagerSignals>,
    timings: ManagerTimings,
    probe: StatusProbe,
    connecting: AtomicBool,
    reader: StdMutex<Option<ReadLoop>>,
    scan_cancel: StdMutex<Option<CancellationToken>>,
    last_write: StdMutex<Option<Instant>>,
}

impl DeviceManager {
    pub fn new(transport: Box<dyn PrinterTransport>, timings: ManagerTimings, probe: StatusProbe) -> Self {
        Self {
            kind: transport.kind(),
            transport: Arc::new(Mutex::new(transport)),
            signals: Arc::new(ManagerSignals::new()),
            timings,
            probe,
            connecting: AtomicBool::new(false),
            reader: StdMutex::new(None),
            scan_cancel: StdMutex::new(None),
            last_write: StdMutex::new(None),
        }
    }

    pub fn with_defaults(transport: Box<dyn PrinterTransport>) -> Self {
        Self::new(transport, ManagerTimings::default(), StatusProbe::default())
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn signals(&self) -> &ManagerSignals {
        &self.signals
    }

    pub fn state(&self) -> ConnectionState {
        self.signals.state()
    }

    pub fn connected_device(&self) -> Option<Device> {
        self.signals.device()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.signals.devices()
    }

    pub fn last_error(&self) -> Option<String> {
        self.signals.last_error()
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        self.signals.snapshot(self.kind)
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.signals.watch_state()
    }

    pub fn watch_device(&self) -> watch::Receiver<Option<Device>> {
        self.signals.watch_device()
    }

    pub fn watch_devices(&self) -> watch::Receiver<Vec<Device>> {
        self.signals.watch_devices()
    }

    pub fn watch_scanning(&self) -> watch::Receiver<bool> {
        self.signals.watch_scanning()
    }

    pub fn watch_last_error(&self) -> watch::Receiver<Option<String>> {
        self.signals.watch_last_error()
    }

    pub fn watch_status(&self) -> watch::Receiver<Option<PrinterStatus>> {
        self.signals.watch_status()
    }

    pub fn watch_received(&self) -> watch::Receiver<Option<ReceivedChunk>> {
        self.signals.watch_received()
    }

    pub fn clear_error(&self) {
        self.signals.set_error(None);
    }

    /// Connected by state and the transport still reports a live handle
    pub async fn is_connected(&self) -> bool {
        self.signals.state().is_connected() && self.transport.lock().await.is_live()
    }

    pub async fn can_read(&self) -> bool {
        self.transport.lock().await.can_read()
    }

    /// Enumerate devices and replace the published list. A scan stopped with
    /// [`stop_scan`](Self::stop_scan) returns the list as it was.
    pub async fn scan(&self) -> Result<Vec<Device>, PrinterError> {
        let cancel = CancellationToken::new();
        *lock(&self.scan_cancel) = Some(cancel.clone());
        self.signals.set_scanning(true);
        self.signals.set_error(None);
        info!(transport = %self.kind, "🔍 Scanning for printers");

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(transport = %self.kind, "Scan stopped");
                Ok(self.signals.devices())
            }
            discovered = async { self.transport.lock().await.discover().await } => {
                discovered.map(|devices| {
                    self.signals.replace_devices(devices);
                    self.signals.devices()
                })
            }
        };

        lock(&self.scan_cancel).take();
        self.signals.set_scanning(false);

        match result {
            Ok(devices) => {
                info!(transport = %self.kind, count = devices.len(), "Scan finished");
                Ok(devices)
            }
            Err(e) => {
                warn!(transport = %self.kind, error = %e, "Scan failed");
                self.signals.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn stop_scan(&self) {
        if let Some(cancel) = lock(&self.scan_cancel).take() {
            cancel.cancel();
        }
        self.signals.set_scanning(false);
    }

    pub async fn connect(&self, device: &Device) -> Result<(), ConnectError> {
        if self.connecting.swap(true, Ordering::SeqCst) {
            warn!(address = %device.address, "Connect rejected, another attempt is in flight");
            return Err(ConnectError::AlreadyConnecting);
        }
        let _guard = ConnectingGuard(&self.connecting);

        if self.signals.state().is_connected() {
            info!(address = %device.address, "Replacing current connection");
            self.disconnect().await;
        }

        let state = self.signals.state();
        let next = state.to_connecting().unwrap_or(ConnectionState::Connecting);
        self.signals.set_error(None);
        self.signals.set_state(next);
        info!(transport = %self.kind, address = %device.address, "🔌 Connecting to printer");

        let result = self.transport.lock().await.connect(device).await;

        match result {
            Ok(()) => {
                self.signals.set_device(Some(device.clone()));
                self.signals.set_state(ConnectionState::Connected);
                if self.can_read().await {
                    self.start_read_loop();
                }
                info!(address = %device.address, "✅ Printer connected");
                Ok(())
            }
            Err(ConnectError::PermissionDenied) => {
                warn!(address = %device.address, "Permission denied");
                self.signals.set_error(Some(ConnectError::PermissionDenied.to_string()));
                self.signals.set_state(ConnectionState::Disconnected);
                Err(ConnectError::PermissionDenied)
            }
            Err(e) => {
                error!(address = %device.address, "❌ Connection failed: {}", e);
                let reason = e.to_string();
                self.signals.set_error(Some(reason.clone()));
                self.signals.set_state(ConnectionState::Error(reason));
                Err(e)
            }
        }
    }

    /// Stop the read loop, then release the handle. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        self.stop_read_loop().await;
        self.transport.lock().await.disconnect().await;

        let device = self.signals.device();
        self.signals.set_device(None);
        self.signals.set_state(ConnectionState::Disconnected);
        if let Some(device) = device {
            info!(address = %device.address, "Printer disconnected");
        }
    }

    /// Send `data`, reporting success as a flag. Failures are published
    /// through `last_error`.
    pub async fn print(&self, data: &[u8]) -> bool {
        self.try_print(data).await.is_ok()
    }

    pub async fn try_print(&self, data: &[u8]) -> Result<(), PrinterError> {
        if !self.is_connected().await {
            error!("Print failed: not connected");
            self.signals.set_error(Some(PrinterError::NotConnected.to_string()));
            return Err(PrinterError::NotConnected);
        }

        debug!(bytes = data.len(), data = %hex_preview(data, 64), "Sending print data");
        let result = self.transport.lock().await.write(data).await;

        match result {
            Ok(()) => {
                *lock(&self.last_write) = Some(Instant::now());
                info!(bytes = data.len(), "✅ Print data sent");
                Ok(())
            }
            Err(e) => {
                let err = PrinterError::Write(e);
                error!("❌ {}", err);
                self.fail_connection(err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Run the status probe. `None` when not connected.
    pub async fn query_status(&self) -> Option<PrinterStatus> {
        if !self.is_connected().await {
            warn!("Cannot query status: not connected");
            return None;
        }

        self.wait_for_settle().await;
        let status = self.probe.run(&self.transport).await;
        info!(status = %status.status_text(), message = %status.message, "Printer status");
        self.signals.set_status(Some(status.clone()));
        Some(status)
    }

    /// One foreground read, competing with the background loop
    pub async fn read_data(&self, timeout: Duration) -> Result<Option<Vec<u8>>, PrinterError> {
        if !self.is_connected().await {
            return Err(PrinterError::NotConnected);
        }
        let data = self.transport.lock().await.read(timeout).await?;
        if let Some(bytes) = data.as_ref().filter(|b| !b.is_empty()) {
            debug!(bytes = bytes.len(), data = %hex_preview(bytes, 32), "Read from printer");
            self.signals.set_received(ReceivedChunk::new(bytes.clone()));
        }
        Ok(data)
    }

    /// Ask a TSPL printer to identify itself (`~!I`)
    pub async fn query_printer_info(&self) -> Option<String> {
        if !self.is_connected().await {
            return None;
        }

        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.write(TSPL_INFO.bytes).await {
            warn!(error = %e, "Printer info query not sent");
            return None;
        }
        tokio::time::sleep(INFO_REPLY_DELAY).await;

        match transport.read(self.timings.background_read_timeout).await {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                let info = ReceivedChunk::new(bytes).text();
                info!(info = %info, "Printer info");
                Some(info)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Printer info read failed");
                None
            }
        }
    }

    pub async fn add_manual_device(&self, device: Device) -> Result<(), PrinterError> {
        let mut transport = self.transport.lock().await;
        transport.add_manual_device(device.clone())?;
        info!(transport = %self.kind, name = %device.name, "Manual printer added");

        // the transport may normalise the address, so republish its view
        match transport.discover().await {
            Ok(devices) => self.signals.replace_devices(devices),
            Err(_) => self.signals.upsert_device(device),
        }
        Ok(())
    }

    pub async fn remove_manual_device(&self, address: &str) -> bool {
        let removed = self.transport.lock().await.remove_manual_device(address);
        if removed {
            self.signals.remove_device(address);
        }
        removed
    }

    async fn wait_for_settle(&self) {
        let last_write = *lock(&self.last_write);
        if let Some(at) = last_write {
            let ready_at = at + self.timings.settle_delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    /// Tear the handle down after a failed write
    async fn fail_connection(&self, reason: String) {
        self.stop_read_loop().await;
        self.transport.lock().await.disconnect().await;
        self.signals.set_error(Some(reason.clone()));
        self.signals.set_state(ConnectionState::Error(reason));
    }

    fn start_read_loop(&self) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let transport = Arc::clone(&self.transport);
        let signals = Arc::clone(&self.signals);
        let timings = self.timings;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(timings.read_poll_interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let mut guard = tokio::select! {
                    _ = token.cancelled() => break,
                    guard = transport.lock() => guard,
                };
                if !guard.is_live() {
                    debug!("Link no longer live, read loop exiting");
                    break;
                }

                match guard.read(timings.background_read_timeout).await {
                    Ok(Some(bytes)) if !bytes.is_empty() => {
                        debug!(bytes = bytes.len(), data = %hex_preview(&bytes, 32), "📥 Received from printer");
                        signals.set_received(ReceivedChunk::new(bytes));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Read loop stopped");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = lock(&self.reader).replace(ReadLoop { cancel, handle }) {
            previous.cancel.cancel();
        }
        debug!(transport = %self.kind, "Read loop started");
    }

    async fn stop_read_loop(&self) {
        let reader = lock(&self.reader).take();
        if let Some(ReadLoop { cancel, handle }) = reader {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Read loop ended abnormally");
            }
            debug!(transport = %self.kind, "Read loop stopped");
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
