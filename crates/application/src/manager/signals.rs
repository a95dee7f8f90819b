use std::sync::{Mutex, MutexGuard};

use domain::{ConnectionState, Device, DeviceList, PrinterStatus, ReceivedChunk, TransportKind};
use serde::Serialize;
use tokio::sync::watch;

/// Observable state of one manager. Every value is a `watch` channel, so a
/// subscriber always sees the latest value and never blocks the manager.
pub struct ManagerSignals {
    state: watch::Sender<ConnectionState>,
    device: watch::Sender<Option<Device>>,
    devices: watch::Sender<Vec<Device>>,
    scanning: watch::Sender<bool>,
    last_error: watch::Sender<Option<String>>,
    status: watch::Sender<Option<PrinterStatus>>,
    received: watch::Sender<Option<ReceivedChunk>>,
    discovered: Mutex<DeviceList>,
}

/// Point-in-time copy of every signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerSnapshot {
    pub kind: TransportKind,
    pub state: ConnectionState,
    pub device: Option<Device>,
    pub devices: Vec<Device>,
    pub scanning: bool,
    pub last_error: Option<String>,
    pub status: Option<PrinterStatus>,
    pub last_received: Option<ReceivedChunk>,
}

impl Default for ManagerSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerSignals {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(ConnectionState::Disconnected),
            device: watch::Sender::new(None),
            devices: watch::Sender::new(Vec::new()),
            scanning: watch::Sender::new(false),
            last_error: watch::Sender::new(None),
            status: watch::Sender::new(None),
            received: watch::Sender::new(None),
            discovered: Mutex::new(DeviceList::new()),
        }
    }

    fn discovered(&self) -> MutexGuard<'_, DeviceList> {
        self.discovered.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn device(&self) -> Option<Device> {
        self.device.borrow().clone()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices.borrow().clone()
    }

    pub fn is_scanning(&self) -> bool {
        *self.scanning.borrow()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn status(&self) -> Option<PrinterStatus> {
        self.status.borrow().clone()
    }

    pub fn last_received(&self) -> Option<ReceivedChunk> {
        self.received.borrow().clone()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        self.publish_devices();
    }

    pub(crate) fn set_device(&self, device: Option<Device>) {
        self.device.send_replace(device);
        self.publish_devices();
    }

    pub(crate) fn set_scanning(&self, scanning: bool) {
        self.scanning.send_replace(scanning);
    }

    pub(crate) fn set_error(&self, error: Option<String>) {
        self.last_error.send_replace(error);
    }

    pub(crate) fn set_status(&self, status: Option<PrinterStatus>) {
        self.status.send_replace(status);
    }

    pub(crate) fn set_received(&self, chunk: ReceivedChunk) {
        self.received.send_replace(Some(chunk));
    }

    /// Replace the discovered list wholesale
    pub(crate) fn replace_devices(&self, devices: Vec<Device>) {
        *self.discovered() = devices.into_iter().collect();
        self.publish_devices();
    }

    pub(crate) fn upsert_device(&self, device: Device) {
        self.discovered().upsert(device);
        self.publish_devices();
    }

    pub(crate) fn remove_device(&self, address: &str) {
        self.discovered().remove(address);
        self.publish_devices();
    }

    /// Republish the list with each entry stamped with the current state
    fn publish_devices(&self) {
        let state = self.state.borrow().clone();
        let current = self.device.borrow().as_ref().map(|d| d.address.clone());
        let snapshot = self.discovered().with_status(current.as_deref(), &state);
        self.devices.send_replace(snapshot);
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn watch_device(&self) -> watch::Receiver<Option<Device>> {
        self.device.subscribe()
    }

    pub fn watch_devices(&self) -> watch::Receiver<Vec<Device>> {
        self.devices.subscribe()
    }

    pub fn watch_scanning(&self) -> watch::Receiver<bool> {
        self.scanning.subscribe()
    }

    pub fn watch_last_error(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<Option<PrinterStatus>> {
        self.status.subscribe()
    }

    pub fn watch_received(&self) -> watch::Receiver<Option<ReceivedChunk>> {
        self.received.subscribe()
    }

    pub fn snapshot(&self, kind: TransportKind) -> ManagerSnapshot {
        ManagerSnapshot {
            kind,
            state: self.state(),
            device: self.device(),
            devices: self.devices(),
            scanning: self.is_scanning(),
            last_error: self.last_error(),
            status: self.status(),
            last_received: self.last_received(),
        }
    }
}
