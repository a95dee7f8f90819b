//! Scriptable in-memory transport for manager and probe tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use domain::{ConnectError, Device, DeviceList, PrinterError, PrinterTransport, TransportKind, WriteError};
use tracing::debug;

#[derive(Default)]
struct MockState {
    devices: DeviceList,
    discover_error: Option<PrinterError>,
    replies: HashMap<Vec<u8>, Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    connect_error: Option<ConnectError>,
    connect_delay: Option<Duration>,
    write_error: Option<WriteError>,
    connected: Option<String>,
    live: bool,
    readable: bool,
    connects: usize,
    disconnects: usize,
}

/// Test-side handle for scripting a [`MockTransport`] after it has been
/// handed to a manager
#[derive(Clone)]
pub struct MockControl {
    state: Arc<Mutex<MockState>>,
}

impl MockControl {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        self.lock().devices = devices.into_iter().collect();
    }

    pub fn fail_discovery(&self, error: PrinterError) {
        self.lock().discover_error = Some(error);
    }

    /// Queue `reply` for reading each time exactly `command` is written
    pub fn reply_to(&self, command: &[u8], reply: &[u8]) {
        self.lock().replies.insert(command.to_vec(), reply.to_vec());
    }

    /// Bytes that arrive unprompted
    pub fn push_incoming(&self, bytes: &[u8]) {
        self.lock().pending.push_back(bytes.to_vec());
    }

    pub fn fail_next_connect(&self, error: ConnectError) {
        self.lock().connect_error = Some(error);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = Some(delay);
    }

    /// Every following write fails with `error` until cleared with `None`
    pub fn fail_writes(&self, error: Option<WriteError>) {
        self.lock().write_error = error;
    }

    pub fn set_readable(&self, readable: bool) {
        self.lock().readable = readable;
    }

    /// The link dies underneath while the handle is still held
    pub fn drop_link(&self) {
        self.lock().live = false;
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub fn pending_reads(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn connected_address(&self) -> Option<String> {
        self.lock().connected.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn disconnect_count(&self) -> usize {
        self.lock().disconnects
    }
}

pub struct MockTransport {
    kind: TransportKind,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Readable and without devices until scripted otherwise
    pub fn new(kind: TransportKind) -> (Self, MockControl) {
        let state = Arc::new(Mutex::new(MockState {
            readable: true,
            ..Default::default()
        }));
        let control = MockControl {
            state: Arc::clone(&state),
        };
        (Self { kind, state }, control)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PrinterTransport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn discover(&mut self) -> Result<Vec<Device>, PrinterError> {
        let state = self.lock();
        match &state.discover_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.devices.iter().cloned().collect()),
        }
    }

    async fn connect(&mut self, device: &Device) -> Result<(), ConnectError> {
        let delay = self.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.connects += 1;
        if let Some(e) = state.connect_error.take() {
            return Err(e);
        }
        state.connected = Some(device.address.clone());
        state.live = true;
        debug!(address = %device.address, "Mock transport connected");
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let mut state = self.lock();
        if state.connected.is_none() || !state.live {
            return Err(WriteError::NotConnected);
        }
        if let Some(e) = state.write_error.clone() {
            return Err(e);
        }
        state.writes.push(data.to_vec());
        if let Some(reply) = state.replies.get(data).cloned() {
            state.pending.push_back(reply);
        }
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PrinterError> {
        {
            let mut state = self.lock();
            if state.connected.is_none() || !state.live {
                return Err(PrinterError::NotConnected);
            }
            if !state.readable {
                return Ok(None);
            }
            if let Some(bytes) = state.pending.pop_front() {
                return Ok(Some(bytes));
            }
        }
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    fn can_read(&self) -> bool {
        let state = self.lock();
        state.connected.is_some() && state.readable
    }

    fn is_live(&self) -> bool {
        let state = self.lock();
        state.connected.is_some() && state.live
    }

    async fn disconnect(&mut self) {
        let mut state = self.lock();
        if state.connected.take().is_some() {
            state.disconnects += 1;
        }
        state.live = false;
        state.pending.clear();
    }

    fn add_manual_device(&mut self, device: Device) -> Result<(), PrinterError> {
        self.lock().devices.upsert(device);
        Ok(())
    }

    fn remove_manual_device(&mut self, address: &str) -> bool {
        self.lock().devices.remove(address).is_some()
    }
}
