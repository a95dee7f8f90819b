use std::time::Duration;

use async_trait::async_trait;

use crate::device::Device;
use crate::error::{ConnectError, PrinterError, WriteError};
use crate::transport::TransportKind;

/// A concrete printer link.
///
/// The connection handle (file, claimed USB interface, socket) lives inside the
/// implementation and exists only between a successful `connect` and the next
/// `disconnect`. Callers serialize access; implementations take `&mut self`
/// for every operation that touches the handle.
#[async_trait]
pub trait PrinterTransport: Send {
    fn kind(&self) -> TransportKind;

    /// Enumerate reachable printers for this link type
    async fn discover(&mut self) -> Result<Vec<Device>, PrinterError>;

    /// Open the link to `device`, replacing any handle already held
    async fn connect(&mut self, device: &Device) -> Result<(), ConnectError>;

    /// Send `data`; partial writes report the offset reached
    async fn write(&mut self, data: &[u8]) -> Result<(), WriteError>;

    /// Read whatever arrives within `timeout`.
    ///
    /// `Ok(None)` covers both "nothing arrived" and "no return channel".
    async fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, PrinterError>;

    /// Whether the open link has a return channel
    fn can_read(&self) -> bool;

    /// Whether the handle is present and still usable (socket not closed, etc.)
    fn is_live(&self) -> bool;

    /// Release the handle. Idempotent.
    async fn disconnect(&mut self);

    /// Register a printer that cannot be discovered
    fn add_manual_device(&mut self, _device: Device) -> Result<(), PrinterError> {
        Err(PrinterError::Unsupported("manual devices"))
    }

    /// Returns whether a device with `address` was registered
    fn remove_manual_device(&mut self, _address: &str) -> bool {
        false
    }
}
