use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::transport::{ConnectionState, TransportKind};

/// A discovered or manually registered printer endpoint.
///
/// `address` is transport specific: a device path, a USB node
/// (`/dev/bus/usb/001/004`), a Bluetooth MAC or `host:port`.
/// Two devices are the same printer when their addresses match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub address: String,
    pub transport: TransportKind,
    #[serde(default)]
    pub connection_state: ConnectionState,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>, transport: TransportKind) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            transport,
            connection_state: ConnectionState::Disconnected,
        }
    }

    /// Network printer reachable at `host:port`
    pub fn tcp(name: impl Into<String>, host: &str, port: u16) -> Self {
        Self::new(name, format!("{}:{}", host, port), TransportKind::TcpSocket)
    }

    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.connection_state = state;
        self
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
