use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of a printer link
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected, no active connection attempt
    #[default]
    Disconnected,
    /// Currently attempting to establish connection
    Connecting,
    /// Link open and owned by the manager
    Connected,
    /// Last attempt or operation failed; a new connect is required
    Error(String),
}

impl ConnectionState {
    /// Check if state allows connection attempt
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error(_))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error(reason) => Some(reason),
            _ => None,
        }
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected | Self::Error(_) => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected or Error state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Can only complete connection from Connecting state"),
        }
    }

    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    pub fn to_error(&self, reason: impl Into<String>) -> Self {
        Self::Error(reason.into())
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Connecting => f.write_str("Connecting"),
            Self::Connected => f.write_str("Connected"),
            Self::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}
