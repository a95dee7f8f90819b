use thiserror::Error;

/// Failures while establishing a link to a printer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Printer device not found: {0}")]
    DeviceNotFound(String),

    #[error("Could not find compatible endpoint")]
    NoCompatibleEndpoint,

    #[error("Failed to open transport: {0}")]
    TransportOpenFailed(String),

    #[error("A connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Failures while sending bytes over an open link
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("Printer not connected")]
    NotConnected,

    /// `offset` is the number of bytes the printer accepted before the failure
    #[error("Write failed at byte {offset}: {reason}")]
    Failed { offset: usize, reason: String },

    #[error("Write timed out at byte {offset}")]
    TimedOut { offset: usize },
}

impl WriteError {
    pub fn offset(&self) -> usize {
        match self {
            Self::NotConnected => 0,
            Self::Failed { offset, .. } | Self::TimedOut { offset } => *offset,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrinterError {
    #[error("Connection failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("Print failed: {0}")]
    Write(#[from] WriteError),

    #[error("Printer not connected")]
    NotConnected,

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Failed to scan: {0}")]
    Discovery(String),

    #[error("Operation not supported by this transport: {0}")]
    Unsupported(&'static str),
}

/// Rejected textual identifiers (transport kinds, label languages)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrinterError>;
