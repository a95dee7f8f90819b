//! Domain layer - printer model, status protocol and command encoders
//!
//! This crate contains:
//! - Devices and the transport contract (`PrinterTransport`)
//! - The connection state machine
//! - Status replies and the probe command catalogue
//! - Encoders for ESC/POS, ZPL, TSPL, EPL and CPCL
//!
//! Nothing in here performs I/O.

pub mod command;
pub mod device;
pub mod error;
pub mod status;
pub mod transport;

// Re-export commonly used types
pub use command::LabelLanguage;
pub use device::{Device, DeviceList};
pub use error::{ConnectError, ParseError, PrinterError, WriteError};
pub use status::{PrinterStatus, ReceivedChunk};
pub use transport::{ConnectionState, PrinterTransport, TransportKind};
