mod connection_state;
mod kind;
mod printer_transport;

pub use connection_state::ConnectionState;
pub use kind::TransportKind;
pub use printer_transport::PrinterTransport;
