mod model;
pub mod queries;
mod received;

pub use model::{NO_RESPONSE, PrinterStatus, UNSUPPORTED};
pub use queries::{STATUS_QUERIES, StatusQuery};
pub use received::{ReceivedChunk, hex_preview};
