mod service;

pub use service::{PrintError, PrintRefusal, PrintService, check_status};
