//! Application layer - device managers, status probing and print workflows

pub mod manager;
pub mod printer;
pub mod registry;
pub mod status;

pub use manager::{DeviceManager, ManagerSignals, ManagerSnapshot, ManagerTimings};
pub use printer::{PrintError, PrintRefusal, PrintService, check_status};
pub use registry::PrinterRegistry;
pub use status::{ProbeTimings, StatusProbe};
