mod device_manager;
mod signals;

pub use device_manager::{DeviceManager, ManagerTimings};
pub use signals::{ManagerSignals, ManagerSnapshot};
