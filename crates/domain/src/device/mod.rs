mod entity;
mod list;

pub use entity::Device;
pub use list::DeviceList;
