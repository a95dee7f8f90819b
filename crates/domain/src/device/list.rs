use serde::Serialize;

use crate::device::Device;
use crate::transport::ConnectionState;

/// Devices keyed by address, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceList {
    devices: Vec<Device>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `device`, replacing an entry with the same address in place
    pub fn upsert(&mut self, device: Device) {
        match self.devices.iter_mut().find(|d| d.address == device.address) {
            Some(existing) => *existing = device,
            None => self.devices.push(device),
        }
    }

    pub fn remove(&mut self, address: &str) -> Option<Device> {
        let index = self.devices.iter().position(|d| d.address == address)?;
        Some(self.devices.remove(index))
    }

    pub fn get(&self, address: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.address == address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Snapshot where `address` carries `state` and every other device is disconnected
    pub fn with_status(&self, address: Option<&str>, state: &ConnectionState) -> Vec<Device> {
        self.devices
            .iter()
            .map(|d| {
                let status = if Some(d.address.as_str()) == address {
                    state.clone()
                } else {
                    ConnectionState::Disconnected
                };
                d.clone().with_state(status)
            })
            .collect()
    }

    pub fn into_vec(self) -> Vec<Device> {
        self.devices
    }
}

impl FromIterator<Device> for DeviceList {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        let mut list = DeviceList::new();
        for device in iter {
            list.upsert(device);
        }
        list
    }
}
