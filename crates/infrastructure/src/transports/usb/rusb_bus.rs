use std::time::Duration;

use domain::ConnectError;
use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, warn};

use super::bus::{BulkLink, Direction, EndpointInfo, InterfaceInfo, TransferError, UsbBus, UsbDeviceInfo};

/// libusb through `rusb`, using the global context
#[derive(Debug, Default, Clone, Copy)]
pub struct RusbBus;

fn error_code(e: &rusb::Error) -> i32 {
    match e {
        rusb::Error::Io => -1,
        rusb::Error::InvalidParam => -2,
        rusb::Error::Access => -3,
        rusb::Error::NoDevice => -4,
        rusb::Error::NotFound => -5,
        rusb::Error::Busy => -6,
        rusb::Error::Timeout => -7,
        rusb::Error::Overflow => -8,
        rusb::Error::Pipe => -9,
        rusb::Error::Interrupted => -10,
        rusb::Error::NoMem => -11,
        rusb::Error::NotSupported => -12,
        _ => -99,
    }
}

fn transfer_error(e: rusb::Error) -> TransferError {
    match e {
        rusb::Error::Timeout => TransferError::Timeout,
        other => TransferError::Failed(error_code(&other), other.to_string()),
    }
}

fn open_error(node: &str, e: rusb::Error) -> ConnectError {
    match e {
        rusb::Error::Access => ConnectError::PermissionDenied,
        rusb::Error::NoDevice | rusb::Error::NotFound => ConnectError::DeviceNotFound(node.to_string()),
        other => ConnectError::TransportOpenFailed(format!("{}: {}", node, other)),
    }
}

fn interface_info(desc: &rusb::InterfaceDescriptor<'_>) -> InterfaceInfo {
    InterfaceInfo {
        number: desc.interface_number(),
        class: desc.class_code(),
        endpoints: desc
            .endpoint_descriptors()
            .map(|ep| EndpointInfo {
                address: ep.address(),
                direction: match ep.direction() {
                    rusb::Direction::In => Direction::In,
                    rusb::Direction::Out => Direction::Out,
                },
                bulk: ep.transfer_type() == rusb::TransferType::Bulk,
                max_packet_size: ep.max_packet_size(),
            })
            .collect(),
    }
}

impl UsbBus for RusbBus {
    fn devices(&self) -> Result<Vec<UsbDeviceInfo>, String> {
        let list = rusb::devices().map_err(|e| e.to_string())?;
        let mut found = Vec::new();

        for device in list.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(e) => {
                    debug!(bus = device.bus_number(), address = device.address(), error = %e, "Skipping USB device without descriptor");
                    continue;
                }
            };
            let config = match device
                .active_config_descriptor()
                .or_else(|_| device.config_descriptor(0))
            {
                Ok(config) => config,
                Err(e) => {
                    debug!(bus = device.bus_number(), address = device.address(), error = %e, "Skipping unconfigured USB device");
                    continue;
                }
            };

            let interfaces = config
                .interfaces()
                .filter_map(|iface| iface.descriptors().next().map(|d| interface_info(&d)))
                .collect();

            // reading strings needs an open handle; without access we fall back to ids
            let product = device
                .open()
                .ok()
                .and_then(|handle| handle.read_product_string_ascii(&desc).ok());

            found.push(UsbDeviceInfo {
                bus: device.bus_number(),
                address: device.address(),
                vendor_id: desc.vendor_id(),
                product_id: desc.product_id(),
                device_class: desc.class_code(),
                product,
                interfaces,
            });
        }
        Ok(found)
    }

    fn open(&self, info: &UsbDeviceInfo, interface: u8) -> Result<Box<dyn BulkLink>, ConnectError> {
        let node = info.node();
        let list = rusb::devices().map_err(|e| ConnectError::TransportOpenFailed(e.to_string()))?;
        let device = list
            .iter()
            .find(|d| d.bus_number() == info.bus && d.address() == info.address)
            .ok_or_else(|| ConnectError::DeviceNotFound(node.clone()))?;

        let handle = device.open().map_err(|e| open_error(&node, e))?;
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            // not available on every platform
            debug!(node = %node, error = %e, "Kernel driver auto-detach unavailable");
        }
        if let Err(e) = handle.claim_interface(interface) {
            warn!(node = %node, interface, error = %e, "Failed to claim USB interface");
            return Err(match e {
                rusb::Error::Access => ConnectError::PermissionDenied,
                rusb::Error::NoDevice => ConnectError::DeviceNotFound(node),
                _ => ConnectError::NoCompatibleEndpoint,
            });
        }

        debug!(node = %node, interface, "USB interface claimed");
        Ok(Box::new(RusbLink {
            handle,
            interface,
            claimed: true,
        }))
    }
}

struct RusbLink {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
    claimed: bool,
}

impl BulkLink for RusbLink {
    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, TransferError> {
        self.handle
            .write_bulk(endpoint, data, timeout)
            .map_err(transfer_error)
    }

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError> {
        self.handle
            .read_bulk(endpoint, buf, timeout)
            .map_err(transfer_error)
    }

    fn release(&mut self) {
        if !self.claimed {
            return;
        }
        self.claimed = false;
        if let Err(e) = self.handle.release_interface(self.interface) {
            debug!(interface = self.interface, error = %e, "Releasing USB interface failed");
        }
    }
}

impl Drop for RusbLink {
    fn drop(&mut self) {
        self.release();
    }
}
