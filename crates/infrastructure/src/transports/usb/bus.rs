//! Descriptor snapshots and the seam between the USB transport and libusb

use std::fmt;
use std::time::Duration;

use domain::ConnectError;

/// USB Printer device/interface class
pub const PRINTER_CLASS: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub direction: Direction,
    pub bulk: bool,
    pub max_packet_size: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub class: u8,
    pub endpoints: Vec<EndpointInfo>,
}

impl InterfaceInfo {
    pub fn bulk_out(&self) -> Option<&EndpointInfo> {
        self.endpoints
            .iter()
            .find(|e| e.bulk && e.direction == Direction::Out)
    }

    pub fn bulk_in(&self) -> Option<&EndpointInfo> {
        self.endpoints
            .iter()
            .find(|e| e.bulk && e.direction == Direction::In)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    pub bus: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_class: u8,
    pub product: Option<String>,
    pub interfaces: Vec<InterfaceInfo>,
}

impl UsbDeviceInfo {
    /// Stable node path used as the device address
    pub fn node(&self) -> String {
        format!("/dev/bus/usb/{:03}/{:03}", self.bus, self.address)
    }

    pub fn display_name(&self) -> String {
        match &self.product {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!(
                "USB Printer ({:04x}:{:04x})",
                self.vendor_id, self.product_id
            ),
        }
    }

    /// Printer class devices, plus anything with a bulk OUT endpoint since
    /// many label printers misreport their class
    pub fn is_printer_candidate(&self) -> bool {
        self.device_class == PRINTER_CLASS
            || self.interfaces.iter().any(|i| i.class == PRINTER_CLASS)
            || self.interfaces.iter().any(|i| i.bulk_out().is_some())
    }

    /// Interfaces with a bulk OUT endpoint, printer class ones first
    pub fn interface_candidates(&self) -> Vec<&InterfaceInfo> {
        let (printer, other): (Vec<&InterfaceInfo>, Vec<&InterfaceInfo>) = self
            .interfaces
            .iter()
            .filter(|i| i.bulk_out().is_some())
            .partition(|i| i.class == PRINTER_CLASS);
        printer.into_iter().chain(other).collect()
    }

    pub fn select_interface(&self) -> Option<&InterfaceInfo> {
        self.interface_candidates().into_iter().next()
    }
}

/// Failure of a single bulk transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    Timeout,
    /// Transfer rejected; carries the libusb error code
    Failed(i32, String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("USB transfer timed out"),
            Self::Failed(code, msg) => write!(f, "USB transfer failed (code: {}): {}", code, msg),
        }
    }
}

/// Claimed interface on an open device. Calls block.
pub trait BulkLink: Send {
    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, TransferError>;

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError>;

    /// Give the interface back to the kernel. Must tolerate repeated calls.
    fn release(&mut self);
}

/// Enumeration and opening of USB devices. Calls block.
pub trait UsbBus: Send + Sync {
    fn devices(&self) -> Result<Vec<UsbDeviceInfo>, String>;

    fn open(&self, device: &UsbDeviceInfo, interface: u8) -> Result<Box<dyn BulkLink>, ConnectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(address: u8, direction: Direction, bulk: bool) -> EndpointInfo {
        EndpointInfo {
            address,
            direction,
            bulk,
            max_packet_size: 64,
        }
    }

    fn device(interfaces: Vec<InterfaceInfo>) -> UsbDeviceInfo {
        UsbDeviceInfo {
            bus: 1,
            address: 7,
            vendor_id: 0x0fe6,
            product_id: 0x811e,
            device_class: 0,
            product: None,
            interfaces,
        }
    }

    #[test]
    fn test_node_and_fallback_name() {
        let dev = device(vec![]);
        assert_eq!(dev.node(), "/dev/bus/usb/001/007");
        assert_eq!(dev.display_name(), "USB Printer (0fe6:811e)");
    }

    #[test]
    fn test_misreported_class_with_bulk_out_is_candidate() {
        let dev = device(vec![InterfaceInfo {
            number: 0,
            class: 0xFF,
            endpoints: vec![endpoint(0x01, Direction::Out, true)],
        }]);
        assert!(dev.is_printer_candidate());
    }

    #[test]
    fn test_hid_only_device_is_not_candidate() {
        let dev = device(vec![InterfaceInfo {
            number: 0,
            class: 0x03,
            endpoints: vec![endpoint(0x81, Direction::In, false)],
        }]);
        assert!(!dev.is_printer_candidate());
        assert!(dev.select_interface().is_none());
    }

    #[test]
    fn test_prefers_printer_class_interface() {
        let dev = device(vec![
            InterfaceInfo {
                number: 0,
                class: 0xFF,
                endpoints: vec![endpoint(0x02, Direction::Out, true)],
            },
            InterfaceInfo {
                number: 1,
                class: PRINTER_CLASS,
                endpoints: vec![
                    endpoint(0x03, Direction::Out, true),
                    endpoint(0x84, Direction::In, true),
                ],
            },
        ]);
        let chosen = dev.select_interface().unwrap();
        assert_eq!(chosen.number, 1);
        assert_eq!(chosen.bulk_in().map(|e| e.address), Some(0x84));
    }
}
