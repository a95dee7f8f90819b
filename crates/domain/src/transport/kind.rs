use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Physical link used to reach a printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Character device or serial port (`/dev/ttyS1`, `/dev/usb/lp0`)
    Serial,
    UsbBulk,
    BluetoothRfcomm,
    /// Raw byte stream to `host:port`
    TcpSocket,
}

impl TransportKind {
    pub const ALL: [TransportKind; 4] = [
        Self::Serial,
        Self::UsbBulk,
        Self::BluetoothRfcomm,
        Self::TcpSocket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::UsbBulk => "usb",
            Self::BluetoothRfcomm => "bluetooth",
            Self::TcpSocket => "tcp",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Serial => "Inner Printer",
            Self::UsbBulk => "USB Printer",
            Self::BluetoothRfcomm => "Bluetooth Printer",
            Self::TcpSocket => "Network Printer",
        }
    }

    /// Links that need an explicit grant before the device may be opened
    pub fn is_permission_gated(&self) -> bool {
        matches!(self, Self::UsbBulk)
    }

    /// Links with a return channel regardless of the attached device.
    /// USB is readable only when the claimed interface has a bulk IN endpoint.
    pub fn always_readable(&self) -> bool {
        matches!(self, Self::BluetoothRfcomm | Self::TcpSocket)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" | "inner" => Ok(Self::Serial),
            "usb" | "usb-bulk" => Ok(Self::UsbBulk),
            "bluetooth" | "bt" | "rfcomm" => Ok(Self::BluetoothRfcomm),
            "tcp" | "wifi" | "network" => Ok(Self::TcpSocket),
            other => Err(ParseError::new("transport", other)),
        }
    }
}
