//! ESC/POS receipt printers

use crate::command::raster::Raster;
use crate::device::Device;
use crate::transport::TransportKind;

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const LF: u8 = 0x0A;

/// `GS V 66 3`: feed to the cutter and partial cut
const PARTIAL_CUT: [u8; 4] = [GS, 0x56, 66, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Chainable ESC/POS command buffer
#[derive(Debug, Default)]
pub struct EscPosBuilder {
    buffer: Vec<u8>,
}

impl EscPosBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(mut self) -> Self {
        // ESC @
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    pub fn align(mut self, alignment: Alignment) -> Self {
        // ESC a n
        self.buffer.extend_from_slice(&[ESC, 0x61, alignment as u8]);
        self
    }

    pub fn bold(mut self, on: bool) -> Self {
        // ESC E n
        self.buffer.extend_from_slice(&[ESC, 0x45, u8::from(on)]);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.buffer.extend_from_slice(text.as_bytes());
        self
    }

    pub fn line(self, text: &str) -> Self {
        self.text(text).line_feed()
    }

    pub fn line_feed(mut self) -> Self {
        self.buffer.push(LF);
        self
    }

    pub fn line_feeds(self, n: usize) -> Self {
        (0..n).fold(self, |b, _| b.line_feed())
    }

    /// ESC d n: print and feed n lines
    pub fn feed(mut self, n: u8) -> Self {
        self.buffer.extend_from_slice(&[ESC, 0x64, n]);
        self
    }

    pub fn partial_cut(mut self) -> Self {
        self.buffer.extend_from_slice(&PARTIAL_CUT);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

/// Free text followed by three blank lines and a partial cut
pub fn label(text: &str) -> Vec<u8> {
    EscPosBuilder::new()
        .initialize()
        .text(text)
        .line_feeds(3)
        .partial_cut()
        .build()
}

pub fn test_label() -> Vec<u8> {
    EscPosBuilder::new()
        .initialize()
        .align(Alignment::Center)
        .bold(true)
        .line("PRINTER TEST")
        .bold(false)
        .line("Label Print OK")
        .line("================")
        .line_feeds(4)
        .partial_cut()
        .build()
}

/// Receipt-style diagnostics page naming the link and the connected device
pub fn receipt_test_page(kind: TransportKind, device: Option<&Device>) -> Vec<u8> {
    let name = device.map_or("Unknown", |d| d.name.as_str());
    let address = device.map_or("Unknown", |d| d.address.as_str());

    EscPosBuilder::new()
        .initialize()
        .align(Alignment::Center)
        .bold(true)
        .line("PRINTER TEST PAGE")
        .line("==================")
        .line_feed()
        .bold(false)
        .align(Alignment::Left)
        .line(&format!("Printer Type: {}", kind.display_name()))
        .line(&format!("Device: {}", name))
        .line(&format!("Address: {}", address))
        .line_feed()
        .line("--------------------------------")
        .line("Test Line 1: ABCDEFGHIJKLMNOPQRS")
        .line("Test Line 2: 0123456789!@#$%^&*()")
        .line("Test Line 3: abcdefghijklmnopqrs")
        .line("--------------------------------")
        .line_feed()
        .align(Alignment::Center)
        .line("*** TEST COMPLETE ***")
        .line_feeds(2)
        .partial_cut()
        .build()
}

/// 24-dot double density column image.
///
/// Rows are sent in 24-pixel strips with `ESC * 33 nL nH`; each column is
/// three bytes, most significant bit on top.
pub fn bitmap(raster: &Raster) -> Vec<u8> {
    let width = raster.width();
    let mut out = Vec::with_capacity(8 + (raster.height() / 24 + 1) * (width * 3 + 6));

    out.extend_from_slice(&[ESC, 0x40]);
    // ESC 3 0: zero line spacing so strips abut
    out.extend_from_slice(&[ESC, 0x33, 0]);

    for top in (0..raster.height()).step_by(24) {
        out.extend_from_slice(&[ESC, 0x2A, 33, (width & 0xFF) as u8, ((width >> 8) & 0xFF) as u8]);
        for x in 0..width {
            for band in 0..3 {
                let mut slice = 0u8;
                for bit in 0..8 {
                    if raster.is_dark(x, top + band * 8 + bit) {
                        slice |= 0x80 >> bit;
                    }
                }
                out.push(slice);
            }
        }
        out.push(LF);
    }

    // ESC 2: default line spacing, then feed three lines
    out.extend_from_slice(&[ESC, 0x32]);
    out.extend_from_slice(&[ESC, 0x64, 3]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_framing() {
        let bytes = label("Hello");
        assert_eq!(&bytes[..2], &[ESC, 0x40]);
        assert_eq!(&bytes[2..7], b"Hello");
        assert_eq!(&bytes[7..10], &[LF, LF, LF]);
        assert!(bytes.ends_with(&[GS, 0x56, 66, 3]));
    }

    #[test]
    fn test_label_keeps_utf8() {
        let bytes = label("Grüße");
        assert_eq!(&bytes[2..9], "Grüße".as_bytes());
    }

    #[test]
    fn test_test_label_toggles_bold() {
        let bytes = test_label();
        let expected_prefix = [ESC, 0x40, ESC, 0x61, 1, ESC, 0x45, 1];
        assert_eq!(&bytes[..8], &expected_prefix);
        assert!(bytes.windows(3).any(|w| w == [ESC, 0x45, 0]));
    }

    #[test]
    fn test_receipt_page_names_device() {
        let device = Device::tcp("Kitchen", "10.0.0.7", 9100);
        let bytes = receipt_test_page(TransportKind::TcpSocket, Some(&device));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Printer Type: Network Printer"));
        assert!(text.contains("Address: 10.0.0.7:9100"));
    }

    #[test]
    fn test_bitmap_strip_layout() {
        // 2 columns, 25 rows: top pixel of column 0 and row 24 of column 1 are black
        let raster = Raster::from_fn(2, 25, |x, y| {
            if (x == 0 && y == 0) || (x == 1 && y == 24) {
                0
            } else {
                255
            }
        });
        let bytes = bitmap(&raster);

        let header = [ESC, 0x40, ESC, 0x33, 0];
        assert_eq!(&bytes[..5], &header);

        let strip = 5 + 5 + 2 * 3 + 1;
        // first strip
        assert_eq!(&bytes[5..10], &[ESC, 0x2A, 33, 2, 0]);
        assert_eq!(&bytes[10..16], &[0x80, 0, 0, 0, 0, 0]);
        assert_eq!(bytes[16], LF);
        // second strip holds row 24 as the top bit of column 1
        assert_eq!(&bytes[strip + 5..strip + 11], &[0, 0, 0, 0x80, 0, 0]);
        assert!(bytes.ends_with(&[ESC, 0x32, ESC, 0x64, 3]));
    }

    #[test]
    fn test_bitmap_is_deterministic() {
        let raster = Raster::from_fn(30, 50, |x, y| ((x * 7 + y * 13) % 256) as u8);
        assert_eq!(bitmap(&raster), bitmap(&raster));
    }
}
