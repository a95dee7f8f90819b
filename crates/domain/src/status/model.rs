use serde::{Deserialize, Serialize};

const PAPER_OUT: u8 = 0x04;
const RIBBON_OUT: u8 = 0x08;
const PAUSED: u8 = 0x10;
const PRINTING: u8 = 0x20;
const COVER_OPEN: u8 = 0x40;
const ERROR: u8 = 0x80;

pub const NO_RESPONSE: &str = "No response";
pub const UNSUPPORTED: &str = "Status query not supported";

/// Normalized result of one status probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub ready: bool,
    pub paper_out: bool,
    pub ribbon_out: bool,
    pub paused: bool,
    pub printing: bool,
    pub cover_open: bool,
    pub has_error: bool,
    /// First byte of the reply, 0 when nothing usable came back
    pub raw_status: u8,
    pub message: String,
}

impl PrinterStatus {
    /// The printer never answered any status query. Many printers are
    /// write-only, so this counts as ready.
    pub fn unsupported() -> Self {
        Self {
            ready: true,
            ..Self::blank(UNSUPPORTED)
        }
    }

    /// A reply was expected but came back empty
    pub fn no_response() -> Self {
        Self::blank(NO_RESPONSE)
    }

    fn blank(message: &str) -> Self {
        Self {
            ready: false,
            paper_out: false,
            ribbon_out: false,
            paused: false,
            printing: false,
            cover_open: false,
            has_error: false,
            raw_status: 0,
            message: message.to_string(),
        }
    }

    /// Interpret a status reply.
    ///
    /// The first byte is read as a TSC-style bitfield and the whole reply as
    /// text; flags from both readings are combined. Garbage input degrades to
    /// whatever flags the bits happen to carry.
    pub fn parse(response: &[u8]) -> Self {
        let Some(&first) = response.first() else {
            return Self::no_response();
        };

        let text = String::from_utf8_lossy(response)
            .trim_matches(|c: char| c.is_whitespace() || c.is_control())
            .to_lowercase();
        let text_paper_out = text.contains("paper")
            && (text.contains("out") || text.contains("empty") || text.contains("end"));

        let paper_out = first & PAPER_OUT != 0 || text_paper_out;
        let cover_open = first & COVER_OPEN != 0;
        let has_error = first & ERROR != 0;

        let message = if text.is_empty() {
            format!("status byte 0x{:02X}", first)
        } else {
            text
        };

        Self {
            ready: !(paper_out || has_error || cover_open),
            paper_out,
            ribbon_out: first & RIBBON_OUT != 0,
            paused: first & PAUSED != 0,
            printing: first & PRINTING != 0,
            cover_open,
            has_error,
            raw_status: first,
            message,
        }
    }

    /// Short human readable summary, "Ready" when nothing is wrong
    pub fn status_text(&self) -> String {
        let issues: Vec<&str> = [
            (self.paper_out, "Paper Out"),
            (self.ribbon_out, "Ribbon Out"),
            (self.paused, "Paused"),
            (self.cover_open, "Cover Open"),
            (self.has_error, "Error"),
            (self.printing, "Printing"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect();

        if issues.is_empty() {
            "Ready".to_string()
        } else {
            issues.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_byte_is_ready() {
        let status = PrinterStatus::parse(&[0x00]);
        assert!(status.ready);
        assert!(!status.paper_out);
        assert!(!status.ribbon_out);
        assert!(!status.paused);
        assert!(!status.printing);
        assert!(!status.cover_open);
        assert!(!status.has_error);
        assert_eq!(status.raw_status, 0);
    }

    #[test]
    fn test_error_and_paper_out_bits() {
        let status = PrinterStatus::parse(&[0x84]);
        assert!(status.has_error);
        assert!(status.paper_out);
        assert!(!status.ready);
        assert_eq!(status.raw_status, 0x84);
        assert_eq!(status.status_text(), "Paper Out, Error");
    }

    #[test]
    fn test_empty_response() {
        let status = PrinterStatus::parse(&[]);
        assert_eq!(status.message, "No response");
        assert!(!status.ready);
    }

    #[test]
    fn test_textual_paper_out_is_combined_with_bits() {
        // 'P' = 0x50: paused + cover bits, plus the textual paper-out
        let status = PrinterStatus::parse(b"PAPER EMPTY\r\n");
        assert!(status.paper_out);
        assert!(status.paused);
        assert!(status.cover_open);
        assert!(!status.ready);
        assert_eq!(status.message, "paper empty");
    }

    #[test]
    fn test_cover_open_is_not_ready() {
        let status = PrinterStatus::parse(&[0x40]);
        assert!(status.cover_open);
        assert!(!status.ready);
    }

    #[test]
    fn test_ribbon_and_printing_do_not_block_ready() {
        let status = PrinterStatus::parse(&[0x28]);
        assert!(status.ribbon_out);
        assert!(status.printing);
        assert!(status.ready);
    }

    #[test]
    fn test_garbage_degrades_gracefully() {
        let status = PrinterStatus::parse(&[0xFF, 0xFE, 0x00, 0x9F]);
        assert!(status.has_error);
        assert!(!status.ready);
    }

    #[test]
    fn test_unsupported_default_is_ready() {
        let status = PrinterStatus::unsupported();
        assert!(status.ready);
        assert_eq!(status.message, UNSUPPORTED);
        assert_eq!(status.status_text(), "Ready");
    }
}
