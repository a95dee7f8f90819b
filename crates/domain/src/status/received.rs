use chrono::{DateTime, Utc};
use serde::Serialize;

/// Bytes the background reader picked up from the printer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedChunk {
    pub bytes: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl ReceivedChunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            received_at: Utc::now(),
        }
    }

    /// Lossy text view with surrounding whitespace and control bytes removed
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes)
            .trim_matches(|c: char| c.is_whitespace() || c.is_control())
            .to_string()
    }
}

/// Space separated hex for log lines, truncated after `limit` bytes
pub fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let mut out = bytes
        .iter()
        .take(limit)
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > limit {
        out.push_str(&format!(" .. ({} bytes)", bytes.len()));
    }
    out
}
