//! TSPL scripts for TSC label printers. Every command line is CRLF terminated
//! and the script is sent as ASCII.

use crate::command::raster::Raster;

/// Dots between `TEXT` rows on fixed-size labels
const LABEL_LINE_PITCH: u32 = 30;
/// Dots between rows on continuous, text-sized labels
const LONG_TEXT_LINE_PITCH: u32 = 25;
/// Characters per row on a 102 mm roll with font "1"
pub const DEFAULT_MAX_CHARS: usize = 40;

/// Physical label size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelGeometry {
    pub width_mm: u32,
    pub height_mm: u32,
}

impl Default for LabelGeometry {
    fn default() -> Self {
        Self {
            width_mm: 60,
            height_mm: 40,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    lines: Vec<String>,
}

impl Script {
    fn push(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    fn text(&mut self, y: u32, font: &str, content: &str) -> &mut Self {
        self.push(format!(
            "TEXT 0,{},\"{}\",0,1,1,\"{}\"",
            y,
            font,
            quote_safe(content)
        ))
    }

    fn to_ascii(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in &self.lines {
            out.extend(line.chars().map(ascii_byte));
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

fn ascii_byte(c: char) -> u8 {
    if c.is_ascii() { c as u8 } else { b'?' }
}

/// Double quotes would terminate the `TEXT` string argument
fn quote_safe(text: &str) -> String {
    text.replace('"', "'")
}

/// Fixed-size label with one `TEXT` row per non-blank input line
pub fn label(text: &str, geometry: LabelGeometry) -> Vec<u8> {
    let mut script = Script::default();
    script
        .push(format!(
            "SIZE {} mm,{} mm",
            geometry.width_mm, geometry.height_mm
        ))
        .push("GAP 3 mm,0 mm")
        .push("DIRECTION 1")
        .push("REFERENCE 0,0")
        .push("CLS");

    let lines = text.split('\n').filter(|l| !l.trim().is_empty());
    for (row, line) in lines.enumerate() {
        script.text(row as u32 * LABEL_LINE_PITCH, "2", line);
    }

    script.push("PRINT 1,1").push("EOP");
    script.to_ascii()
}

pub fn test_label() -> Vec<u8> {
    let mut script = Script::default();
    script
        .push("SIZE 60 mm,40 mm")
        .push("GAP 3 mm,0 mm")
        .push("DIRECTION 1")
        .push("REFERENCE 0,0")
        .push("OFFSET 0 mm")
        .push("SET PEEL OFF")
        .push("SET CUTTER OFF")
        .push("SET TEAR ON")
        .push("CLS")
        .text(10, "3", "PRINTER TEST")
        .text(50, "2", "TSC Label OK")
        .text(80, "1", "==================")
        .text(110, "2", "Test Complete")
        .push("PRINT 1,1")
        .push("EOP");
    script.to_ascii()
}

/// Continuous label sized to the wrapped text
pub fn long_text(text: &str, max_chars: usize) -> Vec<u8> {
    wrapped_script(text, max_chars, 10, false)
}

/// Short wrapped test print that feeds the label out afterwards
pub fn simple_test(text: &str) -> Vec<u8> {
    wrapped_script(text, DEFAULT_MAX_CHARS, 20, true)
}

fn wrapped_script(text: &str, max_chars: usize, bottom_margin: u32, form_feed: bool) -> Vec<u8> {
    let lines = wrap_text(text, max_chars);
    let height = lines.len() as u32 * LONG_TEXT_LINE_PITCH + bottom_margin;

    let mut script = Script::default();
    script
        .push(format!("SIZE 102 mm,{} dot", height))
        .push("GAP 0 mm,0 mm")
        .push("DIRECTION 1")
        .push("REFERENCE 0,0")
        .push("CLS");

    // blank rows keep their vertical slot
    for (row, line) in lines.iter().enumerate() {
        let line = line.trim();
        if !line.is_empty() {
            script.text(row as u32 * LONG_TEXT_LINE_PITCH, "1", line);
        }
    }

    script.push("PRINT 1,1");
    if form_feed {
        script.push("FORMFEED");
    }
    script.push("EOP");
    script.to_ascii()
}

/// Split on newlines, then hard-wrap any paragraph longer than `max_chars`.
///
/// Counts characters, not bytes. A zero limit is treated as one.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut wrapped = Vec::new();

    for paragraph in text.split('\n') {
        let chars: Vec<char> = paragraph.chars().collect();
        if chars.len() <= max_chars {
            wrapped.push(paragraph.to_string());
            continue;
        }
        for chunk in chars.chunks(max_chars) {
            wrapped.push(chunk.iter().collect());
        }
    }
    wrapped
}

/// Pack `raster` one bit per pixel, MSB first, dark pixels set
pub fn pack_bitmap(raster: &Raster) -> (usize, Vec<u8>) {
    let width_bytes = raster.width().div_ceil(8);
    let mut data = vec![0u8; width_bytes * raster.height()];

    for y in 0..raster.height() {
        for x in 0..raster.width() {
            if raster.is_dark(x, y) {
                data[y * width_bytes + x / 8] |= 0x80 >> (x % 8);
            }
        }
    }
    (width_bytes, data)
}

/// Full-width graphic printed with the `BITMAP` command
pub fn bitmap(raster: &Raster) -> Vec<u8> {
    let (width_bytes, data) = pack_bitmap(raster);
    let height = raster.height();

    let mut out = format!(
        "SIZE 102 mm,{} dot\r\nGAP 0 mm,0 mm\r\nDIRECTION 1\r\nCLS\r\nBITMAP 0,0,{},{},0,",
        height, width_bytes, height
    )
    .into_bytes();
    out.extend_from_slice(&data);
    out.extend_from_slice(b"\r\nPRINT 1,1\r\nFORMFEED\r\nEOP\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(bytes: &[u8]) -> Vec<String> {
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.ends_with("\r\n"));
        text.trim_end_matches("\r\n")
            .split("\r\n")
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_two_line_label() {
        let script = lines(&label("A\nBB", LabelGeometry::default()));

        assert_eq!(script[0], "SIZE 60 mm,40 mm");
        let text_rows: Vec<_> = script.iter().filter(|l| l.starts_with("TEXT")).collect();
        assert_eq!(
            text_rows,
            vec![
                "TEXT 0,0,\"2\",0,1,1,\"A\"",
                "TEXT 0,30,\"2\",0,1,1,\"BB\""
            ]
        );
        assert_eq!(&script[script.len() - 2..], &["PRINT 1,1", "EOP"]);
    }

    #[test]
    fn test_label_skips_blank_lines_and_replaces_quotes() {
        let script = lines(&label("say \"hi\"\n   \nend", LabelGeometry::default()));
        let text_rows: Vec<_> = script.iter().filter(|l| l.starts_with("TEXT")).collect();
        assert_eq!(text_rows.len(), 2);
        assert_eq!(text_rows[0], "TEXT 0,0,\"2\",0,1,1,\"say 'hi'\"");
        assert_eq!(text_rows[1], "TEXT 0,30,\"2\",0,1,1,\"end\"");
    }

    #[test]
    fn test_label_geometry_and_ascii() {
        let bytes = label("Café", LabelGeometry { width_mm: 100, height_mm: 150 });
        let script = lines(&bytes);
        assert_eq!(script[0], "SIZE 100 mm,150 mm");
        assert!(script.contains(&"TEXT 0,0,\"2\",0,1,1,\"Caf?\"".to_string()));
        assert!(bytes.is_ascii());
    }

    #[test]
    fn test_test_label() {
        let script = lines(&test_label());
        assert_eq!(script.len(), 15);
        assert_eq!(script[9], "TEXT 0,10,\"3\",0,1,1,\"PRINTER TEST\"");
        assert_eq!(script[14], "EOP");
    }

    #[test]
    fn test_wrap_respects_limit_and_reconstructs() {
        let text = "short\nthis paragraph is definitely longer than ten\n\nünïcödé-wörds-here";
        for n in [1, 3, 10, 40] {
            let wrapped = wrap_text(text, n);
            assert!(wrapped.iter().all(|l| l.chars().count() <= n));

            let mut rows = wrapped.iter();
            for paragraph in text.split('\n') {
                let len = paragraph.chars().count();
                let count = if len <= n { 1 } else { len.div_ceil(n) };
                let rebuilt: String = rows.by_ref().take(count).map(String::as_str).collect();
                assert_eq!(rebuilt, paragraph);
            }
            assert!(rows.next().is_none());
        }
    }

    #[test]
    fn test_wrap_line_lengths() {
        let wrapped = wrap_text(&"x".repeat(95), 40);
        let lens: Vec<_> = wrapped.iter().map(String::len).collect();
        assert_eq!(lens, vec![40, 40, 15]);
        assert_eq!(wrap_text("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_long_text_height_and_rows() {
        let script = lines(&long_text(&"y".repeat(50), 40));
        assert_eq!(script[0], "SIZE 102 mm,60 dot");
        assert_eq!(script[5], "TEXT 0,0,\"1\",0,1,1,\"yyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy\"");
        assert_eq!(script[6], "TEXT 0,25,\"1\",0,1,1,\"yyyyyyyyyy\"");
        assert_eq!(&script[7..], &["PRINT 1,1", "EOP"]);
    }

    #[test]
    fn test_simple_test_feeds_and_keeps_blank_row_slot() {
        let script = lines(&simple_test("TOP\n\nBOTTOM"));
        assert_eq!(script[0], "SIZE 102 mm,95 dot");
        assert!(script.contains(&"TEXT 0,50,\"1\",0,1,1,\"BOTTOM\"".to_string()));
        assert_eq!(&script[script.len() - 3..], &["PRINT 1,1", "FORMFEED", "EOP"]);
    }

    #[test]
    fn test_bitmap_packing() {
        let raster = Raster::from_fn(10, 2, |x, y| if x == y || x == 9 { 0 } else { 255 });
        let (width_bytes, data) = pack_bitmap(&raster);
        assert_eq!(width_bytes, 2);
        assert_eq!(data, vec![0x80, 0x40, 0x40, 0x40]);

        let bytes = bitmap(&raster);
        let head = b"SIZE 102 mm,2 dot\r\nGAP 0 mm,0 mm\r\nDIRECTION 1\r\nCLS\r\nBITMAP 0,0,2,2,0,";
        assert!(bytes.starts_with(head));
        assert_eq!(&bytes[head.len()..head.len() + 4], &data[..]);
        assert!(bytes.ends_with(b"\r\nPRINT 1,1\r\nFORMFEED\r\nEOP\r\n"));
    }

    #[test]
    fn test_deterministic() {
        let text = "Lot 42\nExp 2026-01-01";
        assert_eq!(label(text, LabelGeometry::default()), label(text, LabelGeometry::default()));
        assert_eq!(long_text(text, 8), long_text(text, 8));
    }
}
