//! ZPL formats for Zebra printers

const LINE_PITCH: u32 = 35;

/// One `^FO/^FD/^FS` field per input line, 30-dot font
pub fn label(text: &str) -> Vec<u8> {
    let mut zpl = String::from("^XA^LH0,0^CF0,30");
    for (row, line) in text.split('\n').enumerate() {
        zpl.push_str(&format!("^FO0,{}^FD{}^FS", row as u32 * LINE_PITCH, line));
    }
    zpl.push_str("^XZ");
    zpl.into_bytes()
}

pub fn test_label() -> Vec<u8> {
    b"^XA^LH0,0^CF0,40\
^FO0,0^FDPRINTER TEST^FS\
^FO0,50^FDLabel Print OK^FS\
^FO0,100^FD================^FS\
^XZ"
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_fields() {
        let zpl = String::from_utf8(label("A\nBB")).unwrap();
        assert_eq!(zpl, "^XA^LH0,0^CF0,30^FO0,0^FDA^FS^FO0,35^FDBB^FS^XZ");
    }

    #[test]
    fn test_test_label_is_bracketed() {
        let zpl = test_label();
        assert!(zpl.starts_with(b"^XA"));
        assert!(zpl.ends_with(b"^XZ"));
        assert!(!zpl.contains(&b'\n'));
    }
}
