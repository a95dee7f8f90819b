//! Encodings for printers whose command language is unknown

const ESC_INIT: [u8; 2] = [0x1B, 0x40];
const FORM_FEED: u8 = 0x0C;

/// Text between an ESC/POS initialize and a form feed
pub fn label(text: &str) -> Vec<u8> {
    let mut out = ESC_INIT.to_vec();
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\r\n\r\n");
    out.push(FORM_FEED);
    out.extend_from_slice(&ESC_INIT);
    out
}

pub fn test_label() -> Vec<u8> {
    let mut out = ESC_INIT.to_vec();
    out.extend_from_slice(b"PRINTER TEST\r\nLabel Print OK\r\n==============\r\n\r\n");
    out.push(FORM_FEED);
    out.extend_from_slice(&ESC_INIT);
    out
}

/// Plain text with trailing blank lines and no control codes at all
pub fn raw_label(text: &str) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.extend_from_slice(b"\r\n\r\n\r\n");
    out
}

pub fn raw_test_label() -> Vec<u8> {
    b"PRINTER TEST\r\nLabel Print OK\r\n================\r\n123456789\r\n\r\n\r\n\r\n".to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universal_wraps_text() {
        assert_eq!(
            label("Hi"),
            vec![0x1B, 0x40, b'H', b'i', b'\r', b'\n', b'\r', b'\n', 0x0C, 0x1B, 0x40]
        );
    }

    #[test]
    fn test_raw_label() {
        assert_eq!(raw_label("x"), b"x\r\n\r\n\r\n".to_vec());
    }
}
