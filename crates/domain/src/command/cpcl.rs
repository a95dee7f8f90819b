//! CPCL for mobile printers. Only a fixed test form is provided; free text on
//! CPCL devices goes through the raw encoder.

pub fn test_label() -> Vec<u8> {
    [
        "! 0 200 200 300 1",
        "CENTER",
        "TEXT 4 0 0 20 PRINTER TEST",
        "TEXT 4 0 0 60 Label Print OK",
        "TEXT 4 0 0 90 ================",
        "BARCODE 128 1 1 80 0 130 123456789",
        "FORM",
        "PRINT",
    ]
    .iter()
    .flat_map(|line| line.bytes().chain(*b"\r\n"))
    .collect()
}
