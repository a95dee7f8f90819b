//! EPL2 forms for Eltron and older Zebra printers

const HEADER: &str = "\nN\nR0,0\nq400\nQ300,24\n";
const LINE_PITCH: u32 = 30;

/// Buffer clear, origin, 400x300 dot label, one `A` command per line, `P1`
pub fn label(text: &str) -> Vec<u8> {
    let mut epl = String::from(HEADER);
    for (row, line) in text.split('\n').enumerate() {
        epl.push_str(&format!(
            "A0,{},0,2,1,1,N,\"{}\"\n",
            row as u32 * LINE_PITCH,
            line.replace('"', "'")
        ));
    }
    epl.push_str("P1\n");
    epl.into_bytes()
}

pub fn test_label() -> Vec<u8> {
    let mut epl = String::from(HEADER);
    epl.push_str("A0,0,0,3,1,1,N,\"PRINTER TEST\"\n");
    epl.push_str("A0,40,0,2,1,1,N,\"Label Print OK\"\n");
    epl.push_str("A0,70,0,2,1,1,N,\"================\"\n");
    epl.push_str("P1\n");
    epl.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_lines() {
        let epl = String::from_utf8(label("A\nBB")).unwrap();
        assert_eq!(
            epl,
            "\nN\nR0,0\nq400\nQ300,24\nA0,0,0,2,1,1,N,\"A\"\nA0,30,0,2,1,1,N,\"BB\"\nP1\n"
        );
    }

    #[test]
    fn test_test_label_fires_once() {
        let epl = String::from_utf8(test_label()).unwrap();
        assert!(epl.starts_with("\nN\n"));
        assert!(epl.ends_with("P1\n"));
        assert_eq!(epl.matches("\nA0,").count(), 3);
    }
}
