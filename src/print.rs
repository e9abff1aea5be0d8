//! Render values through the terminal, each element wrapped in its styling class.

use crate::term::Term;
use crate::value::{unit_name, Value, ValueHeap, ValueKind};

/// Integer `value` written in `obase` (2, 8, 10 or 16; anything else prints decimal).
pub fn format_integer(value: i128, obase: u32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    match obase {
        16 => format!("{}0x{:x}", sign, magnitude),
        8 => format!("{}0o{:o}", sign, magnitude),
        2 => format!("{}0b{:b}", sign, magnitude),
        _ => format!("{}{}", sign, magnitude),
    }
}

/// Literal suffix for the integer types that have one.
fn int_suffix(width: u32, signed: bool) -> Option<&'static str> {
    Some(match (signed, width) {
        (true, 32) => "",
        (true, 64) => "L",
        (true, 16) => "H",
        (true, 8) => "B",
        (true, 4) => "N",
        (false, 32) => "U",
        (false, 64) => "UL",
        (false, 16) => "UH",
        (false, 8) => "UB",
        (false, 4) => "UN",
        _ => return None,
    })
}

/// Source-like text of an integer: `10`, `0xffUB`, `(int<3>) -1`.
pub fn format_int_literal(value: i128, width: u32, signed: bool, obase: u32) -> String {
    let digits = format_integer(value, obase);
    match int_suffix(width, signed) {
        Some(suffix) => format!("{}{}", digits, suffix),
        None if signed => format!("(int<{}>) {}", width, digits),
        None => format!("(uint<{}>) {}", width, digits),
    }
}

fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

pub(crate) fn print_value(term: &mut Term, heap: &ValueHeap, v: Value, obase: u32) {
    match heap.kind(v) {
        Some(ValueKind::Int | ValueKind::Uint) => {
            if let Some(int) = heap.integral(v) {
                let text = format_int_literal(int.value, int.width, int.signed, obase);
                term.styled("integer", &text);
            }
        }
        Some(ValueKind::String) => {
            let text = format!("\"{}\"", escape(heap.string_bytes(v).unwrap_or_default()));
            term.styled("string", &text);
        }
        Some(ValueKind::Offset) => {
            term.class("offset");
            if let Some(magnitude) = heap.offset_magnitude(v) {
                print_value(term, heap, magnitude, obase);
            }
            let unit = heap.offset_unit(v).and_then(|u| heap.uint_value(u)).unwrap_or(1);
            term.puts("#");
            term.puts(&unit_name(unit));
            term.end_class("offset");
        }
        Some(ValueKind::Struct) => {
            term.class("struct");
            term.puts(heap.struct_name(v).unwrap_or("struct"));
            term.puts(" {");
            for (i, (name, field)) in heap.struct_fields(v).unwrap_or_default().iter().enumerate() {
                if i > 0 {
                    term.puts(",");
                }
                term.styled("struct-field-name", name);
                term.puts("=");
                print_value(term, heap, *field, obase);
            }
            term.puts("}");
            term.end_class("struct");
        }
        Some(ValueKind::Type) => {
            if let Some(ty) = heap.type_desc(v) {
                term.styled("type", &ty.to_string());
            }
        }
        None => term.puts("<no value>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermIf;

    #[test]
    fn integer_literals() {
        assert_eq!(format_int_literal(10, 32, true, 10), "10");
        assert_eq!(format_int_literal(255, 8, false, 16), "0xffUB");
        assert_eq!(format_int_literal(-1, 3, true, 10), "(int<3>) -1");
        assert_eq!(format_int_literal(5, 12, false, 2), "(uint<12>) 0b101");
        assert_eq!(format_int_literal(-16, 64, true, 8), "-0o20L");
    }

    #[test]
    fn struct_output_with_classes() {
        let (term, capture) = TermIf::capture();
        let mut term = term.validate().expect("complete");
        let mut heap = ValueHeap::new();
        let a = heap.make_int(1, 32).expect("int");
        let s = heap.make_string("x\n");
        let v = heap
            .make_struct(Some("Pair"), vec![("a".to_string(), a), ("s".to_string(), s)])
            .expect("struct");
        print_value(&mut term, &heap, v, 10);
        assert_eq!(capture.text(), "Pair {a=1,s=\"x\\n\"}");
        assert_eq!(
            capture.classes(),
            ["struct-field-name", "integer", "struct-field-name", "string", "struct"]
        );
    }

    #[test]
    fn offsets_print_unit_names() {
        let (term, capture) = TermIf::capture();
        let mut term = term.validate().expect("complete");
        let mut heap = ValueHeap::new();
        let m = heap.make_uint(2, 64).expect("uint");
        let u = heap.make_uint(8, 64).expect("uint");
        let off = heap.make_offset(m, u).expect("offset");
        print_value(&mut term, &heap, off, 10);
        assert_eq!(capture.text(), "2UL#B");
    }
}
