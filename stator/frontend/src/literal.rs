//! The Verilog literal micro-grammar: `<size>'[s][bodh]<digits>`.
use stator_utils::warn_once;

/// Parse a Verilog number literal. The size prefix and sign marker are
/// ignored; `x`/`z` digits collapse the whole literal to zero; a value that
/// does not fit 64 bits saturates to all ones.
pub fn parse_num_literal(s: &str) -> i64 {
    // we don't care about the size
    let body = s.rsplit('\'').next().unwrap_or(s);
    let body = body.strip_prefix('s').unwrap_or(body);
    let (base, digits) = match body.chars().next() {
        Some('b') => (2, &body[1..]),
        Some('h') => (16, &body[1..]),
        Some('o') => (8, &body[1..]),
        Some('d') => (10, &body[1..]),
        _ => (10, body),
    };
    if digits.contains(['x', 'z', 'X', 'Z']) {
        return 0;
    }
    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    match i64::from_str_radix(&digits, base) {
        Ok(v) => v,
        Err(e) => match e.kind() {
            std::num::IntErrorKind::PosOverflow
            | std::num::IntErrorKind::NegOverflow => u64::MAX as i64,
            _ => 0,
        },
    }
}

/// Pack a string literal into an integer, little-endian, eight bytes max.
pub fn parse_string_literal(s: &str) -> i64 {
    if s.len() > 8 {
        warn_once(&format!(
            "Unable to cast long string literal ({}) to integer",
            s
        ));
    }
    let mut result: i64 = 0;
    for (i, byte) in s.bytes().take(8).enumerate() {
        result |= (byte as i64) << (8 * i);
    }
    result
}
