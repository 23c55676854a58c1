//! Number and value renderings shared by the printf engine and the template
//! processor. Localized content was authored against host-language string
//! conversions, so these reproduce that behavior: shortest round-trip float
//! text, integer values without a fractional part, `NaN`/`Infinity` spelled
//! out, and prefix-style numeric parsing that stops at the first invalid
//! character instead of failing.

use serde_json::Value;

/// Renders a float the way dynamic hosts stringify numbers: integers drop
/// the fractional part, everything else uses the shortest representation
/// that round-trips.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return String::from("NaN");
    }
    if value.is_infinite() {
        return String::from(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if value == value.trunc() && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}

/// Stringifies an arbitrary value for interpolation into output text.
/// `Null` renders empty (missing lookups must not leak a sentinel word into
/// localized strings); compound values render as compact JSON.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(value) => String::from(if *value { "true" } else { "false" }),
        Value::Number(number) => match number.as_f64() {
            Some(value) => number_to_string(value),
            None => number.to_string(),
        },
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Integer-prefix parse: optional sign, then decimal digits, ignoring
/// leading whitespace. Returns `None` when no digit is found.
pub(crate) fn parse_int_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let mut chars = text.chars().peekable();
    let mut negative = false;
    if let Some(&ch) = chars.peek() {
        if ch == '+' || ch == '-' {
            negative = ch == '-';
            chars.next();
        }
    }
    let mut digits = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    if digits.is_empty() {
        return None;
    }
    let magnitude: f64 = digits.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Float-prefix parse: the longest leading run that forms a valid decimal
/// number (sign, digits, fraction, exponent). Returns `None` when nothing
/// numeric leads the input.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_len = end - int_start;
    let mut frac_len = 0;
    if end < bytes.len() && bytes[end] == b'.' {
        let mark = end;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        frac_len = end - mark - 1;
        if int_len == 0 && frac_len == 0 {
            end = mark;
        }
    }
    if int_len == 0 && frac_len == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mark = end;
        end += 1;
        if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
            end += 1;
        }
        let exp_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == exp_start {
            end = mark;
        }
    }

    text[..end].parse().ok()
}

pub(crate) fn pad_left(value: &str, length: usize, pad: char) -> String {
    let current = value.chars().count();
    if current >= length {
        return String::from(value);
    }
    let mut output = String::with_capacity(length);
    for _ in current..length {
        output.push(pad);
    }
    output.push_str(value);
    output
}
