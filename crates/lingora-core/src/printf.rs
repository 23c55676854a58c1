//! Printf-style value formatting.
//!
//! A specifier string is `[+][ ][#][0][width][,][.precision]` followed by a
//! single type character (`b c d i e E f g o s u x X`). The grammar is
//! parsed positionally: each piece is optional and consumed at most once, in
//! exactly that order. Anything the grammar does not recognize is ignored.

use serde_json::Value;

use crate::numstr::{display_string, number_to_string, pad_left, parse_int_prefix};

pub const DEFAULT_DECIMAL_SEPARATOR: &str = ".";

/// Thousands separator complementing a decimal separator: `.` groups with
/// `,` and vice versa.
pub fn default_thousands_separator(decimal: &str) -> &'static str {
    if decimal == "," { "." } else { "," }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Specifier {
    force_sign: bool,
    space_sign: bool,
    alt_form: bool,
    zero_pad: bool,
    width: usize,
    group_thousands: bool,
    precision: Option<usize>,
}

fn parse_flags(flags: &str) -> Specifier {
    let chars: Vec<char> = flags.chars().collect();
    let mut spec = Specifier::default();
    let mut index = 0;

    if chars.get(index) == Some(&'+') {
        spec.force_sign = true;
        index += 1;
    }
    if chars.get(index) == Some(&' ') {
        spec.space_sign = true;
        index += 1;
    }
    if chars.get(index) == Some(&'#') {
        spec.alt_form = true;
        index += 1;
    }
    if chars.get(index) == Some(&'0') {
        spec.zero_pad = true;
        index += 1;
    }
    let digits_start = index;
    while chars.get(index).is_some_and(|ch| ch.is_ascii_digit()) {
        index += 1;
    }
    if index > digits_start {
        let width: String = chars[digits_start..index].iter().collect();
        spec.width = width.parse().unwrap_or(0);
    }
    if chars.get(index) == Some(&',') {
        spec.group_thousands = true;
        index += 1;
    }
    // Precision: one lead character (conventionally `.`), then digits.
    if index < chars.len() {
        let digits_start = index + 1;
        let mut end = digits_start;
        while chars.get(end).is_some_and(|ch| ch.is_ascii_digit()) {
            end += 1;
        }
        if end > digits_start {
            let precision: String = chars[digits_start..end].iter().collect();
            spec.precision = precision.parse().ok();
        }
    }

    spec
}

/// Formats `value` according to a compact printf specifier. An empty
/// specifier is the identity: the value is returned unchanged, not
/// stringified. `decimal`/`thousands` override the separator pair used by
/// the decimal-family types and grouping.
pub fn apply_specifiers(
    value: &Value,
    specifiers: &str,
    decimal: Option<&str>,
    thousands: Option<&str>,
) -> Value {
    if specifiers.is_empty() {
        return value.clone();
    }

    let Some(type_char) = specifiers.chars().next_back() else {
        return value.clone();
    };
    let flags_part = &specifiers[..specifiers.len() - type_char.len_utf8()];

    let is_numeric = matches!(
        type_char,
        'b' | 'c' | 'd' | 'i' | 'e' | 'E' | 'f' | 'g' | 'o' | 'u' | 'x' | 'X'
    );
    let is_decimal = matches!(type_char, 'e' | 'E' | 'f' | 'g');
    let is_upper = matches!(type_char, 'E' | 'X');

    let spec = if is_numeric { parse_flags(flags_part) } else { Specifier::default() };
    let decimal = decimal.unwrap_or(DEFAULT_DECIMAL_SEPARATOR);
    let thousands = match thousands {
        Some(sign) => String::from(sign),
        None => String::from(default_thousands_separator(decimal)),
    };

    let mut text = if is_numeric {
        let mut number = coerce_number(value);
        if type_char == 'u' {
            number = to_uint32(number);
        }
        render_numeric(number, type_char, &spec)
    } else {
        display_string(value)
    };

    // Integer-family precision is a minimum digit count, except that a
    // zero precision renders value zero as nothing at all.
    if matches!(type_char, 'd' | 'i' | 'u' | 'x' | 'X' | 'o') {
        if let Some(precision) = spec.precision {
            if precision == 0 && text == "0" {
                text.clear();
            } else {
                text = pad_left(&text, precision, '0');
            }
        }
    }

    if text.is_empty() {
        return Value::String(text);
    }

    if is_decimal {
        if spec.alt_form && !text.contains('.') {
            text.push('.');
        }
        if decimal != "." {
            text = text.replace('.', decimal);
        }
    }

    if is_upper {
        text = text.to_uppercase();
    }

    if is_numeric && spec.group_thousands {
        text = group_integer_digits(&text, decimal, &thousands);
    }

    if is_numeric {
        let sign = if text.starts_with('-') {
            "-"
        } else if spec.force_sign {
            "+"
        } else if spec.space_sign {
            " "
        } else {
            ""
        };
        if sign == "-" {
            text.remove(0);
        }

        let radix_prefix = if spec.alt_form {
            match type_char {
                'x' | 'X' => "0x",
                'o' => "0",
                _ => "",
            }
        } else {
            ""
        };

        // Zero padding sits between the sign/prefix and the digits;
        // space padding wraps the fully assembled string.
        if spec.width > 0 && spec.zero_pad {
            let target = spec.width.saturating_sub(sign.len() + radix_prefix.len());
            text = pad_left(&text, target, '0');
        }
        text = format!("{sign}{radix_prefix}{text}");
        if spec.width > 0 && !spec.zero_pad {
            text = pad_left(&text, spec.width, ' ');
        }
    }

    Value::String(text)
}

fn render_numeric(number: f64, type_char: char, spec: &Specifier) -> String {
    match type_char {
        'b' => radix_string(number, 2),
        'c' => char_from_code(number),
        'd' | 'i' | 'u' => number_to_string(number),
        'e' | 'E' => exponential(number, spec.precision),
        'f' => match spec.precision {
            Some(precision) => format!("{number:.precision$}"),
            None => number_to_string(number),
        },
        'g' => {
            let mut text = number_to_string(number);
            if let Some(precision) = spec.precision {
                if let Some(dot) = text.find('.') {
                    let keep = dot + usize::from(precision > 0) + precision;
                    if keep < text.len() {
                        text.truncate(keep);
                    }
                }
            }
            text
        }
        'o' => radix_string(number, 8),
        'x' | 'X' => radix_string(number, 16),
        _ => number_to_string(number),
    }
}

fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => parse_int_prefix(text).unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn to_uint32(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let mut wrapped = value.trunc() % 4294967296.0;
    if wrapped < 0.0 {
        wrapped += 4294967296.0;
    }
    wrapped
}

fn radix_string(value: f64, base: u32) -> String {
    if value.is_nan() {
        return String::from("NaN");
    }
    if value.is_infinite() {
        return String::from(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let negative = value < 0.0;
    let magnitude = value.abs().trunc() as u128;
    let digits = match base {
        2 => format!("{magnitude:b}"),
        8 => format!("{magnitude:o}"),
        16 => format!("{magnitude:x}"),
        _ => format!("{magnitude}"),
    };
    if negative { format!("-{digits}") } else { digits }
}

fn char_from_code(value: f64) -> String {
    let code = to_uint32(value) as u32 & 0xFFFF;
    char::from_u32(code).map(String::from).unwrap_or_default()
}

fn exponential(value: f64, precision: Option<usize>) -> String {
    if value.is_nan() {
        return String::from("NaN");
    }
    if value.is_infinite() {
        return String::from(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let raw = match precision {
        Some(precision) => format!("{value:.precision$e}"),
        None => format!("{value:e}"),
    };
    // The exponent keeps an explicit sign: `1.2e7` becomes `1.2e+7`.
    match raw.find('e') {
        Some(index) if !raw[index + 1..].starts_with('-') => {
            format!("{}e+{}", &raw[..index], &raw[index + 1..])
        }
        _ => raw,
    }
}

/// Inserts `thousands` into the integer portion of `text`, grouping so the
/// rightmost group has exactly three digits. Runs of three or fewer digits
/// are left alone.
fn group_integer_digits(text: &str, decimal: &str, thousands: &str) -> String {
    let dec_index = text.find(decimal).unwrap_or(text.len());
    let sign_index = usize::from(text.starts_with('-'));
    if dec_index.saturating_sub(sign_index) <= 3 {
        return String::from(text);
    }

    let major = &text[sign_index..dec_index];
    let mut grouped = String::new();
    let mut from = 0;
    let mut to = major.len() % 3;
    while from < major.len() {
        if from > 0 {
            grouped.push_str(thousands);
        }
        grouped.push_str(&major[from..to.min(major.len())]);
        from = to;
        to = from + 3;
    }

    format!(
        "{}{}{}",
        if sign_index == 1 { "-" } else { "" },
        grouped,
        &text[dec_index..]
    )
}
