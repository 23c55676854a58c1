//! Locale-aware number rendering and parsing, driven by the separator pair
//! of a registered language.

use lingora_core::{number_to_string, parse_float_prefix};

/// Renders `value` with the locale's decimal separator, optionally grouping
/// thousands.
pub(crate) fn display_number(value: f64, thousands: bool, decimal: &str, group: &str) -> String {
    format_raw_number_string(&number_to_string(value), thousands, decimal, group)
}

/// Like [`display_number`] but for an already stringified number using `.`
/// as its decimal separator.
pub(crate) fn format_raw_number_string(
    value: &str,
    thousands: bool,
    decimal: &str,
    group: &str,
) -> String {
    if value.is_empty() {
        return String::new();
    }

    let mut value = String::from(value);
    if decimal != "." {
        value = value.replace('.', decimal);
    }
    if !thousands {
        return value;
    }

    let dec_index = value.find(decimal).unwrap_or(value.len());
    let sign_len = usize::from(value.starts_with('-'));
    if dec_index - sign_len <= 3 {
        return value;
    }

    let major = &value[sign_len..dec_index];
    let mut grouped = String::new();
    let mut from = 0;
    let mut to = major.len() % 3;
    while from < major.len() {
        if from > 0 {
            grouped.push_str(group);
        }
        grouped.push_str(&major[from..to.min(major.len())]);
        from = to;
        to = from + 3;
    }

    format!(
        "{}{}{}",
        if sign_len == 1 { "-" } else { "" },
        grouped,
        &value[dec_index..]
    )
}

/// Parses user input written with the locale's separators. Occurrences of
/// the decimal separator become `.`; thousands separators are removed when
/// `thousands` is set, and otherwise terminate the number the same way any
/// trailing garbage would.
pub(crate) fn parse_number(
    value: &str,
    thousands: bool,
    decimal: &str,
    group: &str,
) -> Option<f64> {
    if value.is_empty() {
        return None;
    }

    let mut normalized = String::with_capacity(value.len());
    let mut rest = value;
    while !rest.is_empty() {
        if !decimal.is_empty() && rest.starts_with(decimal) {
            normalized.push('.');
            rest = &rest[decimal.len()..];
        } else if !group.is_empty() && rest.starts_with(group) {
            if !thousands {
                normalized.push(',');
            }
            rest = &rest[group.len()..];
        } else {
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                normalized.push(ch);
            }
            rest = chars.as_str();
        }
    }

    parse_float_prefix(&normalized)
}
