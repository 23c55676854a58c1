//! Date formatting against the pattern mini-language.
//!
//! A pattern mixes recognized flag tokens (`yyyy`, `MM`, `dd`, `HH`, ...)
//! with literal text. Tokenization is greedy and order-sensitive: longer
//! spellings win over shorter ones, quoted (`'...'`, `"..."`) and bracketed
//! (`[...]`) spans emit their inner text verbatim, and anything unrecognized
//! passes through unchanged. A `UTC:` prefix or a trailing `Z` switches the
//! field accessors to UTC; the prefix is stripped before tokenizing, the
//! `Z` stays (it is itself the offset token).

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

use crate::culture::CultureData;
use crate::date_parse::parse_date;
use crate::error::{FormatError, FormatResult};

/// Accepted date inputs for [`format_date`].
#[derive(Debug, Clone)]
pub enum DateInput<'a> {
    /// The current instant.
    Now,
    Instant(DateTime<Local>),
    EpochMillis(i64),
    /// Parsed through the default-pattern fallback chain before formatting.
    Text(&'a str),
}

impl From<DateTime<Local>> for DateInput<'static> {
    fn from(value: DateTime<Local>) -> Self {
        DateInput::Instant(value)
    }
}

impl From<i64> for DateInput<'static> {
    fn from(value: i64) -> Self {
        DateInput::EpochMillis(value)
    }
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(value: &'a str) -> Self {
        DateInput::Text(value)
    }
}

/// Formats a date according to `pattern` (default `yyyy-MM-dd`) using the
/// supplied culture's calendar names.
pub fn format_date(
    date: DateInput<'_>,
    pattern: Option<&str>,
    culture: &CultureData,
) -> FormatResult<String> {
    let resolved: DateTime<Local> = match date {
        DateInput::Now => Local::now(),
        DateInput::Instant(instant) => instant,
        DateInput::EpochMillis(millis) => Local
            .timestamp_millis_opt(millis)
            .single()
            .ok_or(FormatError::InvalidDate)?,
        DateInput::Text(text) => {
            parse_date(text, None, culture, false).ok_or(FormatError::InvalidDate)?
        }
    };

    let mut pattern = pattern.unwrap_or("yyyy-MM-dd");
    let mut utc = false;
    if let Some(stripped) = pattern.strip_prefix("UTC:") {
        utc = true;
        pattern = stripped;
    }
    if pattern.ends_with('Z') {
        utc = true;
    }

    let view = FieldView::new(&resolved, utc);
    let mut output = String::new();
    for token in tokenize_format(pattern) {
        match token {
            FormatToken::Flag(flag) => output.push_str(&render_flag(flag, &view, culture)),
            FormatToken::Literal(text) => output.push_str(&text),
        }
    }
    Ok(output)
}

/// One recognized flag token of the format mini-language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Day1,
    Day2,
    WeekdayShort,
    WeekdayLong,
    Month1,
    Month2,
    MonthShort,
    MonthLong,
    Year2,
    Year4,
    Hour12One,
    Hour12Two,
    Hour24One,
    Hour24Two,
    Minute1,
    Minute2,
    Second1,
    Second2,
    /// `l`: three-digit milliseconds.
    Millis3,
    /// `L`: two-digit (rounded) milliseconds.
    Millis2,
    /// `f`..`fffffff`: fixed-width truncated fractional seconds.
    Frac(usize),
    /// `F`..`FFFFFFF`: like `Frac` but empty when all digits are zero.
    FracElide(usize),
    AmPmShortLower,
    AmPmLower,
    AmPmShortUpper,
    AmPmUpper,
    /// `Z`: offset designator (`Z` in UTC mode, `+HHmm` style otherwise).
    Offset,
    /// `UTC`: zone name (`UTC` in UTC mode, `GMT+HHMM` style otherwise).
    ZoneName,
    /// `o`: signed numeric offset.
    NumericOffset,
    /// `S`: English ordinal suffix for the day of month.
    Ordinal,
}

impl Flag {
    fn from_spelling(spelling: &str) -> Option<Flag> {
        let flag = match spelling {
            "d" => Flag::Day1,
            "dd" => Flag::Day2,
            "ddd" => Flag::WeekdayShort,
            "dddd" => Flag::WeekdayLong,
            "M" => Flag::Month1,
            "MM" => Flag::Month2,
            "MMM" => Flag::MonthShort,
            "MMMM" => Flag::MonthLong,
            "yy" => Flag::Year2,
            "yyyy" => Flag::Year4,
            "h" => Flag::Hour12One,
            "hh" => Flag::Hour12Two,
            "H" => Flag::Hour24One,
            "HH" => Flag::Hour24Two,
            "m" => Flag::Minute1,
            "mm" => Flag::Minute2,
            "s" => Flag::Second1,
            "ss" => Flag::Second2,
            "l" => Flag::Millis3,
            "L" => Flag::Millis2,
            "t" => Flag::AmPmShortLower,
            "tt" => Flag::AmPmLower,
            "T" => Flag::AmPmShortUpper,
            "TT" => Flag::AmPmUpper,
            "Z" => Flag::Offset,
            "UTC" => Flag::ZoneName,
            "o" => Flag::NumericOffset,
            "S" => Flag::Ordinal,
            _ => {
                if !spelling.is_empty() && spelling.chars().all(|ch| ch == 'f') {
                    return Some(Flag::Frac(spelling.len()));
                }
                if !spelling.is_empty() && spelling.chars().all(|ch| ch == 'F') {
                    return Some(Flag::FracElide(spelling.len()));
                }
                return None;
            }
        };
        Some(flag)
    }
}

/// Calendar fields of one instant, read either in local time or UTC.
/// The timezone offset is kept in "minutes west of UTC" form because the
/// offset flags were specified against that convention.
struct FieldView {
    year: i32,
    month0: u32,
    day: u32,
    weekday: usize,
    hours: u32,
    minutes: u32,
    seconds: u32,
    millis: u32,
    offset_west_minutes: i32,
    utc: bool,
}

impl FieldView {
    fn new(instant: &DateTime<Local>, utc: bool) -> Self {
        let offset_west_minutes = -instant.offset().local_minus_utc() / 60;
        if utc {
            let utc_instant = instant.with_timezone(&Utc);
            Self {
                year: utc_instant.year(),
                month0: utc_instant.month0(),
                day: utc_instant.day(),
                weekday: utc_instant.weekday().num_days_from_sunday() as usize,
                hours: utc_instant.hour(),
                minutes: utc_instant.minute(),
                seconds: utc_instant.second(),
                millis: utc_instant.timestamp_subsec_millis(),
                offset_west_minutes,
                utc,
            }
        } else {
            Self {
                year: instant.year(),
                month0: instant.month0(),
                day: instant.day(),
                weekday: instant.weekday().num_days_from_sunday() as usize,
                hours: instant.hour(),
                minutes: instant.minute(),
                seconds: instant.second(),
                millis: instant.timestamp_subsec_millis(),
                offset_west_minutes,
                utc,
            }
        }
    }
}

fn pad2(value: u32) -> String {
    format!("{value:02}")
}

fn pad3(value: u32) -> String {
    format!("{value:03}")
}

fn render_flag(flag: Flag, view: &FieldView, culture: &CultureData) -> String {
    match flag {
        Flag::Day1 => view.day.to_string(),
        Flag::Day2 => pad2(view.day),
        Flag::WeekdayShort => name_at(&culture.days_short, view.weekday),
        Flag::WeekdayLong => name_at(&culture.days, view.weekday),
        Flag::Month1 => (view.month0 + 1).to_string(),
        Flag::Month2 => pad2(view.month0 + 1),
        Flag::MonthShort => name_at(&culture.months_short, view.month0 as usize),
        Flag::MonthLong => name_at(&culture.months, view.month0 as usize),
        // Low two digits by string slicing, not modulo, so any year
        // magnitude keeps its tail.
        Flag::Year2 => view.year.to_string().chars().skip(2).collect(),
        Flag::Year4 => view.year.to_string(),
        Flag::Hour12One => hour12(view.hours).to_string(),
        Flag::Hour12Two => pad2(hour12(view.hours)),
        Flag::Hour24One => view.hours.to_string(),
        Flag::Hour24Two => pad2(view.hours),
        Flag::Minute1 => view.minutes.to_string(),
        Flag::Minute2 => pad2(view.minutes),
        Flag::Second1 => view.seconds.to_string(),
        Flag::Second2 => pad2(view.seconds),
        Flag::Millis3 => pad3(view.millis),
        Flag::Millis2 => {
            let rounded = if view.millis > 99 {
                ((view.millis as f64) / 10.0).round() as u32
            } else {
                view.millis
            };
            pad2(rounded)
        }
        Flag::Frac(width) => frac_digits(view.millis, width),
        Flag::FracElide(width) => {
            let leading = match width {
                1 => view.millis / 100,
                2 => view.millis / 10,
                _ => view.millis,
            };
            if leading == 0 {
                String::new()
            } else {
                frac_digits(view.millis, width)
            }
        }
        Flag::AmPmShortLower => String::from(if view.hours < 12 {
            culture.am_short_lower()
        } else {
            culture.pm_short_lower()
        }),
        Flag::AmPmLower => String::from(if view.hours < 12 {
            culture.am_lower()
        } else {
            culture.pm_lower()
        }),
        Flag::AmPmShortUpper => String::from(if view.hours < 12 {
            culture.am_short_upper()
        } else {
            culture.pm_short_upper()
        }),
        Flag::AmPmUpper => String::from(if view.hours < 12 {
            culture.am_upper()
        } else {
            culture.pm_upper()
        }),
        Flag::Offset => {
            if view.utc {
                String::from("Z")
            } else {
                let west = view.offset_west_minutes;
                let sign = if west > 0 { '-' } else { '+' };
                let magnitude = west.unsigned_abs();
                let remainder = magnitude % 60;
                let mut output = format!("{sign}{:02}", (magnitude - remainder) / 60);
                if remainder != 0 {
                    output.push_str(&pad2(remainder));
                }
                output
            }
        }
        Flag::ZoneName => {
            if view.utc {
                String::from("UTC")
            } else {
                let west = view.offset_west_minutes;
                let sign = if west > 0 { '-' } else { '+' };
                let magnitude = west.unsigned_abs();
                format!("GMT{sign}{:02}{:02}", magnitude / 60, magnitude % 60)
            }
        }
        Flag::NumericOffset => {
            // Local mode reports a zero offset; UTC mode reports the
            // runtime's own offset from UTC.
            let west = if view.utc { view.offset_west_minutes } else { 0 };
            let sign = if west > 0 { '-' } else { '+' };
            let magnitude = west.unsigned_abs();
            format!("{sign}{:04}", (magnitude / 60) * 100 + magnitude % 60)
        }
        Flag::Ordinal => String::from(ordinal_suffix(view.day)),
    }
}

fn name_at(names: &[String], index: usize) -> String {
    names.get(index).cloned().unwrap_or_default()
}

fn hour12(hours: u32) -> u32 {
    let hour = hours % 12;
    if hour == 0 { 12 } else { hour }
}

fn frac_digits(millis: u32, width: usize) -> String {
    match width {
        1 => (millis / 100).to_string(),
        2 => pad2(millis / 10),
        3 => pad3(millis),
        _ => {
            let mut digits = pad3(millis);
            for _ in 3..width {
                digits.push('0');
            }
            digits
        }
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match day % 100 {
        11 | 12 | 13 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormatToken {
    Flag(Flag),
    Literal(String),
}

/// Greedy scan of a format pattern. `d`/`M` and `f`/`F` spans take up to
/// four and seven class characters respectively; hour/minute/second and
/// AM/PM tokens pair only with their own character; mixed-class spans fall
/// out of the flag table and pass through as literal text.
fn tokenize_format(pattern: &str) -> Vec<FormatToken> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];

        if ch == 'd' || ch == 'M' {
            let len = class_run(&chars, index, &['d', 'M'], 4);
            push_span(&mut tokens, &chars[index..index + len]);
            index += len;
        } else if ch == 'y' {
            if matches_run(&chars, index, 'y', 4) {
                tokens.push(FormatToken::Flag(Flag::Year4));
                index += 4;
            } else if matches_run(&chars, index, 'y', 2) {
                tokens.push(FormatToken::Flag(Flag::Year2));
                index += 2;
            } else {
                tokens.push(FormatToken::Literal(String::from('y')));
                index += 1;
            }
        } else if matches!(ch, 'H' | 'h' | 'm' | 's' | 'T' | 't') {
            let len = if chars.get(index + 1) == Some(&ch) { 2 } else { 1 };
            push_span(&mut tokens, &chars[index..index + len]);
            index += len;
        } else if matches!(ch, 'L' | 'l' | 'o' | 'S' | 'Z') {
            push_span(&mut tokens, &chars[index..index + 1]);
            index += 1;
        } else if ch == 'f' || ch == 'F' {
            let len = class_run(&chars, index, &['f', 'F'], 7);
            push_span(&mut tokens, &chars[index..index + len]);
            index += len;
        } else if ch == 'U' && starts_with_at(&chars, index, "UTC") {
            tokens.push(FormatToken::Flag(Flag::ZoneName));
            index += 3;
        } else if ch == '\'' || ch == '"' {
            match scan_delimited(&chars, index, ch) {
                Some(close) => {
                    let inner: String = chars[index + 1..close].iter().collect();
                    tokens.push(FormatToken::Literal(inner));
                    index = close + 1;
                }
                None => {
                    tokens.push(FormatToken::Literal(String::from(ch)));
                    index += 1;
                }
            }
        } else if ch == '[' {
            match scan_delimited(&chars, index, ']') {
                Some(close) => {
                    let inner: String = chars[index + 1..close].iter().collect();
                    tokens.push(FormatToken::Literal(inner));
                    index = close + 1;
                }
                None => {
                    tokens.push(FormatToken::Literal(String::from(ch)));
                    index += 1;
                }
            }
        } else {
            tokens.push(FormatToken::Literal(String::from(ch)));
            index += 1;
        }
    }

    tokens
}

fn push_span(tokens: &mut Vec<FormatToken>, span: &[char]) {
    let spelling: String = span.iter().collect();
    match Flag::from_spelling(&spelling) {
        Some(flag) => tokens.push(FormatToken::Flag(flag)),
        None => tokens.push(FormatToken::Literal(spelling)),
    }
}

fn class_run(chars: &[char], start: usize, class: &[char], max: usize) -> usize {
    let mut len = 0;
    while len < max && chars.get(start + len).is_some_and(|ch| class.contains(ch)) {
        len += 1;
    }
    len
}

pub(crate) fn matches_run(chars: &[char], start: usize, ch: char, len: usize) -> bool {
    (0..len).all(|offset| chars.get(start + offset) == Some(&ch))
}

fn starts_with_at(chars: &[char], start: usize, text: &str) -> bool {
    text.chars()
        .enumerate()
        .all(|(offset, ch)| chars.get(start + offset) == Some(&ch))
}

/// Finds the closing delimiter of a quoted or bracketed span, honoring
/// backslash escapes. Returns `None` when unterminated.
pub(crate) fn scan_delimited(chars: &[char], open: usize, close: char) -> Option<usize> {
    let mut index = open + 1;
    while index < chars.len() {
        if chars[index] == '\\' {
            if index + 1 >= chars.len() {
                return None;
            }
            index += 2;
            continue;
        }
        if chars[index] == close {
            return Some(index);
        }
        index += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Local, TimeZone};

    use super::{DateInput, format_date};
    use crate::culture::CultureData;
    use crate::error::FormatError;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("unambiguous local date")
    }

    fn fmt(date: DateTime<Local>, pattern: &str) -> String {
        format_date(date.into(), Some(pattern), &CultureData::default()).expect("format")
    }

    #[test]
    fn default_pattern_is_iso_date() {
        let date = local(2020, 5, 1, 15, 5, 7);
        let output = format_date(date.into(), None, &CultureData::default()).expect("format");
        assert_eq!(output, "2020-05-01");
    }

    #[test]
    fn two_digit_fields_are_zero_padded() {
        let date = local(2020, 5, 1, 9, 5, 7);
        assert_eq!(fmt(date, "dd/MM/yyyy HH:mm:ss"), "01/05/2020 09:05:07");
        assert_eq!(fmt(date, "d/M/yyyy H:m:s"), "1/5/2020 9:5:7");
    }

    #[test]
    fn twelve_hour_clock_and_am_pm_defaults() {
        let afternoon = local(2020, 5, 1, 15, 5, 0);
        assert_eq!(fmt(afternoon, "h:mm tt"), "3:05 pm");
        assert_eq!(fmt(afternoon, "hh:mm TT"), "03:05 PM");
        let midnight = local(2020, 5, 1, 0, 30, 0);
        assert_eq!(fmt(midnight, "h:mm t"), "12:30 a");
        let noon = local(2020, 5, 1, 12, 0, 0);
        assert_eq!(fmt(noon, "h T"), "12 P");
    }

    #[test]
    fn short_year_slices_instead_of_modulo() {
        assert_eq!(fmt(local(2009, 1, 2, 0, 0, 0), "yy"), "09");
        assert_eq!(fmt(local(1987, 1, 2, 0, 0, 0), "yy"), "87");
    }

    #[test]
    fn weekday_and_month_names() {
        // 2021-03-05 was a Friday.
        let date = local(2021, 3, 5, 0, 0, 0);
        assert_eq!(fmt(date, "dddd, MMMM d"), "Friday, March 5");
        assert_eq!(fmt(date, "ddd d MMM"), "Fri 5 Mar");
    }

    #[test]
    fn ordinal_suffixes() {
        assert_eq!(fmt(local(2021, 3, 1, 0, 0, 0), "dS"), "1st");
        assert_eq!(fmt(local(2021, 3, 2, 0, 0, 0), "dS"), "2nd");
        assert_eq!(fmt(local(2021, 3, 3, 0, 0, 0), "dS"), "3rd");
        assert_eq!(fmt(local(2021, 3, 4, 0, 0, 0), "dS"), "4th");
        assert_eq!(fmt(local(2021, 3, 11, 0, 0, 0), "dS"), "11th");
        assert_eq!(fmt(local(2021, 3, 12, 0, 0, 0), "dS"), "12th");
        assert_eq!(fmt(local(2021, 3, 21, 0, 0, 0), "dS"), "21st");
    }

    #[test]
    fn quoted_and_bracketed_literals_pass_through() {
        let date = local(2020, 5, 1, 12, 0, 0);
        assert_eq!(fmt(date, "yyyy-MM-dd'T'HH"), "2020-05-01T12");
        assert_eq!(fmt(date, "\"den \"d"), "den 1");
        assert_eq!(fmt(date, "[at ]HH:mm"), "at 12:00");
    }

    #[test]
    fn unrecognized_characters_pass_through() {
        let date = local(2020, 5, 1, 12, 0, 0);
        assert_eq!(fmt(date, "yyyy ~ MM"), "2020 ~ 05");
    }

    #[test]
    fn millisecond_family() {
        let date = local(2020, 5, 1, 12, 0, 0) + Duration::milliseconds(120);
        assert_eq!(fmt(date, "l"), "120");
        assert_eq!(fmt(date, "L"), "12");
        assert_eq!(fmt(date, "f"), "1");
        assert_eq!(fmt(date, "ff"), "12");
        assert_eq!(fmt(date, "fff"), "120");
        assert_eq!(fmt(date, "fffff"), "12000");
        assert_eq!(fmt(date, "FFF"), "120");

        let whole = local(2020, 5, 1, 12, 0, 0);
        assert_eq!(fmt(whole, "fff"), "000");
        assert_eq!(fmt(whole, "FFF"), "");
        assert_eq!(fmt(whole, "F"), "");
    }

    #[test]
    fn utc_prefix_formats_utc_fields() {
        let output = format_date(
            DateInput::EpochMillis(0),
            Some("UTC:yyyy-MM-dd HH:mm"),
            &CultureData::default(),
        )
        .expect("format");
        assert_eq!(output, "1970-01-01 00:00");
    }

    #[test]
    fn trailing_z_selects_utc_and_renders_designator() {
        let output = format_date(
            DateInput::EpochMillis(0),
            Some("yyyy-MM-dd'T'HH:mm:ssZ"),
            &CultureData::default(),
        )
        .expect("format");
        assert_eq!(output, "1970-01-01T00:00:00Z");
    }

    #[test]
    fn numeric_offset_is_zero_in_local_mode() {
        let date = local(2020, 5, 1, 12, 0, 0);
        assert_eq!(fmt(date, "o"), "+0000");
    }

    #[test]
    fn string_input_goes_through_the_parser() {
        let output = format_date(
            DateInput::Text("1970-01-02"),
            None,
            &CultureData::default(),
        )
        .expect("format");
        assert_eq!(output, "1970-01-02");
    }

    #[test]
    fn unparseable_input_is_a_format_error() {
        let result = format_date(
            DateInput::Text("not a date"),
            None,
            &CultureData::default(),
        );
        assert!(matches!(result, Err(FormatError::InvalidDate)));
    }

    #[test]
    fn localized_calendar_names() {
        let culture: CultureData = serde_json::from_value(serde_json::json!({
            "months": ["enero", "febrero", "marzo", "abril", "mayo", "junio",
                        "julio", "agosto", "septiembre", "octubre", "noviembre", "diciembre"],
        }))
        .expect("culture");
        let date = local(2020, 5, 1, 0, 0, 0);
        let output = format_date(date.into(), Some("d 'de' MMMM"), &culture).expect("format");
        assert_eq!(output, "1 de mayo");
    }
}
