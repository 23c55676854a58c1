//! Date parsing against the pattern mini-language.
//!
//! A pattern compiles to an anchored regex with one capture group per token
//! plus a side table describing what each group means. Non-strict parsers
//! are forgiving: numeric fields accept one or two digits, and the `/`, `.`
//! and `-` separators match any of the three. A token squeezed directly
//! against another token keeps its strict width so adjacent fields stay
//! unambiguous. Bracketed spans compile to optional non-capturing groups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};
use regex::Regex;

use crate::culture::{CultureData, all_case_permutations};
use crate::date_format::{matches_run, scan_delimited};
use crate::error::FormatResult;

/// Fallback patterns tried in order when no explicit pattern is given and
/// the input is not RFC 3339.
const DEFAULT_PATTERNS: [&str; 5] = [
    "yyyy-MM-dd'T'HH:mm:ss.FFFFFFFZ",
    "yyyy-MM-dd",
    "ddd, dd, MMM yyyy HH:mm:ss Z",
    "dddd, dd-MMM-yy HH:mm:ss Z",
    "ddd MMM d HH:mm:ss yyyy",
];

/// Parses `input` according to `pattern`, or through the RFC 3339 fast path
/// and the default-pattern chain when `pattern` is `None`. Returns `None`
/// when nothing matches or the matched fields do not form a valid date.
pub fn parse_date(
    input: &str,
    pattern: Option<&str>,
    culture: &CultureData,
    strict: bool,
) -> Option<DateTime<Local>> {
    match pattern {
        Some(pattern) => {
            let parser = DateParser::compile(pattern, culture, strict).ok()?;
            parser.parse(input, culture)
        }
        None => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
                return Some(parsed.with_timezone(&Local));
            }
            for fallback in DEFAULT_PATTERNS {
                if let Ok(parser) = DateParser::compile(fallback, culture, true) {
                    if let Some(parsed) = parser.parse(input, culture) {
                        return Some(parsed);
                    }
                }
            }
            None
        }
    }
}

/// What a capture group of a compiled parser contributes to the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Year,
    MonthName,
    MonthNameShort,
    Month,
    WeekdayName,
    WeekdayNameShort,
    Day,
    Hour24,
    Hour12,
    Minute,
    Second,
    Millis3,
    Millis2,
    Frac,
    AmPm,
    Zone,
    Ordinal,
    Literal,
}

/// A compiled date parser for one pattern/culture/strictness combination.
#[derive(Debug)]
pub struct DateParser {
    regex: Regex,
    groups: Vec<GroupKind>,
}

impl DateParser {
    pub fn compile(pattern: &str, culture: &CultureData, strict: bool) -> FormatResult<DateParser> {
        let tokens = tokenize_parser_pattern(pattern);
        let mut source = String::new();
        let mut groups = Vec::new();
        build_pattern(&tokens, strict, culture, &mut source, &mut groups);
        let regex = Regex::new(&format!("^{source}$"))?;
        Ok(DateParser { regex, groups })
    }

    pub fn parse(&self, input: &str, culture: &CultureData) -> Option<DateTime<Local>> {
        self.parse_at(input, culture, Local::now())
    }

    /// Like [`parse`](Self::parse) but with an explicit reference instant,
    /// which supplies the missing-field defaults and anchors the 50-year
    /// window used for two-digit years.
    pub(crate) fn parse_at(
        &self,
        input: &str,
        culture: &CultureData,
        now: DateTime<Local>,
    ) -> Option<DateTime<Local>> {
        let captures = self.regex.captures(input)?;

        let now_year = now.year();
        let base_year = now_year / 100 * 100;

        let mut year: Option<i32> = None;
        let mut month0: Option<u32> = None;
        let mut day: Option<u32> = None;
        let mut hours: Option<u32> = None;
        let mut hours12 = false;
        let mut hours_meridiem: Option<String> = None;
        let mut minutes: Option<u32> = None;
        let mut seconds: Option<u32> = None;
        let mut millis: Option<f64> = None;
        let mut timezone: Option<i32> = None;

        for (index, kind) in self.groups.iter().enumerate() {
            let Some(part) = captures.get(index + 1) else {
                continue;
            };
            let part = part.as_str();

            match kind {
                GroupKind::Year => {
                    let mut value: i32 = match part.parse() {
                        Ok(value) => value,
                        Err(_) => continue,
                    };
                    if value < 100 {
                        value += base_year;
                        if value - now_year > 50 {
                            value -= 100;
                        } else if now_year - value > 50 {
                            value += 100;
                        }
                    }
                    year = Some(value);
                }
                GroupKind::MonthName => {
                    if let Some(found) = culture.months.iter().position(|name| name == part) {
                        month0 = Some(found as u32);
                    }
                }
                GroupKind::MonthNameShort => {
                    if let Some(found) = culture.months_short.iter().position(|name| name == part) {
                        month0 = Some(found as u32);
                    }
                }
                GroupKind::Month => {
                    let value: u32 = part.parse().ok()?;
                    month0 = Some(value.checked_sub(1)?);
                }
                // A weekday name fills the day-of-month field with the
                // weekday index. Content relying on the historical behavior
                // expects exactly this.
                GroupKind::WeekdayName => {
                    if let Some(found) = culture.days.iter().position(|name| name == part) {
                        day = Some(found as u32);
                    }
                }
                GroupKind::WeekdayNameShort => {
                    if let Some(found) = culture.days_short.iter().position(|name| name == part) {
                        day = Some(found as u32);
                    }
                }
                GroupKind::Day => {
                    if let Ok(value) = part.parse() {
                        day = Some(value);
                    }
                }
                GroupKind::Hour24 => {
                    if let Ok(value) = part.parse() {
                        hours = Some(value);
                        hours12 = false;
                    }
                }
                GroupKind::Hour12 => {
                    if let Ok(value) = part.parse() {
                        hours = Some(value);
                        hours12 = true;
                    }
                }
                GroupKind::Minute => {
                    if let Ok(value) = part.parse() {
                        minutes = Some(value);
                    }
                }
                GroupKind::Second => {
                    if let Ok(value) = part.parse() {
                        seconds = Some(value);
                    }
                }
                GroupKind::Millis3 => {
                    if let Ok(value) = part.parse() {
                        millis = Some(value);
                    }
                }
                GroupKind::Millis2 => {
                    if let Ok(value) = part.parse::<f64>() {
                        millis = Some(if value < 10.0 { value * 100.0 } else { value * 10.0 });
                    }
                }
                GroupKind::Frac => {
                    // Normalize to milliseconds: the first three digits are
                    // whole milliseconds, the rest a fraction.
                    let mut normalized = String::from(part);
                    if normalized.len() > 3 {
                        normalized.insert(3, '.');
                    } else {
                        while normalized.len() < 3 {
                            normalized.push('0');
                        }
                    }
                    if let Ok(value) = normalized.parse() {
                        millis = Some(value);
                    }
                }
                GroupKind::AmPm => {
                    if hours12 {
                        hours_meridiem = Some(part.to_lowercase());
                    }
                }
                GroupKind::Zone => {
                    if let Some(tz) = zone_part_regex().captures(part) {
                        if tz.get(1).is_some() {
                            timezone = Some(0);
                        } else if let Some(offset) = tz.get(2) {
                            let offset = offset.as_str();
                            let hours_part: i32 = offset[1..3].parse().unwrap_or(0);
                            let minutes_text = offset[3..].trim_start_matches(':');
                            let minutes_part: i32 = minutes_text.parse().unwrap_or(0);
                            let mut total = hours_part * 60 + minutes_part;
                            if offset.starts_with('-') {
                                total = -total;
                            }
                            timezone = Some(total);
                        }
                    }
                }
                GroupKind::Ordinal | GroupKind::Literal => {}
            }
        }

        let year = year.unwrap_or(now_year);
        let month0 = month0.unwrap_or_else(|| now.month0());
        let day = day.unwrap_or(1);
        let mut hours = hours.unwrap_or(0);

        if hours12 {
            if let Some(meridiem) = hours_meridiem {
                if meridiem == culture.am_lower().to_lowercase()
                    || meridiem == culture.am_short_lower().to_lowercase()
                {
                    if hours == 12 {
                        hours = 0;
                    }
                } else if (meridiem == culture.pm_lower().to_lowercase()
                    || meridiem == culture.pm_short_lower().to_lowercase())
                    && hours < 12
                {
                    hours += 12;
                }
            }
        }

        let naive = NaiveDate::from_ymd_opt(year, month0 + 1, day)?
            .and_hms_opt(hours, minutes.unwrap_or(0), seconds.unwrap_or(0))?
            + Duration::milliseconds(millis.unwrap_or(0.0).trunc() as i64);
        let mut parsed = Local.from_local_datetime(&naive).earliest()?;

        if let Some(offset_minutes) = timezone {
            let west_minutes = -parsed.offset().local_minus_utc() / 60;
            parsed -= Duration::minutes((offset_minutes + west_minutes) as i64);
        }

        Some(parsed)
    }
}

/// Per-language parser cache, keyed by pattern text and strictness.
#[derive(Debug, Default)]
pub struct ParserCache {
    parsers: Mutex<HashMap<(String, bool), Arc<DateParser>>>,
}

impl ParserCache {
    pub fn get_or_compile(
        &self,
        pattern: &str,
        culture: &CultureData,
        strict: bool,
    ) -> FormatResult<Arc<DateParser>> {
        let key = (String::from(pattern), strict);
        {
            let cache = self.parsers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(parser) = cache.get(&key) {
                return Ok(Arc::clone(parser));
            }
        }
        let parser = Arc::new(DateParser::compile(pattern, culture, strict)?);
        let mut cache = self.parsers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(Arc::clone(cache.entry(key).or_insert(parser)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternToken {
    /// A recognized flag, by canonical spelling.
    Flag(String),
    /// Free text to match verbatim.
    Literal(String),
    /// A bracketed optional sub-pattern, to be tokenized recursively.
    Optional(String),
}

/// Greedy scan, parser variant. Unlike the format scanner, `d`/`M` and
/// hour/minute/second class runs may mix characters; a mixed run is not a
/// recognized flag and falls through to free text.
fn tokenize_parser_pattern(pattern: &str) -> Vec<PatternToken> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];

        if ch == '\'' || ch == '"' {
            match scan_delimited(&chars, index, ch) {
                Some(close) => {
                    let inner: String = chars[index + 1..close].iter().collect();
                    push_literal(&mut tokens, &inner);
                    index = close + 1;
                }
                None => {
                    push_literal(&mut tokens, &String::from(ch));
                    index += 1;
                }
            }
        } else if ch == '[' {
            match scan_delimited(&chars, index, ']') {
                Some(close) => {
                    let inner: String = chars[index + 1..close].iter().collect();
                    if !inner.is_empty() {
                        tokens.push(PatternToken::Optional(inner));
                    }
                    index = close + 1;
                }
                None => {
                    push_literal(&mut tokens, &String::from(ch));
                    index += 1;
                }
            }
        } else if ch == 'y' {
            if matches_run(&chars, index, 'y', 4) {
                tokens.push(PatternToken::Flag(String::from("yyyy")));
                index += 4;
            } else if matches_run(&chars, index, 'y', 2) {
                tokens.push(PatternToken::Flag(String::from("yy")));
                index += 2;
            } else {
                push_literal(&mut tokens, "y");
                index += 1;
            }
        } else if ch == 'd' || ch == 'M' {
            index += push_class_run(&mut tokens, &chars, index, &['d', 'M'], 4);
        } else if matches!(ch, 'H' | 'h' | 'm' | 's' | 'T' | 't') {
            index += push_class_run(&mut tokens, &chars, index, &['H', 'h', 'm', 's', 'T', 't'], 2);
        } else if matches!(ch, 'L' | 'l' | 'o' | 'S' | 'Z') {
            tokens.push(PatternToken::Flag(String::from(ch)));
            index += 1;
        } else if ch == 'f' || ch == 'F' {
            index += push_class_run(&mut tokens, &chars, index, &['f', 'F'], 7);
        } else if ch == 'U' && chars.get(index + 1) == Some(&'T') && chars.get(index + 2) == Some(&'C')
        {
            tokens.push(PatternToken::Flag(String::from("UTC")));
            index += 3;
        } else {
            push_literal(&mut tokens, &String::from(ch));
            index += 1;
        }
    }

    tokens
}

fn push_class_run(
    tokens: &mut Vec<PatternToken>,
    chars: &[char],
    start: usize,
    class: &[char],
    max: usize,
) -> usize {
    let mut len = 0;
    while len < max && chars.get(start + len).is_some_and(|ch| class.contains(ch)) {
        len += 1;
    }
    let spelling: String = chars[start..start + len].iter().collect();
    if is_recognized(&spelling) {
        tokens.push(PatternToken::Flag(spelling));
    } else {
        push_literal(tokens, &spelling);
    }
    len
}

fn push_literal(tokens: &mut Vec<PatternToken>, text: &str) {
    let unescaped = text.replace("\\\\", "\\");
    tokens.push(PatternToken::Literal(unescaped));
}

fn is_recognized(spelling: &str) -> bool {
    matches!(
        spelling,
        "yyyy" | "yy" | "MMMM" | "MMM" | "MM" | "M" | "dddd" | "ddd" | "dd" | "d" | "HH" | "H"
            | "hh" | "h" | "mm" | "m" | "ss" | "s" | "l" | "L" | "tt" | "t" | "TT" | "T" | "Z"
            | "UTC" | "o" | "S"
    ) || (!spelling.is_empty() && spelling.chars().all(|ch| ch == 'f'))
        || (!spelling.is_empty() && spelling.chars().all(|ch| ch == 'F'))
}

fn build_pattern(
    tokens: &[PatternToken],
    strict: bool,
    culture: &CultureData,
    source: &mut String,
    groups: &mut Vec<GroupKind>,
) {
    for (index, token) in tokens.iter().enumerate() {
        match token {
            PatternToken::Optional(inner) => {
                source.push_str("(?:");
                build_pattern(&tokenize_parser_pattern(inner), strict, culture, source, groups);
                source.push_str(")?");
            }
            PatternToken::Flag(spelling) => {
                let adjacent = (index > 0 && matches!(tokens[index - 1], PatternToken::Flag(_)))
                    || (index + 1 < tokens.len()
                        && matches!(tokens[index + 1], PatternToken::Flag(_)));
                let fragment = flag_fragment(spelling, culture, strict || adjacent);
                source.push('(');
                source.push_str(&fragment);
                source.push(')');
                groups.push(group_kind(spelling));
            }
            PatternToken::Literal(text) => {
                if !strict && (text == "/" || text == "." || text == "-") {
                    source.push_str("([/\\.-])");
                } else {
                    source.push('(');
                    source.push_str(&regex::escape(text));
                    source.push(')');
                }
                groups.push(GroupKind::Literal);
            }
        }
    }
}

fn group_kind(spelling: &str) -> GroupKind {
    match spelling {
        "yyyy" | "yy" => GroupKind::Year,
        "MMMM" => GroupKind::MonthName,
        "MMM" => GroupKind::MonthNameShort,
        "MM" | "M" => GroupKind::Month,
        "dddd" => GroupKind::WeekdayName,
        "ddd" => GroupKind::WeekdayNameShort,
        "dd" | "d" => GroupKind::Day,
        "HH" | "H" => GroupKind::Hour24,
        "hh" | "h" => GroupKind::Hour12,
        "mm" | "m" => GroupKind::Minute,
        "ss" | "s" => GroupKind::Second,
        "l" => GroupKind::Millis3,
        "L" => GroupKind::Millis2,
        "tt" | "t" | "TT" | "T" => GroupKind::AmPm,
        "Z" | "UTC" | "o" => GroupKind::Zone,
        "S" => GroupKind::Ordinal,
        _ => GroupKind::Frac,
    }
}

fn flag_fragment(spelling: &str, culture: &CultureData, strict: bool) -> String {
    match spelling {
        "yyyy" => String::from(if strict { "[0-9]{4}" } else { "[0-9]{2}|[0-9]{4}" }),
        "yy" => String::from("[0-9]{2}"),
        "MMMM" => names_to_regex(&culture.months),
        "MMM" => names_to_regex(&culture.months_short),
        "dddd" => names_to_regex(&culture.days),
        "ddd" => names_to_regex(&culture.days_short),
        "MM" | "dd" | "HH" | "hh" | "mm" | "ss" => {
            String::from(if strict { "[0-9]{2}" } else { "[0-9]{1,2}" })
        }
        "M" | "d" | "H" | "h" | "m" | "s" => String::from("[0-9]{1,2}"),
        "l" => String::from("[0-9]{3}"),
        "L" => String::from("[0-9]{2}"),
        "tt" | "TT" => meridiem_fragment(
            culture.am_lower(),
            culture.pm_lower(),
            culture.am_upper(),
            culture.pm_upper(),
        ),
        "t" | "T" => meridiem_fragment(
            culture.am_short_lower(),
            culture.pm_short_lower(),
            culture.am_short_upper(),
            culture.pm_short_upper(),
        ),
        "Z" => String::from(
            "Z|(?:GMT|UTC)?[+-][0-9]{2,4}(?:\\([a-zA-Z ]+ (?:Standard|Daylight|Prevailing) Time\\))?",
        ),
        "UTC" => String::from("[+-][0-9]{2,4}"),
        "o" => String::from("[+-][0-9]{4}"),
        "S" => String::from("th|st|nd|rd"),
        _ => {
            // f/F runs: fixed or up-to-length digit groups.
            let width = spelling.len();
            if spelling.starts_with('f') {
                format!("[0-9]{{{width}}}")
            } else {
                format!("[0-9]{{0,{width}}}")
            }
        }
    }
}

/// All case spellings of the AM and PM tokens, as one alternation. The
/// uppercase tokens contribute only when they are not just a case variant
/// of the lowercase ones.
fn meridiem_fragment(am: &str, pm: &str, am_upper: &str, pm_upper: &str) -> String {
    let mut all = all_case_permutations(am);
    all.extend(all_case_permutations(pm));
    if am.to_lowercase() != am_upper.to_lowercase() {
        all.extend(all_case_permutations(am_upper));
    }
    if pm.to_lowercase() != pm_upper.to_lowercase() {
        all.extend(all_case_permutations(pm_upper));
    }
    names_to_regex(&all)
}

fn names_to_regex(names: &[String]) -> String {
    let mut fragment = String::new();
    for (index, name) in names.iter().enumerate() {
        if index > 0 {
            fragment.push('|');
        }
        fragment.push_str(&regex::escape(name));
    }
    fragment
}

fn zone_part_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            "(Z)|(?:GMT|UTC)?([+-][0-9]{2}(?::?[0-9]{2}))(?:\\([a-zA-Z ]+ (?:Standard|Daylight|Prevailing) Time\\))?",
        )
        .expect("zone regex compiles")
    })
}
