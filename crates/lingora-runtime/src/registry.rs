//! The language registry: holds translation trees keyed by language code,
//! tracks the active and fallback languages, and resolves translation keys
//! with plural and gender selection plus template post-processing.

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use lingora_core::{
    CultureData, DEFAULT_DECIMAL_SEPARATOR, DateInput, LocaleSeparators, ParserCache,
    TranslationBackend, default_thousands_separator, process_localized_string,
};

use crate::error::{RegistryError, RegistryResult};
use crate::filesize::{PhysicalSize, physical_size};
use crate::numbers::{display_number, format_raw_number_string, parse_number};

/// Maps a count to a plural-form key suffix (appended as `key_suffix`).
pub type PluralFn = Box<dyn Fn(f64) -> String + Send + Sync>;

/// Per-language settings supplied at registration. Everything defaults:
/// English-style plural rules, `.` decimal separator, and the thousands
/// separator complementing the decimal one.
#[derive(Default)]
pub struct LanguageOptions {
    pub plural: Option<PluralFn>,
    pub decimal: Option<String>,
    pub thousands: Option<String>,
}

struct Language {
    code: String,
    data: Value,
    plural: PluralFn,
    decimal: String,
    thousands: String,
    culture: CultureData,
    parsers: ParserCache,
}

/// The translation registry. Languages keep their registration order, and
/// the first registered language becomes active and doubles as the last
/// resort of code resolution.
#[derive(Default)]
pub struct Registry {
    languages: Vec<Language>,
    active: Option<String>,
    fallback: Option<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a language tree under `code`, replacing any previous
    /// registration of the same code in place.
    pub fn add(&mut self, code: &str, data: Value, options: LanguageOptions) {
        let decimal = options
            .decimal
            .unwrap_or_else(|| String::from(DEFAULT_DECIMAL_SEPARATOR));
        let thousands = options
            .thousands
            .unwrap_or_else(|| String::from(default_thousands_separator(&decimal)));
        let plural = options.plural.unwrap_or_else(|| Box::new(default_plural));
        let culture = culture_from(&data);

        let language = Language {
            code: String::from(code),
            data,
            plural,
            decimal,
            thousands,
            culture,
            parsers: ParserCache::default(),
        };

        match self.languages.iter().position(|entry| entry.code == code) {
            Some(index) => self.languages[index] = language,
            None => self.languages.push(language),
        }

        if self.active.is_none() {
            self.active = Some(String::from(code));
        }
    }

    /// Removes all languages and clears the active and fallback selections.
    pub fn reset(&mut self) {
        self.languages.clear();
        self.active = None;
        self.fallback = None;
    }

    pub fn available_languages(&self) -> Vec<&str> {
        self.languages.iter().map(|entry| entry.code.as_str()).collect()
    }

    pub fn active_language(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Switches the active language. The code resolves leniently: `iw` maps
    /// to `he`, region suffixes are stripped one at a time (`en-US` and
    /// `en_US` both reach `en`), and an unknown code lands on the first
    /// registered language.
    pub fn set_active_language(&mut self, code: &str) -> RegistryResult<()> {
        let resolved = self
            .resolve(code)
            .map(|entry| entry.code.clone())
            .ok_or(RegistryError::NoLanguages)?;
        self.active = Some(resolved);
        Ok(())
    }

    /// Sets the language consulted when the active one misses a key. An
    /// unresolvable code is kept verbatim, so a language registered later
    /// under that code still becomes the fallback.
    pub fn set_fallback_language(&mut self, code: &str) {
        let resolved = self.resolve(code).map(|entry| entry.code.clone());
        self.fallback = Some(resolved.unwrap_or_else(|| String::from(code)));
    }

    /// Overlays dotted-path entries onto a registered language tree, for
    /// example `{"menu.file.open": "Open…"}`. Missing intermediate objects
    /// are created; null and other falsy extension values are skipped.
    pub fn extend_language(&mut self, code: &str, extension: &Value) {
        let Some(index) = self.languages.iter().position(|entry| entry.code == code) else {
            return;
        };
        let Value::Object(entries) = extension else {
            return;
        };

        let language = &mut self.languages[index];
        for (dotted, value) in entries {
            if is_falsy(value) {
                continue;
            }
            insert_dotted(&mut language.data, dotted, value.clone());
        }

        // The calendar may have changed, and cached parsers embed its names.
        language.culture = culture_from(&language.data);
        language.parsers = ParserCache::default();
    }

    /// Applies [`extend_language`](Self::extend_language) for every language
    /// in the map.
    pub fn extend_languages(&mut self, extensions: &Value) {
        if let Value::Object(by_language) = extensions {
            for (code, extension) in by_language {
                self.extend_language(code, extension);
            }
        }
    }

    /// Resolves a translation by dotted key path.
    ///
    /// A numeric `count` in `options` first tries the plural-form key
    /// (`key_one`, `key_plural`, ...) before the bare key. A miss retries
    /// once in the fallback language. A string `gender` in `options`
    /// selects a variant from an object value, falling back through the
    /// `m`/`f` aliases, `neutral`, `n` and the empty tag to the whole
    /// object. The resolved value is post-processed when options were given
    /// or it contains placeholder or `t(` syntax. The empty key returns the
    /// root of the active tree.
    pub fn t(&self, key: &str, options: Option<&Value>) -> Option<Value> {
        let active = self.active_entry()?;
        if key.is_empty() {
            return Some(active.data.clone());
        }
        let keys: Vec<&str> = key.split('.').collect();

        let mut resolved = lookup_value(active, &keys, options);
        if resolved.is_none() {
            if let Some(fallback) = self.fallback.as_deref() {
                if fallback != active.code {
                    if let Some(language) =
                        self.languages.iter().find(|entry| entry.code == fallback)
                    {
                        resolved = lookup_value(language, &keys, options);
                    }
                }
            }
        }
        let mut resolved = resolved?;

        if let Some(options) = options {
            if let Some(Value::String(gender)) = options.get("gender") {
                resolved = select_gender(resolved, gender);
            }
        }

        let needs_processing = options.is_some()
            || matches!(&resolved, Value::String(text) if text.contains('{') || text.contains("t("));
        if needs_processing {
            resolved = process_localized_string(&resolved, options, self);
        }
        Some(resolved)
    }

    pub fn decimal_separator(&self) -> &str {
        match self.active_entry() {
            Some(entry) => &entry.decimal,
            None => DEFAULT_DECIMAL_SEPARATOR,
        }
    }

    pub fn thousands_separator(&self) -> &str {
        match self.active_entry() {
            Some(entry) => &entry.thousands,
            None => default_thousands_separator(DEFAULT_DECIMAL_SEPARATOR),
        }
    }

    /// Renders a number with the active locale's separators.
    pub fn display_number(&self, value: f64, thousands: bool) -> String {
        display_number(
            value,
            thousands,
            self.decimal_separator(),
            self.thousands_separator(),
        )
    }

    /// Renders an already stringified number (`.` decimal) with the active
    /// locale's separators.
    pub fn format_raw_number_string(&self, value: &str, thousands: bool) -> String {
        format_raw_number_string(
            value,
            thousands,
            self.decimal_separator(),
            self.thousands_separator(),
        )
    }

    /// Parses user input written with the active locale's separators.
    pub fn parse_number(&self, value: &str, thousands: bool) -> Option<f64> {
        parse_number(
            value,
            thousands,
            self.decimal_separator(),
            self.thousands_separator(),
        )
    }

    /// Scales a byte count to a human unit named by the active language's
    /// `size_abbrs` subtree.
    pub fn physical_size(&self, bytes: f64) -> PhysicalSize {
        let abbreviations = self.t("size_abbrs", None).unwrap_or(Value::Null);
        physical_size(bytes, &abbreviations)
    }

    /// Formats a date using the calendar of `language` (resolved leniently)
    /// or of the active language.
    pub fn format_date(
        &self,
        date: DateInput<'_>,
        pattern: Option<&str>,
        language: Option<&str>,
    ) -> RegistryResult<String> {
        let fallback_culture;
        let culture = match self.entry_for(language) {
            Some(entry) => &entry.culture,
            None => {
                fallback_culture = CultureData::default();
                &fallback_culture
            }
        };
        Ok(lingora_core::format_date(date, pattern, culture)?)
    }

    /// Parses a date using the calendar of `language` or of the active
    /// language. Explicit patterns compile through the language's parser
    /// cache.
    pub fn parse_date(
        &self,
        input: &str,
        pattern: Option<&str>,
        language: Option<&str>,
        strict: bool,
    ) -> Option<DateTime<Local>> {
        match self.entry_for(language) {
            Some(entry) => match pattern {
                Some(pattern) => {
                    let parser = entry
                        .parsers
                        .get_or_compile(pattern, &entry.culture, strict)
                        .ok()?;
                    parser.parse(input, &entry.culture)
                }
                None => lingora_core::parse_date(input, None, &entry.culture, strict),
            },
            None => lingora_core::parse_date(input, pattern, &CultureData::default(), strict),
        }
    }

    fn active_entry(&self) -> Option<&Language> {
        let code = self.active.as_deref()?;
        self.languages.iter().find(|entry| entry.code == code)
    }

    fn entry_for(&self, language: Option<&str>) -> Option<&Language> {
        match language {
            Some(code) => self.resolve(code),
            None => self.active_entry(),
        }
    }

    fn resolve(&self, code: &str) -> Option<&Language> {
        let code = if code == "iw" { "he" } else { code };
        if code.is_empty() {
            return self.languages.first();
        }
        let mut current = code;
        loop {
            if let Some(found) = self.languages.iter().find(|entry| entry.code == current) {
                return Some(found);
            }
            let split = match current.rfind('-') {
                Some(index) => Some(index),
                None => current.rfind('_'),
            };
            match split {
                Some(index) if index > 0 => current = &current[..index],
                _ => break,
            }
        }
        self.languages.first()
    }
}

impl TranslationBackend for Registry {
    fn lookup(&self, key: &str, options: Option<&Value>) -> Option<Value> {
        self.t(key, options)
    }

    fn separators(&self) -> LocaleSeparators {
        match self.active_entry() {
            Some(entry) => LocaleSeparators {
                decimal: entry.decimal.clone(),
                thousands: entry.thousands.clone(),
            },
            None => LocaleSeparators::default(),
        }
    }
}

fn default_plural(count: f64) -> String {
    if count == 0.0 {
        String::from("zero")
    } else if count == 1.0 {
        String::from("one")
    } else {
        String::from("plural")
    }
}

fn culture_from(data: &Value) -> CultureData {
    data.get("calendar")
        .cloned()
        .and_then(|calendar| serde_json::from_value(calendar).ok())
        .unwrap_or_default()
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

fn lookup_value(language: &Language, keys: &[&str], options: Option<&Value>) -> Option<Value> {
    let count = options
        .and_then(|options| options.get("count"))
        .and_then(Value::as_f64);
    let mut node = &language.data;

    match count {
        Some(count) => {
            let (last, parents) = keys.split_last()?;
            for segment in parents {
                node = step(node, segment)?;
            }
            let suffix = (language.plural)(count);
            if !suffix.is_empty() {
                if let Some(found) = step(node, &format!("{last}_{suffix}")) {
                    if !is_falsy(found) {
                        return Some(found.clone());
                    }
                }
            }
            step(node, last).cloned()
        }
        None => {
            for segment in keys {
                node = step(node, segment)?;
            }
            Some(node.clone())
        }
    }
}

fn select_gender(value: Value, gender: &str) -> Value {
    let Value::Object(map) = &value else {
        return value;
    };
    if let Some(found) = map.get(gender) {
        return found.clone();
    }
    let alias = match gender {
        "male" => map.get("m"),
        "female" => map.get("f"),
        _ => None,
    };
    for candidate in [alias, map.get("neutral"), map.get("n"), map.get("")] {
        if let Some(found) = candidate {
            return found.clone();
        }
    }
    value
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn insert_dotted(target: &mut Value, dotted: &str, value: Value) {
    let segments: Vec<&str> = dotted.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = target;
    for segment in parents {
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry(String::from(*segment))
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Value::Object(map) = node {
        map.insert(String::from(*last), value);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Local, TimeZone, Timelike};
    use serde_json::{Value, json};

    use super::{LanguageOptions, Registry};
    use lingora_core::DateInput;

    fn english() -> Value {
        json!({
            "hello": "Hello",
            "menu": {"file": {"open": "Open", "close": "Close"}},
            "apples_zero": "no apples",
            "apples_one": "one apple",
            "apples_plural": "{{count}} apples",
            "greeting": {"m": "Mr.", "f": "Ms.", "neutral": "Hi"},
            "welcome": "Welcome, {{name}}!",
            "status": "t(\"hello\") world",
            "size_abbrs": {"b": "B", "kb": "KB", "mb": "MB", "gb": "GB", "tb": "TB"},
        })
    }

    fn spanish() -> Value {
        json!({
            "hello": "Hola",
            "calendar": {
                "months": ["enero", "febrero", "marzo", "abril", "mayo", "junio",
                            "julio", "agosto", "septiembre", "octubre", "noviembre", "diciembre"],
            },
        })
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.add("en", english(), LanguageOptions::default());
        registry.add(
            "es",
            spanish(),
            LanguageOptions {
                decimal: Some(String::from(",")),
                ..LanguageOptions::default()
            },
        );
        registry
    }

    #[test]
    fn first_language_becomes_active() {
        let registry = registry();
        assert_eq!(registry.active_language(), Some("en"));
        assert_eq!(registry.available_languages(), vec!["en", "es"]);
    }

    #[test]
    fn resolves_nested_keys() {
        let registry = registry();
        assert_eq!(registry.t("hello", None), Some(json!("Hello")));
        assert_eq!(registry.t("menu.file.open", None), Some(json!("Open")));
        assert_eq!(registry.t("menu.file.missing", None), None);
    }

    #[test]
    fn empty_key_returns_the_root_tree() {
        let registry = registry();
        let root = registry.t("", None).expect("root");
        assert_eq!(root.get("hello"), Some(&json!("Hello")));
    }

    #[test]
    fn language_codes_resolve_leniently() {
        let mut registry = registry();
        registry.set_active_language("es-MX").expect("set language");
        assert_eq!(registry.active_language(), Some("es"));
        registry.set_active_language("es_MX").expect("set language");
        assert_eq!(registry.active_language(), Some("es"));
        // Unknown codes land on the first registered language.
        registry.set_active_language("fr").expect("set language");
        assert_eq!(registry.active_language(), Some("en"));
    }

    #[test]
    fn hebrew_legacy_code_maps_over() {
        let mut registry = Registry::new();
        registry.add("en", json!({}), LanguageOptions::default());
        registry.add("he", json!({"hello": "שלום"}), LanguageOptions::default());
        registry.set_active_language("iw").expect("set language");
        assert_eq!(registry.active_language(), Some("he"));
    }

    #[test]
    fn set_active_language_without_languages_is_an_error() {
        let mut registry = Registry::new();
        assert!(registry.set_active_language("en").is_err());
    }

    #[test]
    fn plural_forms_select_by_count() {
        let registry = registry();
        assert_eq!(
            registry.t("apples", Some(&json!({"count": 0}))),
            Some(json!("no apples"))
        );
        assert_eq!(
            registry.t("apples", Some(&json!({"count": 1}))),
            Some(json!("one apple"))
        );
        assert_eq!(
            registry.t("apples", Some(&json!({"count": 7}))),
            Some(json!("7 apples"))
        );
    }

    #[test]
    fn custom_plural_rules() {
        let mut registry = Registry::new();
        registry.add(
            "pl",
            json!({"items_few": "kilka", "items_many": "wiele", "items": "?"}),
            LanguageOptions {
                plural: Some(Box::new(|count| {
                    if (2.0..=4.0).contains(&count) {
                        String::from("few")
                    } else {
                        String::from("many")
                    }
                })),
                ..LanguageOptions::default()
            },
        );
        assert_eq!(
            registry.t("items", Some(&json!({"count": 3}))),
            Some(json!("kilka"))
        );
        assert_eq!(
            registry.t("items", Some(&json!({"count": 9}))),
            Some(json!("wiele"))
        );
    }

    #[test]
    fn fallback_language_fills_missing_keys() {
        let mut registry = registry();
        registry.set_active_language("es").expect("set language");
        assert_eq!(registry.t("menu.file.open", None), None);

        registry.set_fallback_language("en");
        assert_eq!(registry.t("menu.file.open", None), Some(json!("Open")));
        // Keys present in the active language stay untouched.
        assert_eq!(registry.t("hello", None), Some(json!("Hola")));
    }

    #[test]
    fn gender_selection_with_aliases() {
        let registry = registry();
        assert_eq!(
            registry.t("greeting", Some(&json!({"gender": "m"}))),
            Some(json!("Mr."))
        );
        assert_eq!(
            registry.t("greeting", Some(&json!({"gender": "female"}))),
            Some(json!("Ms."))
        );
        assert_eq!(
            registry.t("greeting", Some(&json!({"gender": "robot"}))),
            Some(json!("Hi"))
        );
    }

    #[test]
    fn placeholders_substitute_option_data() {
        let registry = registry();
        assert_eq!(
            registry.t("welcome", Some(&json!({"name": "Ada"}))),
            Some(json!("Welcome, Ada!"))
        );
    }

    #[test]
    fn embedded_calls_resolve_without_options() {
        let registry = registry();
        assert_eq!(registry.t("status", None), Some(json!("Hello world")));
    }

    #[test]
    fn extension_overlays_dotted_paths() {
        let mut registry = registry();
        registry.extend_language(
            "en",
            &json!({
                "menu.file.open": "Open…",
                "menu.edit.undo": "Undo",
                "menu.file.close": null,
            }),
        );
        assert_eq!(registry.t("menu.file.open", None), Some(json!("Open…")));
        assert_eq!(registry.t("menu.edit.undo", None), Some(json!("Undo")));
        // Null extension values are skipped, the existing value survives.
        assert_eq!(registry.t("menu.file.close", None), Some(json!("Close")));
    }

    #[test]
    fn number_display_uses_the_active_separators() {
        let mut registry = registry();
        assert_eq!(registry.display_number(1234567.25, true), "1,234,567.25");

        registry.set_active_language("es").expect("set language");
        assert_eq!(registry.display_number(1234567.25, true), "1.234.567,25");
        assert_eq!(registry.parse_number("1.234,5", true), Some(1234.5));
    }

    #[test]
    fn physical_sizes_use_localized_unit_names() {
        let registry = registry();
        let size = registry.physical_size(1536.0);
        assert_eq!((size.size, size.name.as_str()), (1.5, "KB"));
    }

    #[test]
    fn dates_format_with_the_language_calendar() {
        let registry = registry();
        let date = Local
            .with_ymd_and_hms(2020, 5, 1, 0, 0, 0)
            .single()
            .expect("local date");
        let output = registry
            .format_date(DateInput::Instant(date), Some("d 'de' MMMM"), Some("es"))
            .expect("format");
        assert_eq!(output, "1 de mayo");
    }

    #[test]
    fn dates_parse_with_the_language_calendar() {
        let registry = registry();
        let parsed = registry
            .parse_date("1 de mayo 2020", Some("d 'de' MMMM yyyy"), Some("es"), false)
            .expect("parse");
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2020, 5, 1)
        );
        assert_eq!(parsed.hour(), 0);
    }

    #[test]
    fn printf_filter_uses_the_language_separators() {
        let mut registry = registry();
        registry.extend_language("es", &json!({"total": "Total: {{n|printf ,.2f}}"}));
        registry.set_active_language("es").expect("set language");
        assert_eq!(
            registry.t("total", Some(&json!({"n": 1234.5}))),
            Some(json!("Total: 1.234,50"))
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut registry = registry();
        registry.reset();
        assert_eq!(registry.active_language(), None);
        assert!(registry.available_languages().is_empty());
        assert_eq!(registry.t("hello", None), None);
    }
}
