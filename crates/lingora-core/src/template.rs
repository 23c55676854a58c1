//! Localized string post-processing.
//!
//! Runs two passes over a resolved string. Pass 1 substitutes placeholders:
//! `{key.path}` resolves through the translation backend (with an optional
//! gender selector and filter chain), `{{key.path}}` resolves against the
//! call's data object. Pass 2 substitutes embedded `t("key.path")` calls,
//! whose options argument must be valid JSON. Backslashes escape braces;
//! every pair of backslashes collapses to one.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::numstr::display_string;
use crate::printf::apply_specifiers;

/// Decimal and thousands separators of the active locale, consulted by the
/// `printf` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSeparators {
    pub decimal: String,
    pub thousands: String,
}

impl Default for LocaleSeparators {
    fn default() -> Self {
        Self {
            decimal: String::from("."),
            thousands: String::from(","),
        }
    }
}

/// Resolves translation keys for the template passes. The runtime registry
/// implements this over its language trees.
pub trait TranslationBackend {
    /// Looks up a translation by dotted key path. `options` carries the
    /// substitution data of the enclosing call, used for plural selection.
    fn lookup(&self, key: &str, options: Option<&Value>) -> Option<Value>;

    fn separators(&self) -> LocaleSeparators;
}

/// Runs both substitution passes over `value`. Non-string values pass
/// through untouched.
pub fn process_localized_string(
    value: &Value,
    data: Option<&Value>,
    backend: &dyn TranslationBackend,
) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };

    let first_pass = placeholder_regex().replace_all(text, |caps: &Captures| {
        render_placeholder(caps, data, backend)
    });
    let second_pass = call_regex().replace_all(&first_pass, |caps: &Captures| {
        render_translation_call(caps, backend)
    });

    Value::String(second_pass.into_owned())
}

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(\\*)(\{{1,2})([^|{}]+)((?:\|[^|{}]+)*?)(\}{1,2})")
            .expect("placeholder regex compiles")
    })
}

fn call_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"t\(("[^"]+?"|'[^']+?'|[^,)]+?)(?:,\s*(\{.*?\}))?\)"#)
            .expect("translation call regex compiles")
    })
}

fn render_placeholder(
    caps: &Captures<'_>,
    data: Option<&Value>,
    backend: &dyn TranslationBackend,
) -> String {
    let backslashes = &caps[1];
    let opens = &caps[2];
    let key = &caps[3];
    let filters_text = &caps[4];
    let closes = &caps[5];

    // An odd number of leading backslashes escapes the placeholder itself:
    // halve the backslashes and emit the braces as plain text.
    if backslashes.len() % 2 == 1 {
        let keep = backslashes.len() - (backslashes.len() - 1) / 2;
        return String::from(&caps[0][keep..]);
    }

    // More opening than closing braces never substitutes.
    if opens.len() > closes.len() {
        return String::from(&caps[0]);
    }

    let filters: Vec<&str> = if filters_text.is_empty() {
        Vec::new()
    } else {
        let mut parts: Vec<&str> = filters_text.split('|').collect();
        while parts.first() == Some(&"") {
            parts.remove(0);
        }
        parts
    };

    let mut value = if opens.len() == 1 {
        resolve_translation(key, &filters, data, backend)
    } else {
        resolve_data_path(key, data)
    };

    for filter in &filters {
        if filter.is_empty() {
            continue;
        }
        value = apply_filter(value, filter, backend);
    }

    let mut rendered = String::new();
    if !backslashes.is_empty() {
        rendered.push_str(&backslashes[backslashes.len() / 2..]);
    }
    rendered.push_str(&display_string(&value));
    if closes.len() > opens.len() {
        rendered.push_str(&closes[opens.len()..]);
    }
    rendered
}

/// Single-brace resolution. A leading `g:path` filter selects a gendered
/// variant: the gender value itself is a translation lookup, `male` and
/// `female` shorten to the `m`/`f` subkeys, and misses walk the fallback
/// chain `.neutral`, `.`, `.m`, `.f`.
fn resolve_translation(
    key: &str,
    filters: &[&str],
    data: Option<&Value>,
    backend: &dyn TranslationBackend,
) -> Value {
    let gender_filter = filters.first().and_then(|filter| filter.strip_prefix("g:"));

    let Some(gender_key) = gender_filter else {
        return backend.lookup(key, data).unwrap_or(Value::Null);
    };

    let gender = backend.lookup(gender_key, None).map(|value| {
        let tag = display_string(&value);
        match tag.as_str() {
            "male" => String::from("m"),
            "female" => String::from("f"),
            _ => tag,
        }
    });

    let mut resolved = None;
    if let Some(tag) = &gender {
        resolved = backend.lookup(&format!("{key}.{tag}"), None);
    }
    for suffix in ["neutral", "", "m", "f"] {
        if resolved.is_some() {
            break;
        }
        resolved = backend.lookup(&format!("{key}.{suffix}"), None);
    }
    resolved.unwrap_or(Value::Null)
}

/// Double-brace resolution: walk the data object by dotted path, indexing
/// arrays numerically. The walk stops early on a falsy value, and a null
/// result renders as the empty string.
fn resolve_data_path(key: &str, data: Option<&Value>) -> Value {
    let mut current = match data {
        Some(value) => value.clone(),
        None => Value::Null,
    };
    for segment in key.split('.') {
        if is_falsy(&current) {
            break;
        }
        current = match &current {
            Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    if current.is_null() {
        Value::String(String::new())
    } else {
        current
    }
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

fn apply_filter(value: Value, filter: &str, backend: &dyn TranslationBackend) -> Value {
    match filter {
        "html" => Value::String(escape_html(&display_string(&value))),
        "htmll" => Value::String(escape_html(&display_string(&value)).replace('\n', "<br />")),
        "json" => Value::String(serde_json::to_string(&value).unwrap_or_default()),
        "url" => Value::String(encode_uri_component(&display_string(&value))),
        "lower" => Value::String(display_string(&value).to_lowercase()),
        "upper" => Value::String(display_string(&value).to_uppercase()),
        "upperfirst" => {
            let text = display_string(&value);
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => Value::String(format!(
                    "{}{}",
                    first.to_uppercase(),
                    chars.as_str().to_lowercase()
                )),
                None => Value::String(text),
            }
        }
        _ => match filter.strip_prefix("printf ") {
            Some(specifiers) => {
                let separators = backend.separators();
                apply_specifiers(
                    &value,
                    specifiers,
                    Some(&separators.decimal),
                    Some(&separators.thousands),
                )
            }
            None => value,
        },
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}

/// Percent-encodes everything outside the unreserved set, UTF-8 bytes in
/// uppercase hex.
fn encode_uri_component(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut buffer = [0u8; 4];
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric()
            || matches!(ch, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
        {
            output.push(ch);
        } else {
            for byte in ch.encode_utf8(&mut buffer).bytes() {
                output.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    output
}

fn render_translation_call(caps: &Captures<'_>, backend: &dyn TranslationBackend) -> String {
    let key_text = &caps[1];
    let Ok(Value::String(key)) = serde_json::from_str::<Value>(key_text) else {
        return String::from(&caps[0]);
    };
    let options: Option<Value> = caps
        .get(2)
        .and_then(|matched| serde_json::from_str(matched.as_str()).ok());
    let resolved = backend.lookup(&key, options.as_ref()).unwrap_or(Value::Null);
    display_string(&resolved)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::{LocaleSeparators, TranslationBackend, process_localized_string};

    struct MapBackend {
        tree: Value,
        separators: LocaleSeparators,
    }

    impl MapBackend {
        fn new(tree: Value) -> Self {
            Self {
                tree,
                separators: LocaleSeparators::default(),
            }
        }
    }

    impl TranslationBackend for MapBackend {
        fn lookup(&self, key: &str, _options: Option<&Value>) -> Option<Value> {
            let mut current = &self.tree;
            for segment in key.split('.') {
                current = current.get(segment)?;
            }
            Some(current.clone())
        }

        fn separators(&self) -> LocaleSeparators {
            self.separators.clone()
        }
    }

    fn process(text: &str, data: Option<Value>, backend: &MapBackend) -> String {
        let output = process_localized_string(&json!(text), data.as_ref(), backend);
        match output {
            Value::String(text) => text,
            other => panic!("expected a string, got {other:?}"),
        }
    }

    #[test]
    fn non_string_values_pass_through() {
        let backend = MapBackend::new(json!({}));
        assert_eq!(
            process_localized_string(&json!(5), None, &backend),
            json!(5)
        );
        assert_eq!(
            process_localized_string(&json!(null), None, &backend),
            json!(null)
        );
    }

    #[test]
    fn single_brace_resolves_translation_keys() {
        let backend = MapBackend::new(json!({"name": {"first": "Ada"}}));
        assert_eq!(
            process("Hello {name.first}!", None, &backend),
            "Hello Ada!"
        );
    }

    #[test]
    fn double_brace_resolves_call_data() {
        let backend = MapBackend::new(json!({}));
        assert_eq!(
            process("{{count}} items", Some(json!({"count": 5})), &backend),
            "5 items"
        );
        assert_eq!(
            process(
                "{{list.1}} then {{nested.deep.value}}",
                Some(json!({"list": ["a", "b"], "nested": {"deep": {"value": "x"}}})),
                &backend
            ),
            "b then x"
        );
    }

    #[test]
    fn missing_lookups_render_empty() {
        let backend = MapBackend::new(json!({}));
        assert_eq!(process("[{missing}]", None, &backend), "[]");
        assert_eq!(process("[{{missing.path}}]", None, &backend), "[]");
    }

    #[test]
    fn filters_chain_left_to_right() {
        let backend = MapBackend::new(json!({"foo": "BAR"}));
        assert_eq!(process("{foo|lower}", None, &backend), "bar");
        assert_eq!(process("{foo|lower|json}", None, &backend), "\"bar\"");
        assert_eq!(process("{foo|unknown}", None, &backend), "BAR");
    }

    #[test]
    fn html_filters_escape_markup() {
        let backend = MapBackend::new(json!({}));
        let data = json!({"v": "<a> & 'b' \"c\"\nd"});
        assert_eq!(
            process("{{v|html}}", Some(data.clone()), &backend),
            "&lt;a&gt; &amp; &#39;b&#39; &quot;c&quot;\nd"
        );
        assert_eq!(
            process("{{v|htmll}}", Some(data), &backend),
            "&lt;a&gt; &amp; &#39;b&#39; &quot;c&quot;<br />d"
        );
    }

    #[test]
    fn url_filter_percent_encodes() {
        let backend = MapBackend::new(json!({}));
        assert_eq!(
            process("{{q|url}}", Some(json!({"q": "a b/ü!"})), &backend),
            "a%20b%2F%C3%BC!"
        );
    }

    #[test]
    fn case_filters() {
        let backend = MapBackend::new(json!({}));
        let data = json!({"v": "hELLO wORLD"});
        assert_eq!(
            process("{{v|upper}}", Some(data.clone()), &backend),
            "HELLO WORLD"
        );
        assert_eq!(
            process("{{v|upperfirst}}", Some(data), &backend),
            "Hello world"
        );
    }

    #[test]
    fn printf_filter_uses_the_backend_separators() {
        let backend = MapBackend::new(json!({}));
        assert_eq!(
            process("{{n|printf 08.2f}}", Some(json!({"n": 5})), &backend),
            "00005.00"
        );

        let mut localized = MapBackend::new(json!({}));
        localized.separators = LocaleSeparators {
            decimal: String::from(","),
            thousands: String::from("."),
        };
        assert_eq!(
            process("{{n|printf ,.2f}}", Some(json!({"n": 1234.5})), &localized),
            "1.234,50"
        );
    }

    #[test]
    fn backslashes_escape_placeholders() {
        let backend = MapBackend::new(json!({"name": {"first": "Ada"}}));
        assert_eq!(
            process(r"\{name.first}", None, &backend),
            "{name.first}"
        );
        assert_eq!(process(r"\\{name.first}", None, &backend), r"\Ada");
    }

    #[test]
    fn mismatched_braces() {
        let backend = MapBackend::new(json!({"foo": "x"}));
        // More opens than closes never substitutes.
        assert_eq!(process("{{foo}", None, &backend), "{{foo}");
        // Surplus closing braces trail the substituted value.
        assert_eq!(process("{foo}}", None, &backend), "x}");
    }

    #[test]
    fn gender_selector_picks_the_tagged_variant() {
        let backend = MapBackend::new(json!({
            "greeting": {"m": "Mr.", "f": "Ms.", "neutral": "Hi"},
            "profile": {"gender": "female"},
        }));
        assert_eq!(
            process("{greeting|g:profile.gender}", None, &backend),
            "Ms."
        );
    }

    #[test]
    fn gender_selector_falls_back_through_the_chain() {
        let backend = MapBackend::new(json!({
            "greeting": {"m": "Mr.", "neutral": "Hi"},
            "profile": {"gender": "female"},
        }));
        // No `f` variant, so the neutral one wins.
        assert_eq!(
            process("{greeting|g:profile.gender}", None, &backend),
            "Hi"
        );
        // Unknown gender key misses entirely, same chain.
        assert_eq!(process("{greeting|g:nope}", None, &backend), "Hi");
    }

    #[test]
    fn embedded_translation_calls_resolve() {
        let backend = MapBackend::new(json!({"msg": "Done"}));
        assert_eq!(process("Result: t(\"msg\")", None, &backend), "Result: Done");
    }

    #[test]
    fn embedded_calls_require_json_string_keys() {
        let backend = MapBackend::new(json!({"msg": "Done"}));
        assert_eq!(process("t('msg')", None, &backend), "t('msg')");
        assert_eq!(process("t(msg)", None, &backend), "t(msg)");
    }

    #[test]
    fn literal_call_options_read_as_placeholders() {
        // A literal `{...}` argument is consumed as a placeholder by the
        // first pass; the dangling call it leaves behind stays verbatim.
        let backend = MapBackend::new(json!({"msg": "Done"}));
        assert_eq!(
            process("Result: t(\"msg\", {\"count\": 2})", None, &backend),
            "Result: t(\"msg\", )"
        );
        assert_eq!(
            process("t(\"msg\", {not json})", None, &backend),
            "t(\"msg\", )"
        );
    }

    #[test]
    fn placeholders_feed_embedded_calls() {
        let backend = MapBackend::new(json!({"msg": "Done"}));
        assert_eq!(
            process(
                "t(\"msg\", {\"n\": {{n}}})",
                Some(json!({"n": 3})),
                &backend
            ),
            "Done"
        );
    }

    #[test]
    fn missing_embedded_call_renders_empty() {
        let backend = MapBackend::new(json!({}));
        assert_eq!(process("[t(\"missing\")]", None, &backend), "[]");
    }

    proptest! {
        #[test]
        fn plain_text_is_untouched(text in "[a-zA-Z0-9 .,:;!?-]*") {
            prop_assume!(!text.contains("t("));
            let backend = MapBackend::new(json!({}));
            prop_assert_eq!(process(&text, None, &backend), text);
        }

        #[test]
        fn processing_is_idempotent(
            name in "[a-z]{1,8}",
            value in "[A-Za-z0-9 ]{1,12}",
        ) {
            let backend = MapBackend::new(json!({}));
            let data = json!({ name.clone(): value });
            let template = Value::String(format!("Hello {{{{{name}}}}}!"));
            let once = process_localized_string(&template, Some(&data), &backend);
            let twice = process_localized_string(&once, Some(&data), &backend);
            prop_assert_eq!(twice, once);
        }
    }
}
