//! Core localization engine: date pattern formatting and parsing, printf
//! style value formatting, and the two-pass template processor used for
//! localized strings.
//!
//! This crate carries no language registry of its own. Callers supply a
//! [`CultureData`] for calendar names and implement [`TranslationBackend`]
//! for key resolution; the `lingora-runtime` crate does both on top of its
//! language trees.

#![forbid(unsafe_code)]

mod culture;
mod date_format;
mod date_parse;
mod error;
mod numstr;
mod printf;
mod template;

pub use culture::CultureData;
pub use date_format::{DateInput, format_date};
pub use date_parse::{DateParser, ParserCache, parse_date};
pub use error::{FormatError, FormatResult};
pub use numstr::{display_string, number_to_string, parse_float_prefix};
pub use printf::{DEFAULT_DECIMAL_SEPARATOR, apply_specifiers, default_thousands_separator};
pub use template::{LocaleSeparators, TranslationBackend, process_localized_string};
