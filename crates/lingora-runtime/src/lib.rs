//! Language registry and localized formatting on top of `lingora-core`.
//!
//! Register language trees as JSON values, pick an active language (with
//! lenient code resolution and an optional fallback language), and resolve
//! translations with plural forms, gender variants and template
//! substitution. Number and date helpers format through the separators and
//! calendar of the active language.

#![forbid(unsafe_code)]

mod error;
mod filesize;
mod numbers;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use filesize::PhysicalSize;
pub use registry::{LanguageOptions, PluralFn, Registry};
