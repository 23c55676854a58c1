//! Localized physical file sizes, using the `size_abbrs` subtree of the
//! active language for the unit names.

use serde_json::Value;

use lingora_core::display_string;

/// A file size scaled to a human unit, with the localized unit name.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalSize {
    pub size: f64,
    pub name: String,
}

/// Thresholds sit slightly below the next power of 1024 so values such as
/// 99 KiB still display in the smaller unit.
pub(crate) fn physical_size(bytes: f64, abbreviations: &Value) -> PhysicalSize {
    let (scaled, key) = if bytes < 100.0 {
        (bytes, "b")
    } else if bytes < 101_376.0 {
        (bytes / 1024.0, "kb")
    } else if bytes < 103_809_024.0 {
        (bytes / 1024.0 / 1024.0, "mb")
    } else if bytes < 106_300_440_576.0 {
        (bytes / 1024.0 / 1024.0 / 1024.0, "gb")
    } else {
        (bytes / 1024.0 / 1024.0 / 1024.0 / 1024.0, "tb")
    };

    let size = (scaled * 100.0).ceil() / 100.0;
    let name = abbreviations
        .get(key)
        .map(display_string)
        .unwrap_or_default();

    PhysicalSize { size, name }
}
