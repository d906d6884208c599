//! CSS text serialization
//!
//! Styles reach the page as a single `cssText` assignment, which replaces
//! whatever inline style the element had.

use crate::config::{css_property_name, CssMap};

/// Serialize a property map to `prop: value; prop: value`
///
/// Entries with an empty value are dropped. A trailing `;` is dropped so the
/// joined text has no empty declarations; semicolons inside a value, such as
/// in a `data:` URL, are kept.
pub fn css_text(map: &CssMap) -> String {
    map.iter()
        .filter_map(|(name, value)| {
            let value = value
                .trim()
                .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
            if value.is_empty() {
                None
            } else {
                Some(format!("{}: {}", css_property_name(name), value))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
