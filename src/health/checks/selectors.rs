//! Selector validity sub-check.

use std::collections::BTreeMap;

use scraper::Html;

use crate::utils::parse_selector_with_fallback;

/// Resolves every mapped locator against the fetched document.
///
/// A locator is valid only when it resolves to exactly one element: zero
/// matches means the field is gone, more than one means the locator is
/// ambiguous and the fill operation could write into the wrong element.
pub fn check_selectors(
    html: &str,
    field_mapping: &BTreeMap<String, String>,
    context: &str,
) -> BTreeMap<String, bool> {
    let document = Html::parse_document(html);
    field_mapping
        .iter()
        .map(|(field, locator)| {
            let selector = parse_selector_with_fallback(locator, context);
            let matches = document.select(&selector).take(2).count();
            (field.clone(), matches == 1)
        })
        .collect()
}
