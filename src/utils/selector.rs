//! CSS selector parsing utilities.

use scraper::Selector;

/// Parses a CSS selector with a safe fallback.
///
/// Catalog field mappings are operator-maintained data, so a malformed
/// locator must not panic the engine. If parsing fails, logs an error and
/// returns a selector that matches nothing (`*:not(*)`), which downstream
/// code observes as "selector resolves to zero elements".
///
/// # Arguments
///
/// * `selector_str` - The CSS selector string to parse
/// * `context` - Context description for error logging (e.g., a directory id)
pub fn parse_selector_with_fallback(selector_str: &str, context: &str) -> Selector {
    Selector::parse(selector_str).unwrap_or_else(|e| {
        log::error!(
            "Failed to parse CSS selector '{}' in {}: {}. Using fallback selector.",
            selector_str,
            context,
            e
        );
        Selector::parse("*:not(*)").expect(
            "Fallback selector '*:not(*)' should always parse - this is a programming error",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_valid_selector_parses() {
        let selector = parse_selector_with_fallback("#biz-name", "test");
        let html = Html::parse_document("<input id='biz-name'>");
        assert_eq!(html.select(&selector).count(), 1);
    }

    #[test]
    fn test_invalid_selector_falls_back_to_match_nothing() {
        let selector = parse_selector_with_fallback("[[[not-a-selector", "test");
        let html = Html::parse_document("<div><input id='biz-name'></div>");
        assert_eq!(html.select(&selector).count(), 0);
    }
}
