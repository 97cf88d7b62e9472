//! Form-structure parsing and change detection.

use std::collections::BTreeMap;

use scraper::Html;

use crate::health::record::FormStructure;
use crate::utils::parse_selector_with_fallback;

/// Parses the page's form structure for change detection.
///
/// Captures the element inventory that matters to automation: form count,
/// methods, actions, and the names of input-like elements, plus whether each
/// mapped selector currently resolves.
pub fn parse_form_structure(
    html: &str,
    field_mapping: &BTreeMap<String, String>,
    context: &str,
) -> FormStructure {
    let document = Html::parse_document(html);

    let form_selector = parse_selector_with_fallback("form", context);
    let input_selector = parse_selector_with_fallback("input, select, textarea", context);

    let mut methods = Vec::new();
    let mut actions = Vec::new();
    let mut form_count = 0;
    for form in document.select(&form_selector) {
        form_count += 1;
        methods.push(
            form.value()
                .attr("method")
                .unwrap_or("get")
                .to_lowercase(),
        );
        actions.push(form.value().attr("action").unwrap_or_default().to_string());
    }

    let mut field_names: Vec<String> = document
        .select(&input_selector)
        .filter_map(|el| {
            el.value()
                .attr("name")
                .or_else(|| el.value().attr("id"))
                .map(str::to_string)
        })
        .collect();
    field_names.sort();
    field_names.dedup();

    let mapped_present = field_mapping
        .iter()
        .map(|(field, locator)| {
            let selector = parse_selector_with_fallback(locator, context);
            (field.clone(), document.select(&selector).next().is_some())
        })
        .collect();

    FormStructure {
        form_count,
        methods,
        actions,
        field_names,
        mapped_present,
    }
}

/// Describes the differences between two structures, one line per change.
///
/// Empty when the structures match. The descriptions go into the change
/// alert's message so an operator can triage without re-fetching the page.
pub fn describe_changes(old: &FormStructure, new: &FormStructure) -> Vec<String> {
    let mut changes = Vec::new();

    if old.form_count != new.form_count {
        changes.push(format!(
            "form count changed: {} -> {}",
            old.form_count, new.form_count
        ));
    }
    if old.methods != new.methods {
        changes.push(format!(
            "form methods changed: {:?} -> {:?}",
            old.methods, new.methods
        ));
    }
    if old.actions != new.actions {
        changes.push(format!(
            "form actions changed: {:?} -> {:?}",
            old.actions, new.actions
        ));
    }

    for name in &old.field_names {
        if !new.field_names.contains(name) {
            changes.push(format!("field removed: {name}"));
        }
    }
    for name in &new.field_names {
        if !old.field_names.contains(name) {
            changes.push(format!("field added: {name}"));
        }
    }

    for (field, was_present) in &old.mapped_present {
        let is_present = new.mapped_present.get(field).copied().unwrap_or(false);
        if *was_present && !is_present {
            changes.push(format!("mapped selector no longer resolves: {field}"));
        } else if !*was_present && is_present {
            changes.push(format!("mapped selector now resolves: {field}"));
        }
    }

    changes
}
