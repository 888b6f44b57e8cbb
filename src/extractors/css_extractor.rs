//! CSS selector-based extraction
//!
//! Uses the scraper crate to select elements by CSS selectors. Every helper is
//! scoped to an element so the same selector can be applied per listing block.

use scraper::{ElementRef, Selector};

/// Visible text of an element, whitespace-collapsed
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract text content from every element matching `selector` under `scope`
pub fn extract_css_text(scope: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    scope.select(selector).map(element_text).collect()
}

/// Extract first matching element's text, `None` if absent or blank
pub fn extract_css_first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Extract first matching element's attribute
pub fn extract_css_first_attr(
    scope: ElementRef<'_>,
    selector: &Selector,
    attr_name: &str,
) -> Option<String> {
    scope
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr_name).map(String::from))
        .filter(|v| !v.trim().is_empty())
}
