//! Anchor extraction from static HTML
//!
//! Mirrors what a browser reports as `a.href` for every anchor: the href
//! resolved against the document URL, in document order. Nothing is filtered
//! or deduplicated; hrefs that cannot be resolved are kept verbatim.

use scraper::{Html, Selector};
use url::Url;

/// Extracts up to `limit` anchor targets from `html`, in document order
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The document URL used to resolve relative hrefs
/// * `limit` - Maximum number of targets returned
///
/// # Example
///
/// ```
/// use snapcrawl::session::extract_anchor_targets;
/// use url::Url;
///
/// let html = r#"<a href="/a">A</a><a href="mailto:x@example.com">Mail</a>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let links = extract_anchor_targets(html, &base, 10);
/// assert_eq!(links, vec!["https://example.com/a", "mailto:x@example.com"]);
/// ```
pub fn extract_anchor_targets(html: &str, base_url: &Url, limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| resolve_href(href, base_url))
        .take(limit)
        .collect()
}

/// Resolves an href against the document URL, falling back to the raw value
fn resolve_href(href: &str, base_url: &Url) -> String {
    let href = href.trim();
    match base_url.join(href) {
        Ok(absolute) => absolute.to_string(),
        Err(_) => href.to_string(),
    }
}
