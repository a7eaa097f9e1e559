//! CSRF token lookup in the landing page `<head>`.

use scraper::{Html, Selector};

const CSRF_META_SELECTOR: &str = r#"meta[name="csrf-token"]"#;

/// Return the `content` of the first `<meta name="csrf-token">` element.
///
/// `None` when the element or its `content` attribute is missing. Malformed
/// markup is recovered by the HTML parser, never an error.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse(CSRF_META_SELECTOR).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.to_string())
}
