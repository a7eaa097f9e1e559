//! Price text extraction from a listing page.
//!
//! The site renders the headline price in the first `h4` on the page. No
//! structural check is made beyond that; the text is returned as found.

use scraper::{Html, Selector};

const PRICE_SELECTOR: &str = "h4";

/// Return the text of the first `h4` in document order.
///
/// Each text node, nested ones included, is trimmed on its own and the
/// pieces are joined with no separator. `None` when the page has no `h4`.
pub fn extract_price(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse(PRICE_SELECTOR).ok()?;
    let el = document.select(&sel).next()?;
    Some(el.text().map(str::trim).collect())
}
