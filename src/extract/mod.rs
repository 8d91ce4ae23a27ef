//! Markup extraction for rendered catalog pages
//!
//! This module turns rendered HTML into typed records:
//! - Group listings into flat `Group` lists
//! - Group diagram pages into parallel `Diagram` and `Part` lists
//! - Part search results into `SearchHit`s
//!
//! Extraction is pure: it never touches the network or storage.

mod amount;
mod diagrams;
mod groups;
mod search;

pub use amount::normalize_amount;
pub use diagrams::{extract_diagrams, DiagramPage};
pub use groups::{extract_groups, GroupListing};
pub use search::{extract_search, SearchHit};

use crate::ExtractError;
use scraper::{ElementRef, Selector};

/// Parses a CSS selector, mapping failures into `ExtractError`
pub(crate) fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

/// Returns the element's text with runs of whitespace collapsed
pub(crate) fn cell_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_cell_text_collapses_whitespace() {
        let fragment = Html::parse_document(
            "<table><tr><td>\n  Oil   <b>Filter</b>\n</td></tr></table>",
        );
        let selector = parse_selector("td").unwrap();
        let cell = fragment.select(&selector).next().unwrap();
        assert_eq!(cell_text(&cell), "Oil Filter");
    }

    #[test]
    fn test_invalid_selector() {
        assert_eq!(
            parse_selector("div[").unwrap_err(),
            ExtractError::Selector("div[".to_string())
        );
    }
}
