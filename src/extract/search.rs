//! Part search result extraction

use crate::extract::{cell_text, parse_selector};
use crate::query::QueryCodec;
use crate::ExtractError;
use scraper::{Html, Selector};
use serde::Serialize;

/// One result card from a part number search
///
/// Values are kept as the site prints them; availability and price vary in
/// format between regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub part_number: String,
    pub available: String,
    pub weight_kg: String,
    pub price_usd: String,
    pub img_url: Option<String>,
}

/// Extracts search result cards
///
/// Cards missing a name or part number are skipped with a warning; other
/// fields default to empty.
pub fn extract_search(html: &str, codec: &QueryCodec) -> Result<Vec<SearchHit>, ExtractError> {
    let card_selector = parse_selector("div.product-col.list")?;
    let name_selector = parse_selector("h1")?;
    let number_selector = parse_selector("h2")?;
    let stock_selector = parse_selector("p.mb-10px:not(.hidden-xs)")?;
    let weight_selector = parse_selector("p.hidden-xs.mb-10px")?;
    let price_selector = parse_selector("span.price-new")?;
    let image_selector = parse_selector("img[src]")?;

    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for (index, card) in document.select(&card_selector).enumerate() {
        let text_of = |selector: &Selector| card.select(selector).next().map(|el| cell_text(&el));

        let name = text_of(&name_selector).filter(|s| !s.is_empty());
        let part_number = text_of(&number_selector).map(|s| after_colon(&s));

        let (Some(name), Some(part_number)) = (name, part_number) else {
            tracing::warn!("Skipping search result #{}: missing name or number", index);
            continue;
        };

        // "In stock: 3" -> "3"
        let available = text_of(&stock_selector)
            .and_then(|s| s.chars().last())
            .filter(|c| !c.is_whitespace())
            .map(String::from)
            .unwrap_or_default();

        let weight_kg = text_of(&weight_selector)
            .map(|s| after_colon(&s))
            .unwrap_or_default();

        // drop the currency sign
        let price_usd = text_of(&price_selector)
            .map(|s| {
                let mut chars = s.chars();
                chars.next_back();
                chars.as_str().trim().to_string()
            })
            .unwrap_or_default();

        let img_url = card
            .select(&image_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| codec.resolve(src).ok())
            .map(|url| url.to_string());

        hits.push(SearchHit {
            name,
            part_number,
            available,
            weight_kg,
            price_usd,
            img_url,
        });
    }

    tracing::debug!("Extracted {} search results", hits.len());
    Ok(hits)
}

fn after_colon(text: &str) -> String {
    text.split_once(':')
        .map(|(_, value)| value)
        .unwrap_or(text)
        .trim()
        .to_string()
}
