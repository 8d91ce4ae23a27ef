//! Diagram and part extraction
//!
//! A group's diagrams page is a sequence of bootstrap panels. Each panel
//! holds one illustration, its title and a parts table with six columns:
//! number, name, part code, note, amount and date range.

use crate::extract::{cell_text, normalize_amount, parse_selector};
use crate::model::{Diagram, DiagramKey, Part};
use crate::query::QueryCodec;
use crate::ExtractError;
use scraper::{ElementRef, Html, Selector};

const PART_COLUMNS: usize = 6;

/// Records extracted from one diagrams page
#[derive(Debug, Clone, Default)]
pub struct DiagramPage {
    /// Diagrams in panel order
    pub diagrams: Vec<Diagram>,

    /// Parts of every diagram, each referencing its owner
    pub parts: Vec<Part>,

    /// Panels and rows that were skipped
    pub malformed: Vec<ExtractError>,
}

struct PanelSelectors {
    panel: Selector,
    title: Selector,
    image: Selector,
    table: Selector,
    row: Selector,
    cell: Selector,
}

impl PanelSelectors {
    fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            panel: parse_selector("div.panel.panel-default")?,
            title: parse_selector("h2")?,
            image: parse_selector("img[src]")?,
            table: parse_selector("table")?,
            row: parse_selector("tr")?,
            cell: parse_selector("td")?,
        })
    }
}

/// Extracts diagrams and parts from a rendered group page
///
/// Panel ordinals are zero-based positions among all panels on the page,
/// including malformed ones, so identities stay stable when a single
/// panel fails to parse.
///
/// # Arguments
///
/// * `html` - The rendered diagrams page
/// * `group_id` - The owning group
/// * `codec` - Codec used to resolve image URLs
///
/// # Returns
///
/// * `Ok(DiagramPage)` - Everything that could be extracted
/// * `Err(ExtractError)` - Only if a selector cannot be compiled
pub fn extract_diagrams(
    html: &str,
    group_id: i64,
    codec: &QueryCodec,
) -> Result<DiagramPage, ExtractError> {
    let selectors = PanelSelectors::new()?;
    let document = Html::parse_document(html);
    let panels: Vec<ElementRef<'_>> = document.select(&selectors.panel).collect();
    let panel_count = panels.len();

    let mut page = DiagramPage::default();

    for (index, panel) in panels.into_iter().enumerate() {
        let key = DiagramKey::new(group_id, index as u32);
        let Some(legacy_id) = key.legacy_id(panel_count) else {
            let err = ExtractError::MalformedPanel {
                index,
                reason: format!("legacy id of group {} overflows", group_id),
            };
            tracing::warn!("Group {}: {}", group_id, err);
            page.malformed.push(err);
            continue;
        };

        match extract_panel(&panel, index, key, legacy_id, &selectors, codec) {
            Ok((diagram, parts, bad_rows)) => {
                for err in &bad_rows {
                    tracing::warn!("Group {}: {}", group_id, err);
                }
                page.diagrams.push(diagram);
                page.parts.extend(parts);
                page.malformed.extend(bad_rows);
            }
            Err(err) => {
                tracing::warn!("Group {}: {}", group_id, err);
                page.malformed.push(err);
            }
        }
    }

    tracing::debug!(
        "Group {}: extracted {} diagrams, {} parts",
        group_id,
        page.diagrams.len(),
        page.parts.len()
    );

    Ok(page)
}

fn extract_panel(
    panel: &ElementRef<'_>,
    index: usize,
    key: DiagramKey,
    legacy_id: i64,
    selectors: &PanelSelectors,
    codec: &QueryCodec,
) -> Result<(Diagram, Vec<Part>, Vec<ExtractError>), ExtractError> {
    let malformed = |reason: &str| ExtractError::MalformedPanel {
        index,
        reason: reason.to_string(),
    };

    let name = panel
        .select(&selectors.title)
        .next()
        .map(|h2| cell_text(&h2))
        .filter(|title| !title.is_empty())
        .ok_or_else(|| malformed("missing title"))?;

    let table = panel
        .select(&selectors.table)
        .next()
        .ok_or_else(|| malformed("missing parts table"))?;

    let img_url = panel
        .select(&selectors.image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| match codec.resolve(src) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!("Diagram {}: unusable image source: {}", key, e);
                None
            }
        });

    let mut parts = Vec::new();
    let mut bad_rows = Vec::new();

    let rows = table
        .select(&selectors.row)
        .filter(|row| row.select(&selectors.cell).next().is_some());

    for (row_index, row) in rows.enumerate() {
        let cells: Vec<String> = row
            .select(&selectors.cell)
            .map(|cell| cell_text(&cell))
            .collect();

        match parse_part_row(&cells, key, legacy_id) {
            Ok(part) => parts.push(part),
            Err(reason) => bad_rows.push(ExtractError::MalformedRow {
                panel: index,
                row: row_index,
                reason,
            }),
        }
    }

    let diagram = Diagram {
        key,
        id: legacy_id,
        name,
        img_url,
    };

    Ok((diagram, parts, bad_rows))
}

/// Builds a part from the six ordered cells of a table row
///
/// The part code column is positional only and is not kept.
fn parse_part_row(cells: &[String], key: DiagramKey, legacy_id: i64) -> Result<Part, String> {
    let [number, name, _part_code, note, amount, date_range] = match cells.get(..PART_COLUMNS) {
        Some([a, b, c, d, e, f]) => [a, b, c, d, e, f],
        _ => {
            return Err(format!(
                "expected {} cells, found {}",
                PART_COLUMNS,
                cells.len()
            ))
        }
    };

    if number.is_empty() {
        return Err("empty part number".to_string());
    }

    Ok(Part {
        id: None,
        diagram: key,
        parent_diagram_id: legacy_id,
        number: number.clone(),
        name: name.clone(),
        note: note.clone(),
        date_range: date_range.clone(),
        amount: normalize_amount(amount)?,
    })
}
