//! Group listing extraction
//!
//! The group listing is a single tree-grid table. Each data row carries its
//! identity and parent as class tokens (`treegrid-551`,
//! `treegrid-parent-500`), and groups that have diagrams link to them.

use crate::extract::{cell_text, parse_selector};
use crate::model::Group;
use crate::query::{decode_query, QueryCodec};
use crate::ExtractError;
use scraper::{ElementRef, Html};

const ID_PREFIX: &str = "treegrid-";
const PARENT_PREFIX: &str = "treegrid-parent-";

/// Result of extracting one listing page
#[derive(Debug, Clone, Default)]
pub struct GroupListing {
    /// Groups in listing order
    pub groups: Vec<Group>,

    /// Data rows that were skipped as invalid
    pub skipped_rows: usize,
}

/// Extracts the flat group list from a rendered listing page
///
/// # Arguments
///
/// * `html` - The rendered listing page
/// * `codec` - Codec used to resolve and decode diagram links
///
/// # Returns
///
/// * `Ok(GroupListing)` - The groups found, with invalid rows skipped
/// * `Err(ExtractError::MalformedListing)` - No listing table on the page
pub fn extract_groups(html: &str, codec: &QueryCodec) -> Result<GroupListing, ExtractError> {
    let table_selector = parse_selector("table.tree")?;
    let row_selector = parse_selector("tr")?;
    let cell_selector = parse_selector("td")?;
    let link_selector = parse_selector("a[href]")?;

    let document = Html::parse_document(html);
    let table = document.select(&table_selector).next().ok_or_else(|| {
        ExtractError::MalformedListing("group listing table not found".to_string())
    })?;

    let mut listing = GroupListing::default();

    for (index, row) in table.select(&row_selector).enumerate() {
        if row.select(&cell_selector).next().is_none() {
            // header row
            continue;
        }

        let Some((id, parent_group_id)) = row_identity(&row) else {
            tracing::warn!("Skipping listing row #{}: no valid treegrid token", index);
            listing.skipped_rows += 1;
            continue;
        };

        let diagrams_url = row
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| diagrams_link(href, codec, id));

        listing.groups.push(Group {
            id,
            name: cell_text(&row),
            diagrams_url,
            parent_group_id,
        });
    }

    tracing::debug!(
        "Extracted {} groups ({} rows skipped)",
        listing.groups.len(),
        listing.skipped_rows
    );

    Ok(listing)
}

/// Reads `(id, parent_id)` from a row's class tokens
///
/// Returns `None` if the row has no identity token or a token does not
/// carry an integer.
fn row_identity(row: &ElementRef<'_>) -> Option<(i64, Option<i64>)> {
    let mut id = None;
    let mut parent = None;

    for token in row.value().classes() {
        if let Some(raw) = token.strip_prefix(PARENT_PREFIX) {
            parent = Some(raw.trim().parse::<i64>().ok()?);
        } else if let Some(raw) = token.strip_prefix(ID_PREFIX) {
            if id.is_none() {
                id = Some(raw.trim().parse::<i64>().ok()?);
            }
        }
    }

    id.map(|id| (id, parent))
}

/// Resolves a row link to an absolute diagrams URL
///
/// Any resolvable link is kept. Missing session fields are filled from the
/// configured session at crawl time, and a link without `gid` fails that
/// group's crawl rather than hiding it here.
fn diagrams_link(href: &str, codec: &QueryCodec, group_id: i64) -> Option<String> {
    let url = match codec.resolve(href) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Group {}: ignoring unusable link: {}", group_id, e);
            return None;
        }
    };

    let params = decode_query(&url);
    if params.session().is_none() {
        tracing::debug!("Group {}: link {} carries no session", group_id, url);
    }
    if params.gid.as_deref().map_or(true, str::is_empty) {
        tracing::warn!("Group {}: link {} has no gid", group_id, url);
    }

    Some(url.to_string())
}
