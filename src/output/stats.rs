//! Catalog statistics
//!
//! Derived figures over the stored catalog, printed by `--stats`.

use crate::storage::{CatalogCounts, CatalogStore};
use crate::HarvestError;

/// Statistics about the stored catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStatistics {
    pub counts: CatalogCounts,

    /// Groups that are category headers only
    pub header_groups: usize,

    /// Share of groups with diagrams whose page is cached (percent)
    pub cache_coverage: f64,

    /// Mean number of parts per diagram
    pub parts_per_diagram: f64,
}

impl CatalogStatistics {
    pub fn from_counts(counts: CatalogCounts) -> Self {
        let cache_coverage = percentage(counts.cached_pages, counts.groups_with_diagrams);
        let parts_per_diagram = if counts.diagrams > 0 {
            counts.parts as f64 / counts.diagrams as f64
        } else {
            0.0
        };

        Self {
            header_groups: counts.groups.saturating_sub(counts.groups_with_diagrams),
            cache_coverage,
            parts_per_diagram,
            counts,
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CatalogStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to load statistics
pub fn load_statistics(storage: &dyn CatalogStore) -> Result<CatalogStatistics, HarvestError> {
    Ok(CatalogStatistics::from_counts(storage.counts()?))
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Groups:");
    println!("  Total: {}", stats.counts.groups);
    println!(
        "  With diagrams: {} ({:.1}%)",
        stats.counts.groups_with_diagrams,
        percentage(stats.counts.groups_with_diagrams, stats.counts.groups)
    );
    println!("  Category headers: {}", stats.header_groups);
    println!();

    println!("Diagrams: {}", stats.counts.diagrams);
    println!(
        "Parts: {} ({:.1} per diagram)",
        stats.counts.parts, stats.parts_per_diagram
    );
    println!();

    println!(
        "Page cache: {} pages ({:.1}% of groups with diagrams)",
        stats.counts.cached_pages, stats.cache_coverage
    );
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}
