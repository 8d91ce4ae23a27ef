//! Output module for reporting harvest results
//!
//! This module handles:
//! - Printing crawl and reconciliation summaries
//! - Printing search results
//! - Catalog statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, CatalogStatistics};

use crate::crawler::HarvestSummary;
use crate::extract::SearchHit;
use crate::reconcile::ReconcileReport;

/// Prints a reconciliation report, listing each rejection
pub fn print_reconcile_report(report: &ReconcileReport) {
    println!("{}", report);
    for rejection in &report.rejected {
        println!(
            "  - {} {} ({}): {}",
            report.entity, rejection.identity, rejection.kind, rejection.reason
        );
    }
}

/// Prints the result of a diagrams harvest
pub fn print_harvest_summary(summary: &HarvestSummary) {
    let outcome = &summary.outcome;

    println!("=== Harvest Summary ===\n");
    println!("Groups crawled: {}", outcome.succeeded.len());
    println!("Groups failed: {}", outcome.failed.len());
    if outcome.malformed > 0 {
        println!("Malformed panels/rows skipped: {}", outcome.malformed);
    }
    if outcome.cancelled {
        println!("Crawl was cancelled before completion");
    }
    println!();

    if !outcome.failed.is_empty() {
        println!("Failed groups:");
        for failure in &outcome.failed {
            println!("  - {} ({}): {}", failure.group_id, failure.name, failure.reason);
        }
        println!();
    }

    print_reconcile_report(&summary.diagrams);
    print_reconcile_report(&summary.parts);
}

/// Prints part search results as a table
pub fn print_search_hits(term: &str, hits: &[SearchHit]) {
    println!("=== Search: {} ({} results) ===\n", term, hits.len());
    for hit in hits {
        println!(
            "{:<20} {:<40} avail: {:<4} weight: {:<8} price: {}",
            hit.part_number, hit.name, hit.available, hit.weight_kg, hit.price_usd
        );
    }
}
