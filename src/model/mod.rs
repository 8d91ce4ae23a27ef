//! Catalog data model
//!
//! This module defines the typed records produced by extraction and consumed
//! by reconciliation.
//!
//! # Components
//!
//! - `Group`: a node of the upstream category hierarchy
//! - `Diagram`: an illustrated parts panel owned by one group
//! - `Part`: a single catalog line owned by one diagram
//! - `SessionDescriptor`: the opaque per-session capability (`car` + `ssd`)
//! - `GroupForest`: an arena view of the group hierarchy

mod forest;
mod records;

// Re-export main types
pub use forest::{find_cycles, GroupForest};
pub use records::{Diagram, DiagramKey, Group, Part, SessionDescriptor};
