//! Record types for groups, diagrams and parts

use std::fmt;

/// Opaque session capability issued by the upstream site
///
/// The `ssd` token is never parsed or altered; it is only threaded through
/// the query codec together with the vehicle code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionDescriptor {
    car: String,
    ssd: String,
}

impl SessionDescriptor {
    /// Creates a descriptor from a vehicle code and session token
    pub fn new(car: impl Into<String>, ssd: impl Into<String>) -> Self {
        Self {
            car: car.into(),
            ssd: ssd.into(),
        }
    }

    /// The vehicle code (`c` on the wire)
    pub fn car(&self) -> &str {
        &self.car
    }

    /// The opaque session token
    pub fn ssd(&self) -> &str {
        &self.ssd
    }
}

/// A node in the upstream category hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Upstream-assigned identity, never generated locally
    pub id: i64,

    /// Display name
    pub name: String,

    /// Absolute diagrams page URL; `None` for pure category headers
    pub diagrams_url: Option<String>,

    /// Parent group, `None` for roots
    pub parent_group_id: Option<i64>,
}

impl Group {
    /// Returns true if this group has a scrapeable diagrams page
    pub fn has_diagrams(&self) -> bool {
        self.diagrams_url.is_some()
    }

    /// Returns true if this group has no parent
    pub fn is_root(&self) -> bool {
        self.parent_group_id.is_none()
    }
}

/// Compound identity of a diagram: owning group plus panel position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiagramKey {
    pub group_id: i64,
    pub ordinal: u32,
}

impl DiagramKey {
    pub fn new(group_id: i64, ordinal: u32) -> Self {
        Self { group_id, ordinal }
    }

    /// Computes the concatenated integer id used by the legacy API
    ///
    /// `group_id * 10^k + ordinal`, where `k` is the digit count of the
    /// largest ordinal on the page (at least one). A page with up to ten
    /// panels yields `420, 421, ...` for group 42.
    ///
    /// Returns `None` if the result does not fit in an `i64`.
    pub fn legacy_id(&self, panel_count: usize) -> Option<i64> {
        let largest = panel_count.saturating_sub(1).max(self.ordinal as usize);
        let digits = largest.max(1).ilog10() + 1;
        self.group_id
            .checked_mul(10_i64.checked_pow(digits)?)?
            .checked_add(i64::from(self.ordinal))
    }
}

impl fmt::Display for DiagramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.group_id, self.ordinal)
    }
}

/// An illustrated parts panel belonging to one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    /// Compound storage identity
    pub key: DiagramKey,

    /// Concatenated legacy id (see [`DiagramKey::legacy_id`])
    pub id: i64,

    /// Panel title
    pub name: String,

    /// Absolute image URL
    pub img_url: Option<String>,
}

impl Diagram {
    /// The owning group
    pub fn parent_group_id(&self) -> i64 {
        self.key.group_id
    }
}

/// A single catalog line item belonging to one diagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Assigned by storage on first insert
    pub id: Option<i64>,

    /// Owning diagram
    pub diagram: DiagramKey,

    /// Legacy id of the owning diagram
    pub parent_diagram_id: i64,

    /// Manufacturer part number
    pub number: String,

    pub name: String,

    /// Free text, may be empty
    pub note: String,

    /// Free text, may be empty
    pub date_range: String,

    /// `None` when not applicable or when the quantity varies
    pub amount: Option<u32>,
}
