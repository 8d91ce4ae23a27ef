/// Upstream catalog endpoints and their required parameters
use std::fmt;

/// Pages of the upstream catalog that the harvester requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Vehicle landing page
    Vehicle,
    /// Group listing (the tree of categories)
    Groups,
    /// Diagram panels of one group
    GroupDiagrams,
    /// A single diagram unit
    Unit,
    /// Free-text part search
    Search,
}

impl Endpoint {
    /// Path component on the upstream host
    pub fn path(&self) -> &'static str {
        match self {
            Self::Vehicle => "/en/catalog/genuine/vehicle/",
            Self::Groups => "/en/catalog/genuine/groups/",
            Self::GroupDiagrams => "/en/catalog/genuine/parts",
            Self::Unit => "/en/catalog/genuine/unit/",
            Self::Search => "/en/search/all/",
        }
    }

    /// Parameters that must be present and non-empty
    pub fn required(&self) -> &'static [&'static str] {
        match self {
            Self::Vehicle | Self::Groups => &["car", "ssd"],
            Self::GroupDiagrams => &["car", "ssd", "gid"],
            Self::Unit => &["car", "ssd", "uid"],
            Self::Search => &["q"],
        }
    }

    /// Short name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Groups => "groups",
            Self::GroupDiagrams => "group-diagrams",
            Self::Unit => "unit",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
