/// Named query parameters understood by the upstream catalog
use crate::model::SessionDescriptor;

/// Canonical parameter order on the wire
///
/// Each entry maps the logical name to its wire key. Encoding always walks
/// this table, so the same parameters produce the same query string.
pub(crate) const CANONICAL_ORDER: [(&str, &str); 8] = [
    ("car", "c"),
    ("ssd", "ssd"),
    ("vid", "vid"),
    ("cid", "cid"),
    ("cname", "cname"),
    ("gid", "gid"),
    ("uid", "uid"),
    ("q", "q"),
];

/// Query parameters for one upstream request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub car: Option<String>,
    pub ssd: Option<String>,
    pub vid: Option<String>,
    pub cid: Option<String>,
    pub cname: Option<String>,
    pub gid: Option<String>,
    pub uid: Option<String>,
    pub q: Option<String>,
}

impl QueryParams {
    /// Parameters carried by every catalog page in a session
    ///
    /// Sets `car` and `ssd` from the descriptor plus the `vid=0` and empty
    /// `q` defaults the site expects on catalog pages.
    pub fn for_session(session: &SessionDescriptor) -> Self {
        Self {
            car: Some(session.car().to_string()),
            ssd: Some(session.ssd().to_string()),
            vid: Some("0".to_string()),
            q: Some(String::new()),
            ..Self::default()
        }
    }

    /// Parameters for a free-text search
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            q: Some(term.into()),
            ..Self::default()
        }
    }

    pub fn with_gid(mut self, gid: impl Into<String>) -> Self {
        self.gid = Some(gid.into());
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// Returns a parameter by its logical name
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "car" => &self.car,
            "ssd" => &self.ssd,
            "vid" => &self.vid,
            "cid" => &self.cid,
            "cname" => &self.cname,
            "gid" => &self.gid,
            "uid" => &self.uid,
            "q" => &self.q,
            _ => return None,
        };
        value.as_deref()
    }

    /// Sets a parameter by wire key or logical name
    ///
    /// Returns false for keys the catalog does not use.
    pub(crate) fn set(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "c" | "car" => &mut self.car,
            "ssd" => &mut self.ssd,
            "vid" => &mut self.vid,
            "cid" => &mut self.cid,
            "cname" => &mut self.cname,
            "gid" => &mut self.gid,
            "uid" => &mut self.uid,
            "q" => &mut self.q,
            _ => return false,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
        true
    }

    /// The session descriptor, if both `car` and `ssd` are present
    pub fn session(&self) -> Option<SessionDescriptor> {
        match (self.car.as_deref(), self.ssd.as_deref()) {
            (Some(car), Some(ssd)) if !car.is_empty() && !ssd.is_empty() => {
                Some(SessionDescriptor::new(car, ssd))
            }
            _ => None,
        }
    }

    /// Present parameters as `(wire key, value)` in canonical order
    pub fn wire_pairs(&self) -> Vec<(&'static str, &str)> {
        CANONICAL_ORDER
            .iter()
            .filter_map(|(name, key)| self.get(name).map(|value| (*key, value)))
            .collect()
    }
}
