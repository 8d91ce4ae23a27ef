//! Query codec for the upstream catalog
//!
//! Every upstream page is addressed by an endpoint path plus a set of named
//! parameters. This module builds those URLs in a stable order and decodes
//! links found in rendered pages back into parameters.

mod endpoint;
mod params;

use crate::{QueryError, QueryResult};
use url::Url;

// Re-export main types
pub use endpoint::Endpoint;
pub use params::QueryParams;

/// Default upstream host
pub const DEFAULT_BASE_URL: &str = "https://partsouq.com";

/// Builds and decodes upstream query URLs
#[derive(Debug, Clone)]
pub struct QueryCodec {
    base: Url,
}

impl QueryCodec {
    /// Creates a codec rooted at the given base URL
    ///
    /// # Arguments
    ///
    /// * `base_url` - Scheme and host of the upstream site
    ///
    /// # Returns
    ///
    /// * `Ok(QueryCodec)` - The base URL parsed
    /// * `Err(QueryError)` - The base URL is not an absolute http(s) URL
    pub fn new(base_url: &str) -> QueryResult<Self> {
        let base =
            Url::parse(base_url).map_err(|e| QueryError::Malformed(format!("{}: {}", base_url, e)))?;

        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(QueryError::Malformed(base_url.to_string()));
        }

        Ok(Self { base })
    }

    /// The base URL all links resolve against
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds the absolute URL for an endpoint
    ///
    /// Parameters are percent-encoded in canonical order, so the same
    /// input always yields the same string.
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The request URL
    /// * `Err(QueryError::MissingParameter)` - A parameter the endpoint
    ///   requires is absent or empty
    ///
    /// # Example
    ///
    /// ```
    /// use partsouq_harvester::model::SessionDescriptor;
    /// use partsouq_harvester::query::{Endpoint, QueryCodec, QueryParams};
    ///
    /// let codec = QueryCodec::new("https://partsouq.com").unwrap();
    /// let params = QueryParams::for_session(&SessionDescriptor::new("TOYOTA00", "abc"))
    ///     .with_gid("123");
    /// let url = codec.build(Endpoint::GroupDiagrams, &params).unwrap();
    /// assert_eq!(
    ///     url.as_str(),
    ///     "https://partsouq.com/en/catalog/genuine/parts?c=TOYOTA00&ssd=abc&vid=0&gid=123&q="
    /// );
    /// ```
    pub fn build(&self, endpoint: Endpoint, params: &QueryParams) -> QueryResult<Url> {
        for &param in endpoint.required() {
            if params.get(param).map_or(true, str::is_empty) {
                return Err(QueryError::MissingParameter {
                    endpoint: endpoint.name(),
                    param,
                });
            }
        }

        let mut url = self
            .base
            .join(endpoint.path())
            .map_err(|e| QueryError::Malformed(e.to_string()))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (key, value) in params.wire_pairs() {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Resolves a possibly site-relative link to an absolute URL
    pub fn resolve(&self, href: &str) -> QueryResult<Url> {
        let href = href.trim();
        if href.is_empty() {
            return Err(QueryError::Malformed(href.to_string()));
        }

        self.base
            .join(href)
            .map_err(|e| QueryError::Malformed(format!("{}: {}", href, e)))
    }

    /// Decodes the query string of a link into parameters
    ///
    /// Accepts both the `c` wire key and `car`. Unknown keys are ignored and
    /// the first occurrence of a repeated key wins.
    pub fn decode(&self, link: &str) -> QueryResult<QueryParams> {
        let url = self.resolve(link)?;
        Ok(decode_query(&url))
    }
}

/// Decodes the query string of an absolute URL
pub fn decode_query(url: &Url) -> QueryParams {
    let mut params = QueryParams::default();
    for (key, value) in url.query_pairs() {
        params.set(&key, value.into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionDescriptor;

    const TOKEN: &str = "$*KwEpHQwEck56RnkvRHgwI3Fl+/RUJcLSIvLjwT=$";

    fn codec() -> QueryCodec {
        QueryCodec::new(DEFAULT_BASE_URL).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_gid_and_car() {
        let params =
            QueryParams::for_session(&SessionDescriptor::new("TOYOTA00", TOKEN)).with_gid("123");
        let url = codec().build(Endpoint::GroupDiagrams, &params).unwrap();

        let decoded = codec().decode(url.as_str()).unwrap();
        assert_eq!(decoded.gid.as_deref(), Some("123"));
        assert_eq!(decoded.car.as_deref(), Some("TOYOTA00"));
        assert_eq!(decoded.ssd.as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_build_is_stable() {
        let params = QueryParams::for_session(&SessionDescriptor::new("TOYOTA00", TOKEN))
            .with_cid("0")
            .with_gid("9");
        let first = codec().build(Endpoint::GroupDiagrams, &params).unwrap();
        let second = codec().build(Endpoint::GroupDiagrams, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ssd_is_percent_encoded() {
        let params = QueryParams::for_session(&SessionDescriptor::new("TOYOTA00", TOKEN));
        let url = codec().build(Endpoint::Groups, &params).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("ssd=%24*KwEpHQwEck56RnkvRHgwI3Fl%2B%2FRUJcLSIvLjwT%3D%24"));
    }

    #[test]
    fn test_missing_gid_is_rejected() {
        let params = QueryParams::for_session(&SessionDescriptor::new("TOYOTA00", TOKEN));
        let err = codec().build(Endpoint::GroupDiagrams, &params).unwrap_err();
        assert_eq!(
            err,
            QueryError::MissingParameter {
                endpoint: "group-diagrams",
                param: "gid"
            }
        );
    }

    #[test]
    fn test_missing_session_is_rejected() {
        let err = codec()
            .build(Endpoint::Groups, &QueryParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::MissingParameter { param: "car", .. }
        ));
    }

    #[test]
    fn test_empty_ssd_counts_as_missing() {
        let params = QueryParams::for_session(&SessionDescriptor::new("TOYOTA00", ""));
        assert!(codec().build(Endpoint::Groups, &params).is_err());
    }

    #[test]
    fn test_search_needs_no_session() {
        let url = codec()
            .build(Endpoint::Search, &QueryParams::search("17801-50040"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://partsouq.com/en/search/all/?q=17801-50040"
        );
    }

    #[test]
    fn test_decode_relative_link() {
        let decoded = codec()
            .decode("/en/catalog/genuine/parts?c=TOYOTA00&ssd=abc&gid=551&vid=0")
            .unwrap();
        assert_eq!(decoded.gid.as_deref(), Some("551"));
        assert!(decoded.session().is_some());
    }

    #[test]
    fn test_resolve_rejects_empty() {
        assert!(codec().resolve("  ").is_err());
    }

    #[test]
    fn test_new_rejects_non_http_base() {
        assert!(QueryCodec::new("mailto:someone@example.com").is_err());
        assert!(QueryCodec::new("not a url").is_err());
    }
}
