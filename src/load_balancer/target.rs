//! Upstream target abstraction.
//!
//! # Responsibilities
//! - Represent one upstream base URL and its weight
//! - Build the outbound URL for a proxied path and query

use url::Url;

use crate::config::TargetConfig;

#[derive(Debug, thiserror::Error)]
#[error("invalid proxy target {url:?}: {source}")]
pub struct TargetError {
    url: String,
    #[source]
    source: url::ParseError,
}

/// One upstream candidate. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    base_url: Url,
    weight: u32,
}

impl ProxyTarget {
    pub fn new(base_url: Url, weight: u32) -> Self {
        Self {
            base_url,
            weight: weight.max(1),
        }
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self, TargetError> {
        let base_url = Url::parse(&config.url).map_err(|source| TargetError {
            url: config.url.clone(),
            source,
        })?;
        Ok(Self::new(base_url, config.weight))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Outbound URL for `path_and_query`; the client path is kept as-is and
    /// appended to any path the target itself carries.
    pub fn url_for(&self, path_and_query: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{base}{path_and_query}")
        } else {
            format!("{base}/{path_and_query}")
        }
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
