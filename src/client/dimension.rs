//! Dimension search: `GET /v2/dimension`.

use serde::Deserialize;

use super::SignalFxClient;
use crate::error::ProviderError;

/// A dimension key/value pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Dimension {
    /// Dimension key.
    pub key: String,
    /// Dimension value.
    pub value: String,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DimensionSearch {
    /// Total number of matches.
    #[serde(default)]
    pub count: u64,
    /// Matches in this page.
    #[serde(default)]
    pub results: Vec<Dimension>,
}

impl SignalFxClient {
    /// Search dimensions with a query such as `key:host AND value:web*`.
    pub async fn search_dimensions(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<DimensionSearch, ProviderError> {
        self.get_with_query(
            &["v2", "dimension"],
            &[("query", query.to_string()), ("limit", limit.to_string())],
        )
        .await
    }
}
