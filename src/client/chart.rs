//! Charts: `/v2/chart`.
//!
//! All chart kinds share one endpoint; they differ in the `options` object,
//! which is kept as raw JSON and built by each chart resource.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SignalFxClient;
use crate::error::ProviderError;

/// A chart of any kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// SignalFlow program. Empty for text charts.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub program_text: String,
    /// Kind-specific options; `options.type` names the kind.
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Chart {
    /// The chart kind from `options.type`, e.g. `TimeSeriesChart`.
    pub fn kind(&self) -> Option<&str> {
        self.options.get("type").and_then(Value::as_str)
    }
}

impl SignalFxClient {
    /// Create a chart.
    pub async fn create_chart(&self, chart: &Chart) -> Result<Chart, ProviderError> {
        self.post(&["v2", "chart"], chart).await
    }

    /// Fetch a chart.
    pub async fn get_chart(&self, id: &str) -> Result<Chart, ProviderError> {
        self.get(&["v2", "chart", id]).await
    }

    /// Replace a chart.
    pub async fn update_chart(&self, id: &str, chart: &Chart) -> Result<Chart, ProviderError> {
        self.put(&["v2", "chart", id], chart).await
    }

    /// Delete a chart.
    pub async fn delete_chart(&self, id: &str) -> Result<(), ProviderError> {
        self.delete(&["v2", "chart", id]).await
    }
}
