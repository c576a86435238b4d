//! Integrations: `/v2/integration`.
//!
//! Integration payloads vary by `type`; only the fields every integration
//! shares are typed, the rest is kept in `settings`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SignalFxClient;
use crate::error::ProviderError;

/// An integration of any type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Integration type, e.g. `AWSCloudWatch`, `Slack`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the integration is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Type-specific fields, including the read-only `status` of cloud integrations.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl Integration {
    /// A new integration of `kind`.
    pub fn new(kind: impl Into<String>, name: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: kind.into(),
            enabled,
            settings: Map::new(),
        }
    }

    /// Set a type-specific field. `null` values are skipped.
    pub fn with_setting(mut self, key: &str, value: Value) -> Self {
        if !value.is_null() {
            self.settings.insert(key.to_string(), value);
        }
        self
    }

    /// Look up a property by its API name.
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name.clone())),
            "enabled" => Some(Value::Bool(self.enabled)),
            other => self.settings.get(other).cloned(),
        }
    }

    /// The reported `status`, if the integration type has one.
    pub fn status(&self) -> Option<&str> {
        self.settings.get("status").and_then(Value::as_str)
    }
}

impl SignalFxClient {
    /// Create an integration.
    pub async fn create_integration(
        &self,
        integration: &Integration,
    ) -> Result<Integration, ProviderError> {
        self.post(&["v2", "integration"], integration).await
    }

    /// Fetch an integration.
    pub async fn get_integration(&self, id: &str) -> Result<Integration, ProviderError> {
        self.get(&["v2", "integration", id]).await
    }

    /// Replace an integration.
    pub async fn update_integration(
        &self,
        id: &str,
        integration: &Integration,
    ) -> Result<Integration, ProviderError> {
        self.put(&["v2", "integration", id], integration).await
    }

    /// Delete an integration.
    pub async fn delete_integration(&self, id: &str) -> Result<(), ProviderError> {
        self.delete(&["v2", "integration", id]).await
    }
}
