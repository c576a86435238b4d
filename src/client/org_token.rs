//! Organization access tokens: `/v2/token`.
//!
//! Tokens are addressed by name; the name is the id.

use serde::{Deserialize, Serialize};

use super::{Notification, SignalFxClient};
use crate::error::ProviderError;

/// An org access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgToken {
    /// Unique name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the token is disabled.
    #[serde(default)]
    pub disabled: bool,
    /// `API`, `INGEST` and/or `RUM`.
    #[serde(default)]
    pub auth_scopes: Vec<String>,
    /// Who to notify when a limit is approached.
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Usage limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<TokenLimits>,
    /// The token value. Returned by the API, never sent.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
}

/// Datapoints-per-minute limits of a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLimits {
    /// Hard limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpm_quota: Option<i64>,
    /// Notification threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpm_notification_threshold: Option<i64>,
}

impl SignalFxClient {
    /// Create a token.
    pub async fn create_org_token(&self, token: &OrgToken) -> Result<OrgToken, ProviderError> {
        self.post(&["v2", "token"], token).await
    }

    /// Fetch a token by name.
    pub async fn get_org_token(&self, name: &str) -> Result<OrgToken, ProviderError> {
        self.get(&["v2", "token", name]).await
    }

    /// Replace a token.
    pub async fn update_org_token(
        &self,
        name: &str,
        token: &OrgToken,
    ) -> Result<OrgToken, ProviderError> {
        self.put(&["v2", "token", name], token).await
    }

    /// Delete a token.
    pub async fn delete_org_token(&self, name: &str) -> Result<(), ProviderError> {
        self.delete(&["v2", "token", name]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secret_is_never_sent() {
        let token: OrgToken = serde_json::from_value(json!({
            "name": "ci",
            "secret": "abc123",
            "authScopes": ["INGEST"],
            "limits": {"dpmQuota": 1000}
        }))
        .unwrap();
        assert_eq!(token.secret.as_deref(), Some("abc123"));

        let value = serde_json::to_value(&token).unwrap();
        assert!(value.get("secret").is_none());
        assert_eq!(value["limits"], json!({"dpmQuota": 1000}));
    }
}
