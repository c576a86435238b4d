//! Dashboard groups: `/v2/dashboardgroup`.

use serde::{Deserialize, Serialize};

use super::SignalFxClient;
use crate::error::ProviderError;

/// A dashboard group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardGroup {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Teams the group is linked to.
    #[serde(default)]
    pub teams: Vec<String>,
    /// Dashboards in the group, including mirrors. Read-only.
    #[serde(default, skip_serializing)]
    pub dashboards: Vec<String>,
    /// Mirrored dashboard configurations.
    #[serde(default)]
    pub dashboard_configs: Vec<DashboardConfig>,
}

/// A dashboard shown in a group, possibly mirrored from another group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Server-assigned id of this mirror entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    /// The mirrored dashboard.
    pub dashboard_id: String,
    /// Name shown in this group instead of the dashboard's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_override: Option<String>,
    /// Description shown in this group instead of the dashboard's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_override: Option<String>,
}

impl SignalFxClient {
    /// Create a dashboard group without the default dashboard the API adds otherwise.
    pub async fn create_dashboard_group(
        &self,
        group: &DashboardGroup,
    ) -> Result<DashboardGroup, ProviderError> {
        self.post_with_query(&["v2", "dashboardgroup"], &[("empty", "true".to_string())], group)
            .await
    }

    /// Fetch a dashboard group.
    pub async fn get_dashboard_group(&self, id: &str) -> Result<DashboardGroup, ProviderError> {
        self.get(&["v2", "dashboardgroup", id]).await
    }

    /// Replace a dashboard group.
    pub async fn update_dashboard_group(
        &self,
        id: &str,
        group: &DashboardGroup,
    ) -> Result<DashboardGroup, ProviderError> {
        self.put(&["v2", "dashboardgroup", id], group).await
    }

    /// Delete a dashboard group and every dashboard it owns.
    pub async fn delete_dashboard_group(&self, id: &str) -> Result<(), ProviderError> {
        self.delete(&["v2", "dashboardgroup", id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dashboards_are_read_only() {
        let group: DashboardGroup = serde_json::from_value(json!({
            "id": "G1",
            "name": "Ops",
            "dashboards": ["D1", "D2"],
            "dashboardConfigs": [{"configId": "CFG1", "dashboardId": "D2", "nameOverride": "Mirror"}]
        }))
        .unwrap();
        assert_eq!(group.dashboards, vec!["D1", "D2"]);
        assert_eq!(group.dashboard_configs[0].config_id.as_deref(), Some("CFG1"));

        let value = serde_json::to_value(&group).unwrap();
        assert!(value.get("dashboards").is_none());
        assert_eq!(value["dashboardConfigs"][0]["nameOverride"], "Mirror");
    }
}
