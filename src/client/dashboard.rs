//! Dashboards: `/v2/dashboard`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SignalFxClient;
use crate::error::ProviderError;

/// A dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning dashboard group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Chart placements.
    #[serde(default)]
    pub charts: Vec<DashboardChart>,
    /// Chart resolution (`DEFAULT`, `LOW`, `HIGH`, `HIGHEST`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_density: Option<String>,
    /// Variables, filters and time range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<DashboardFilters>,
}

/// Placement of a chart on the dashboard grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardChart {
    /// Chart id.
    pub chart_id: String,
    /// Grid row.
    pub row: i64,
    /// Grid column, 0-11.
    pub column: i64,
    /// Width in columns, 1-12.
    pub width: i64,
    /// Height in rows.
    pub height: i64,
}

/// Dashboard-level filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFilters {
    /// Dashboard variables.
    #[serde(default)]
    pub variables: Vec<DashboardVariable>,
    /// Static source filters.
    #[serde(default)]
    pub sources: Vec<DashboardSource>,
    /// Time range override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DashboardTime>,
}

/// A dashboard variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardVariable {
    /// Dimension or property the variable filters on.
    pub property: String,
    /// Label shown in the UI.
    pub alias: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default values.
    #[serde(default)]
    pub value: Vec<String>,
    /// Whether a value must be selected.
    #[serde(default)]
    pub required: bool,
    /// Whether only suggested values may be chosen.
    #[serde(default)]
    pub restricted: bool,
    /// Suggested values.
    #[serde(default)]
    pub preferred_suggestions: Vec<String>,
    /// Whether the variable only replaces existing filters.
    #[serde(default)]
    pub replace_only: bool,
    /// Apply only to charts that have the property.
    #[serde(default)]
    pub apply_if_exist: bool,
}

/// A static dashboard filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSource {
    /// Dimension or property.
    pub property: String,
    /// Accepted values.
    #[serde(default)]
    pub value: Vec<String>,
    /// Negate the filter.
    #[serde(default, rename = "NOT")]
    pub negated: bool,
    /// Apply only to charts that have the property.
    #[serde(default)]
    pub apply_if_exist: bool,
}

/// Dashboard time range: either relative (`range`) or absolute (`start`/`end`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardTime {
    /// Relative range such as `-1h`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    /// End of the range; `Now` for relative ranges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,
}

impl SignalFxClient {
    /// Create a dashboard.
    pub async fn create_dashboard(&self, dashboard: &Dashboard) -> Result<Dashboard, ProviderError> {
        self.post(&["v2", "dashboard"], dashboard).await
    }

    /// Fetch a dashboard.
    pub async fn get_dashboard(&self, id: &str) -> Result<Dashboard, ProviderError> {
        self.get(&["v2", "dashboard", id]).await
    }

    /// Replace a dashboard.
    pub async fn update_dashboard(
        &self,
        id: &str,
        dashboard: &Dashboard,
    ) -> Result<Dashboard, ProviderError> {
        self.put(&["v2", "dashboard", id], dashboard).await
    }

    /// Delete a dashboard.
    pub async fn delete_dashboard(&self, id: &str) -> Result<(), ProviderError> {
        self.delete(&["v2", "dashboard", id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_field_names() {
        let dashboard = Dashboard {
            name: "Hosts".to_string(),
            group_id: Some("G1".to_string()),
            charts: vec![DashboardChart {
                chart_id: "C1".to_string(),
                row: 0,
                column: 6,
                width: 6,
                height: 1,
            }],
            filters: Some(DashboardFilters {
                sources: vec![DashboardSource {
                    property: "env".to_string(),
                    value: vec!["prod".to_string()],
                    negated: true,
                    apply_if_exist: false,
                }],
                ..Default::default()
            }),
            ..Default::default()
        };

        let value = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(value["groupId"], "G1");
        assert_eq!(value["charts"][0]["chartId"], "C1");
        assert_eq!(value["filters"]["sources"][0]["NOT"], true);
        assert!(value.get("id").is_none());
    }

    #[test]
    fn tolerates_missing_and_unknown_fields() {
        let dashboard: Dashboard = serde_json::from_value(json!({
            "id": "D1",
            "name": "Hosts",
            "creator": "U1",
            "eventOverlays": null
        }))
        .unwrap();
        assert_eq!(dashboard.id.as_deref(), Some("D1"));
        assert!(dashboard.charts.is_empty());
    }
}
