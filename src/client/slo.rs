//! Service level objectives: `/v2/slo`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Notification, SignalFxClient};
use crate::error::ProviderError;

/// An SLO.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slo {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// SLO type; only `RequestBased` exists today.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event streams the SLO is computed from.
    pub inputs: SloInputs,
    /// Objectives. The API accepts exactly one.
    #[serde(default)]
    pub targets: Vec<SloTarget>,
}

/// SignalFlow inputs of a request-based SLO.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloInputs {
    /// Program producing the good and total streams.
    pub program_text: String,
    /// Label of the good events stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_events_label: Option<String>,
    /// Label of the total events stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_events_label: Option<String>,
}

/// An SLO objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloTarget {
    /// `RollingWindow` or `CalendarWindow`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Target percentage.
    pub slo: f64,
    /// Window length for rolling windows, e.g. `30d`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_period: Option<String>,
    /// `week` or `month` for calendar windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_type: Option<String>,
    /// Offset of the calendar cycle start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_start: Option<String>,
    /// Alert rules on this objective.
    #[serde(default, rename = "sloAlertRules")]
    pub alert_rules: Vec<SloAlertRule>,
}

/// Alert rules of one type (`BREACH`, `ERROR_BUDGET_LEFT`, `BURN_RATE`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SloAlertRule {
    /// Rule type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Rules by severity.
    #[serde(default)]
    pub rules: Vec<SloRule>,
}

/// A single alert rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloRule {
    /// `Critical`, `Major`, `Minor`, `Warning` or `Info`.
    pub severity: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the rule is muted.
    #[serde(default)]
    pub disabled: bool,
    /// Notification targets.
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Type-specific parameters such as `fireLasting`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl SignalFxClient {
    /// Create an SLO.
    pub async fn create_slo(&self, slo: &Slo) -> Result<Slo, ProviderError> {
        self.post(&["v2", "slo"], slo).await
    }

    /// Fetch an SLO.
    pub async fn get_slo(&self, id: &str) -> Result<Slo, ProviderError> {
        self.get(&["v2", "slo", id]).await
    }

    /// Replace an SLO.
    pub async fn update_slo(&self, id: &str, slo: &Slo) -> Result<Slo, ProviderError> {
        self.put(&["v2", "slo", id], slo).await
    }

    /// Delete an SLO.
    pub async fn delete_slo(&self, id: &str) -> Result<(), ProviderError> {
        self.delete(&["v2", "slo", id]).await
    }
}
