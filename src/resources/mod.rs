//! Resource and data source implementations.
//!
//! Each resource translates the host's attribute map into an API request
//! body, calls [`SignalFxClient`](crate::client::SignalFxClient) and
//! translates the response back. Resources never see gRPC types; the
//! provider routes requests to them by type name.

mod attributes;
mod charts;
mod cloud_integration;
mod dashboard;
mod dashboard_group;
mod dimension_values;
mod notification_integration;
mod org_token;
mod slo;

pub use attributes::{carry_over, non_empty, Attributes};
pub use charts::{palette_index, palette_name, ChartKind, ChartResource, CHART_PALETTE};
pub use cloud_integration::{CloudIntegrationResource, CloudKind};
pub use dashboard::DashboardResource;
pub use dashboard_group::DashboardGroupResource;
pub use dimension_values::DimensionValuesDataSource;
pub use notification_integration::{NotificationIntegrationResource, NotificationKind};
pub use org_token::OrgTokenResource;
pub use slo::SloResource;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Diagnostic, Schema};

/// A managed object type.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// The type name, e.g. `signalfx_dashboard`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Value checks beyond the schema.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the object and return its state.
    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError>;

    /// Refresh state. A [`ProviderError::NotFound`] removes the resource.
    async fn read(&self, ctx: &ProviderContext, state: &Value) -> Result<Value, ProviderError>;

    /// Apply an in-place update and return the new state.
    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the object.
    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError>;

    /// Import by id. The default reads a state holding only the id.
    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError> {
        self.read(ctx, &json!({ "id": id })).await
    }
}

/// A read-only lookup.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// The type name, e.g. `signalfx_dimension_values`.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Value checks beyond the schema.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Run the lookup and return the config with computed attributes filled in.
    async fn read(&self, ctx: &ProviderContext, config: &Value) -> Result<Value, ProviderError>;
}

/// Every resource this provider serves.
pub fn all_resources() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(DashboardGroupResource),
        Arc::new(DashboardResource),
        Arc::new(ChartResource::new(ChartKind::TimeSeries)),
        Arc::new(ChartResource::new(ChartKind::Text)),
        Arc::new(ChartResource::new(ChartKind::SingleValue)),
        Arc::new(OrgTokenResource),
        Arc::new(SloResource),
        Arc::new(NotificationIntegrationResource::new(NotificationKind::Webhook)),
        Arc::new(NotificationIntegrationResource::new(NotificationKind::Slack)),
        Arc::new(NotificationIntegrationResource::new(NotificationKind::PagerDuty)),
        Arc::new(CloudIntegrationResource::new(CloudKind::Aws)),
        Arc::new(CloudIntegrationResource::new(CloudKind::Gcp)),
        Arc::new(CloudIntegrationResource::new(CloudKind::Azure)),
    ]
}

/// Every data source this provider serves.
pub fn all_data_sources() -> Vec<Arc<dyn DataSource>> {
    vec![Arc::new(DimensionValuesDataSource)]
}
