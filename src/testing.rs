//! Test harness for driving a [`ProviderService`] without a gRPC server.
//!
//! ```ignore
//! use signalfx_provider::testing::ProviderTester;
//! use signalfx_provider::{CredentialSources, SignalFxProvider};
//!
//! let tester = ProviderTester::new(
//!     SignalFxProvider::new().with_credential_sources(CredentialSources::none()),
//! );
//! tester.configure(json!({"auth_token": "t", "api_url": server.uri()})).await?;
//! let state = tester
//!     .lifecycle_create("signalfx_dashboard_group", json!({"name": "Ops"}))
//!     .await?;
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Wraps a provider and runs protocol operations against it directly.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate the provider block. Error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.validate_provider_config(config).await?)
    }

    /// Configure the provider. Error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.configure(config).await?)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration. Error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(self.provider.validate_resource_config(resource_type, config).await?)
    }

    /// Plan a create.
    pub async fn plan_create(&self, resource_type: &str, config: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan an update of `prior_state` towards `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(&self, resource_type: &str, prior_state: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create from a planned state.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a state. `Value::Null` means the object is gone.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update from `prior_state` to `planned_state`.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior_state, planned_state).await
    }

    /// Delete.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Validate a data source configuration. Error diagnostics become `Err`.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Run a data source lookup.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create, then read back. Returns the read state.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read back. Returns the read state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_update(resource_type, prior_state.clone(), config).await?;
        let updated = self.update(resource_type, prior_state, plan.planned_state).await?;
        self.read(resource_type, updated).await
    }
}

/// Failure of a harness call that reports diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    /// The call returned error diagnostics.
    #[error("{}", render(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The call failed outright.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = d.summary.clone();
            if let Some(detail) = &d.detail {
                line.push_str(": ");
                line.push_str(detail);
            }
            if let Some(attribute) = &d.attribute {
                line.push_str(&format!(" (at {})", attribute));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert the plan replaces the resource.
///
/// # Panics
///
/// Panics if it updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "expected a replacement, got an in-place plan");
}

/// Assert the plan changes nothing.
///
/// # Panics
///
/// Panics if any attribute changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert the plan changes `path`.
///
/// # Panics
///
/// Panics if `path` is unchanged.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected '{}' to change, changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert some error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics.iter().any(|d| d.is_error() && d.summary.contains(substring)),
        "expected an error containing '{}', got {:?}",
        substring,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}
