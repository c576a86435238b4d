//! The SignalFx provider: routes protocol calls to resources.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::SignalFxClient;
use crate::config::{provider_schema, resolve, CredentialSources, ProviderConfig, ResolvedConfig};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{all_data_sources, all_resources, DataSource, Resource};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;
use crate::waiter::WaitOptions;

/// Everything a resource needs once the provider is configured.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    /// Authenticated API client.
    pub client: SignalFxClient,
    /// Merged configuration.
    pub config: ResolvedConfig,
    /// Polling behavior for integration state waits.
    pub wait: WaitOptions,
}

impl ProviderContext {
    /// A context with default wait options.
    pub fn new(client: SignalFxClient, config: ResolvedConfig) -> Self {
        Self {
            client,
            config,
            wait: WaitOptions::default(),
        }
    }

    /// Web UI link to an object, e.g. `https://app.signalfx.com/#/dashboard/ABC`.
    pub fn app_link(&self, kind: &str, id: &str) -> String {
        self.config.app_link(&format!("/{}/{}", kind, id))
    }
}

/// Provider serving every SignalFx resource and data source.
pub struct SignalFxProvider {
    resources: HashMap<&'static str, Arc<dyn Resource>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
    context: RwLock<Option<Arc<ProviderContext>>>,
    sources: CredentialSources,
    wait: WaitOptions,
}

impl Default for SignalFxProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalFxProvider {
    /// A provider reading credentials from the real files and environment.
    pub fn new() -> Self {
        Self {
            resources: all_resources().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: all_data_sources().into_iter().map(|d| (d.type_name(), d)).collect(),
            context: RwLock::new(None),
            sources: CredentialSources::from_environment(),
            wait: WaitOptions::default(),
        }
    }

    /// Replace where credentials are looked up.
    pub fn with_credential_sources(mut self, sources: CredentialSources) -> Self {
        self.sources = sources;
        self
    }

    /// Replace the polling behavior of integration waits.
    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    async fn context(&self) -> Result<Arc<ProviderContext>, ProviderError> {
        self.context.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    /// Settle the auth token, logging in with email and password if needed.
    async fn authenticate(&self, mut resolved: ResolvedConfig) -> Result<ResolvedConfig, ProviderError> {
        if resolved.auth_token.is_some() {
            return Ok(resolved);
        }
        if let (Some(email), Some(password)) = (&resolved.email, &resolved.password) {
            info!(email = %email, "Creating session token");
            let token = SignalFxClient::create_session_token(
                &resolved.api_url,
                resolved.timeout,
                email,
                password,
                resolved.organization_id.as_deref(),
            )
            .await?;
            resolved.auth_token = Some(token);
        }
        Ok(resolved)
    }
}

#[async_trait::async_trait]
impl ProviderService for SignalFxProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider_schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |s, (name, r)| s.with_resource(*name, r.schema()));
        self.data_sources
            .iter()
            .fold(schema, |s, (name, d)| s.with_data_source(*name, d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_schema(), &config);
        diagnostics.extend(ProviderConfig::from_value(&config)?.check());
        Ok(diagnostics)
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let parsed = ProviderConfig::from_value(&config)?;
        let diagnostics = parsed.check();
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let resolved = self.authenticate(resolve(&parsed, &self.sources)?).await?;
        if resolved.auth_token.is_none() {
            warn!("No auth token in any credential source");
            return Ok(vec![Diagnostic::error("auth_token is required")
                .with_detail(
                    "Set auth_token, SFX_AUTH_TOKEN, a signalfx.conf file, a netrc entry, or email and password",
                )
                .with_attribute("auth_token")]);
        }

        let client = SignalFxClient::from_config(&resolved)?;
        info!(
            api_url = %resolved.api_url,
            feature_preview = ?resolved.enabled_features(),
            "Configured SignalFx client"
        );
        let mut context = ProviderContext::new(client, resolved);
        context.wait = self.wait;
        *self.context.write().await = Some(Arc::new(context));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.context.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(plan_resource(&resource.schema(), prior_state.as_ref(), &proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource.create(&ctx, &planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        match resource.read(&ctx, &current_state).await {
            Err(e) if e.is_not_found() => {
                info!(resource_type, "Resource no longer exists, removing from state");
                Ok(Value::Null)
            },
            other => other,
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource.update(&ctx, &prior_state, &planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        match resource.delete(&ctx, &current_state).await {
            Err(e) if e.is_not_found() => {
                debug!(resource_type, "Resource already deleted");
                Ok(())
            },
            other => other,
        }
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        let state = resource.import(&ctx, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let mut diagnostics = validate(&data_source.schema(), &config);
        diagnostics.extend(data_source.validate(&config));
        Ok(diagnostics)
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let ctx = self.context().await?;
        data_source.read(&ctx, &config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_error_contains, ProviderTester, TestError};
    use serde_json::json;

    fn tester() -> ProviderTester<SignalFxProvider> {
        ProviderTester::new(SignalFxProvider::new().with_credential_sources(CredentialSources::none()))
    }

    #[tokio::test]
    async fn schema_lists_every_type() {
        let tester = tester();
        let types = tester.resource_types();
        assert_eq!(types.len(), 13);
        assert!(types.contains(&"signalfx_dashboard_group".to_string()));
        assert_eq!(tester.data_source_types(), vec!["signalfx_dimension_values"]);
        assert!(tester.schema().provider.block.attributes.contains_key("auth_token"));
    }

    #[tokio::test]
    async fn configure_without_token_fails_on_auth_token() {
        let tester = tester();
        match tester.configure(json!({})).await {
            Err(TestError::Diagnostics(diags)) => {
                assert_error_contains(&diags, "auth_token is required");
                assert_eq!(diags[0].attribute.as_deref(), Some("auth_token"));
            },
            other => panic!("expected diagnostics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn crud_before_configure_is_a_configuration_error() {
        let tester = tester();
        let err = tester
            .create("signalfx_dashboard_group", json!({"name": "ops"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn unknown_types_are_rejected() {
        let tester = tester();
        tester.configure(json!({"auth_token": "t"})).await.unwrap();
        assert!(matches!(
            tester.read("signalfx_detector", json!({"id": "D1"})).await,
            Err(ProviderError::UnknownResource(_))
        ));
        assert!(matches!(
            tester.read_data_source("signalfx_bogus", json!({})).await,
            Err(ProviderError::UnknownResource(_))
        ));
    }

    #[tokio::test]
    async fn validation_combines_schema_and_value_checks() {
        let tester = tester();
        let err = tester
            .validate_resource_config(
                "signalfx_dashboard",
                json!({
                    "dashboard_group": "G1",
                    "charts_resolution": "ultra",
                }),
            )
            .await
            .unwrap_err();
        let TestError::Diagnostics(diags) = err else {
            panic!("expected diagnostics");
        };
        let paths: Vec<_> = diags.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert!(paths.contains(&"name"));
        assert!(paths.contains(&"charts_resolution"));
    }

    #[tokio::test]
    async fn plan_uses_force_new() {
        let tester = tester();
        let prior = json!({"id": "D1", "name": "ops", "dashboard_group": "G1"});
        let proposed = json!({"name": "ops", "dashboard_group": "G2"});
        let plan = tester.plan_update("signalfx_dashboard", prior, proposed).await.unwrap();
        crate::testing::assert_plan_replaces(&plan);
    }

    #[test]
    fn app_links() {
        let config = resolve(&ProviderConfig::default(), &CredentialSources::none()).unwrap();
        let client = SignalFxClient::new(&config.api_url, "t", config.timeout, config.retry).unwrap();
        let ctx = ProviderContext::new(client, config);
        assert_eq!(ctx.app_link("dashboard", "ABC"), "https://app.signalfx.com/#/dashboard/ABC");
    }
}
