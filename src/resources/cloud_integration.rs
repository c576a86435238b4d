//! `signalfx_aws_integration`, `signalfx_gcp_integration`,
//! `signalfx_azure_integration`
//!
//! Cloud integrations switch state asynchronously, so every write is
//! followed by a wait for the `enabled` property to settle. Deletion
//! disables first and waits for `DISABLED` before removing the
//! integration.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{carry_over, non_empty, Attributes, Resource};
use crate::client::Integration;
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Checks;
use crate::waiter::{wait_for_integration_state, WaitOptions};

const AWS_AUTH_METHODS: &[&str] = &["ExternalId", "SecurityToken"];
const AZURE_ENVIRONMENTS: &[&str] = &["AZURE", "AZURE_US_GOVERNMENT"];

/// Which cloud a [`CloudIntegrationResource`] connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudKind {
    /// AWS CloudWatch.
    Aws,
    /// Google Cloud Platform.
    Gcp,
    /// Microsoft Azure.
    Azure,
}

impl CloudKind {
    /// The integration `type` the API uses.
    pub fn api_type(self) -> &'static str {
        match self {
            Self::Aws => "AWSCloudWatch",
            Self::Gcp => "GCP",
            Self::Azure => "Azure",
        }
    }

    fn secrets(self) -> &'static [&'static str] {
        match self {
            Self::Aws => &["key", "token"],
            Self::Gcp => &["project_service_keys"],
            Self::Azure => &["secret_key"],
        }
    }
}

/// A cloud integration of one [`CloudKind`].
#[derive(Debug, Clone, Copy)]
pub struct CloudIntegrationResource {
    kind: CloudKind,
}

impl CloudIntegrationResource {
    /// A resource for `kind`.
    pub fn new(kind: CloudKind) -> Self {
        Self { kind }
    }

    fn body(&self, attrs: &Attributes<'_>) -> Result<Integration, ProviderError> {
        let integration = Integration::new(
            self.kind.api_type(),
            attrs.required_string("name")?,
            attrs.bool("enabled"),
        )
        .with_setting("pollRate", json!(attrs.int("poll_rate").map(|s| s * 1000)))
        .with_setting("services", json!(non_empty(attrs.strings("services"))));

        let integration = match self.kind {
            CloudKind::Aws => integration
                .with_setting("authMethod", json!(attrs.string("auth_method")))
                .with_setting("roleArn", json!(attrs.string("role_arn")))
                .with_setting("externalId", json!(attrs.string("external_id")))
                .with_setting("key", json!(attrs.string("key")))
                .with_setting("token", json!(attrs.string("token")))
                .with_setting("regions", json!(non_empty(attrs.strings("regions"))))
                .with_setting("importCloudWatch", json!(attrs.bool("import_cloud_watch")))
                .with_setting("enableAwsUsage", json!(attrs.bool("enable_aws_usage")))
                .with_setting("namedToken", json!(attrs.string("named_token"))),
            CloudKind::Gcp => {
                let keys = attrs
                    .blocks("project_service_keys")
                    .iter()
                    .map(|k| {
                        Ok(json!({
                            "projectId": k.required_string("project_id")?,
                            "projectKey": k.required_string("project_key")?,
                        }))
                    })
                    .collect::<Result<Vec<_>, ProviderError>>()?;
                integration
                    .with_setting("projectServiceKeys", json!(non_empty(keys)))
                    .with_setting("namedToken", json!(attrs.string("named_token")))
            },
            CloudKind::Azure => integration
                .with_setting("appId", json!(attrs.string("app_id")))
                .with_setting("secretKey", json!(attrs.string("secret_key")))
                .with_setting("tenantId", json!(attrs.string("tenant_id")))
                .with_setting("subscriptions", json!(non_empty(attrs.strings("subscriptions"))))
                .with_setting(
                    "azureEnvironment",
                    json!(attrs.string("environment").unwrap_or_else(|| "AZURE".to_string())),
                )
                .with_setting("namedToken", json!(attrs.string("named_token"))),
        };
        Ok(integration)
    }

    fn state(&self, integration: &Integration, prior: &Value) -> Value {
        let setting = |key: &str| integration.settings.get(key).cloned().unwrap_or(Value::Null);
        let poll_rate = integration
            .settings
            .get("pollRate")
            .and_then(Value::as_i64)
            .map(|ms| ms / 1000);
        let mut state = json!({
            "id": integration.id,
            "name": integration.name,
            "enabled": integration.enabled,
            "poll_rate": poll_rate,
            "services": setting("services"),
            "named_token": setting("namedToken"),
            "ignore_failures": Attributes::new(prior).bool("ignore_failures"),
        });
        if let Value::Object(obj) = &mut state {
            let mut set = |key: &str, value: Value| {
                obj.insert(key.to_string(), value);
            };
            match self.kind {
                CloudKind::Aws => {
                    set("auth_method", setting("authMethod"));
                    set("role_arn", setting("roleArn"));
                    set("external_id", setting("externalId"));
                    set("key", setting("key"));
                    set("token", setting("token"));
                    set("regions", setting("regions"));
                    set("import_cloud_watch", setting("importCloudWatch"));
                    set("enable_aws_usage", setting("enableAwsUsage"));
                },
                CloudKind::Gcp => {
                    let keys = setting("projectServiceKeys");
                    let keys = match keys.as_array() {
                        Some(items) => Value::Array(
                            items
                                .iter()
                                .map(|k| {
                                    json!({
                                        "project_id": k.get("projectId"),
                                        "project_key": k.get("projectKey"),
                                    })
                                })
                                .collect(),
                        ),
                        None => Value::Null,
                    };
                    set("project_service_keys", keys);
                },
                CloudKind::Azure => {
                    set("app_id", setting("appId"));
                    set("secret_key", setting("secretKey"));
                    set("tenant_id", setting("tenantId"));
                    set("subscriptions", setting("subscriptions"));
                    set("environment", setting("azureEnvironment"));
                },
            }
        }
        carry_over(&mut state, prior, self.kind.secrets());
        state
    }

    fn wait_options(&self, ctx: &ProviderContext, attrs: &Attributes<'_>) -> WaitOptions {
        ctx.wait.ignoring_failures(attrs.bool("ignore_failures"))
    }
}

#[async_trait]
impl Resource for CloudIntegrationResource {
    fn type_name(&self) -> &'static str {
        match self.kind {
            CloudKind::Aws => "signalfx_aws_integration",
            CloudKind::Gcp => "signalfx_gcp_integration",
            CloudKind::Azure => "signalfx_azure_integration",
        }
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("enabled", Attribute::required_bool())
            .with_attribute(
                "poll_rate",
                Attribute::optional_int64().with_description("Seconds between metric syncs"),
            )
            .with_attribute("services", Attribute::optional_string_set())
            .with_attribute("named_token", Attribute::optional_string().with_force_new())
            .with_attribute(
                "ignore_failures",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Treat CANCELLATION_FAILED as disabled while waiting"),
            );
        match self.kind {
            CloudKind::Aws => schema
                .with_description("An AWS CloudWatch integration")
                .with_attribute("auth_method", Attribute::required_string())
                .with_attribute("role_arn", Attribute::optional_string())
                .with_attribute("external_id", Attribute::optional_computed_string().sensitive())
                .with_attribute("key", Attribute::optional_string().sensitive())
                .with_attribute("token", Attribute::optional_string().sensitive())
                .with_attribute("regions", Attribute::optional_string_set())
                .with_attribute("import_cloud_watch", Attribute::optional_bool())
                .with_attribute("enable_aws_usage", Attribute::optional_bool()),
            CloudKind::Gcp => schema.with_description("A Google Cloud integration").with_block(
                "project_service_keys",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("project_id", Attribute::required_string())
                        .with_attribute("project_key", Attribute::required_string().sensitive()),
                ),
            ),
            CloudKind::Azure => schema
                .with_description("A Microsoft Azure integration")
                .with_attribute("app_id", Attribute::required_string().sensitive())
                .with_attribute("secret_key", Attribute::required_string().sensitive())
                .with_attribute("tenant_id", Attribute::required_string())
                .with_attribute("subscriptions", Attribute::required_string_list())
                .with_attribute(
                    "environment",
                    Attribute::optional_string().with_default(json!("AZURE")),
                ),
        }
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let attrs = Attributes::new(config);
        let text = |key: &str| attrs.raw(key).and_then(Value::as_str);
        let mut checks = Checks::new();
        checks
            .non_empty("name", text("name"))
            .int_range("poll_rate", attrs.int("poll_rate"), 60, 600);
        match self.kind {
            CloudKind::Aws => {
                let method = text("auth_method");
                checks.one_of("auth_method", method, AWS_AUTH_METHODS);
                match method {
                    Some("ExternalId") => {
                        checks.ensure(attrs.string("role_arn").is_some(), || {
                            Diagnostic::error("ExternalId authentication needs a role_arn")
                                .with_attribute("role_arn")
                        });
                    },
                    Some("SecurityToken") => {
                        checks.ensure(
                            attrs.string("key").is_some() && attrs.string("token").is_some(),
                            || {
                                Diagnostic::error("SecurityToken authentication needs key and token")
                                    .with_attribute("key")
                            },
                        );
                    },
                    _ => {},
                }
            },
            CloudKind::Gcp => {},
            CloudKind::Azure => {
                checks.one_of("environment", text("environment"), AZURE_ENVIRONMENTS);
            },
        }
        checks.into_diagnostics()
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError> {
        let attrs = Attributes::new(planned);
        let body = self.body(&attrs)?;
        let created = ctx.client.create_integration(&body).await?;
        let id = created.id.clone().unwrap_or_default();
        info!(integration = %id, kind = self.kind.api_type(), "Created cloud integration");

        let settled = wait_for_integration_state(
            &ctx.client,
            &id,
            "enabled",
            &json!(body.enabled),
            self.wait_options(ctx, &attrs),
        )
        .await?;
        Ok(self.state(&settled, planned))
    }

    async fn read(&self, ctx: &ProviderContext, state: &Value) -> Result<Value, ProviderError> {
        let id = Attributes::new(state).id()?;
        let integration = ctx.client.get_integration(&id).await?;
        Ok(self.state(&integration, state))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let id = Attributes::new(prior).id()?;
        let attrs = Attributes::new(planned);
        let body = self.body(&attrs)?;
        ctx.client.update_integration(&id, &body).await?;

        let settled = wait_for_integration_state(
            &ctx.client,
            &id,
            "enabled",
            &json!(body.enabled),
            self.wait_options(ctx, &attrs),
        )
        .await?;
        Ok(self.state(&settled, planned))
    }

    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError> {
        let attrs = Attributes::new(state);
        let id = attrs.id()?;
        let mut current = ctx.client.get_integration(&id).await?;

        if current.enabled {
            current.enabled = false;
            ctx.client.update_integration(&id, &current).await?;
            wait_for_integration_state(
                &ctx.client,
                &id,
                "enabled",
                &json!(false),
                self.wait_options(ctx, &attrs),
            )
            .await?;
        }
        ctx.client.delete_integration(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_body_converts_poll_rate() {
        let resource = CloudIntegrationResource::new(CloudKind::Aws);
        let value = json!({
            "name": "prod",
            "enabled": true,
            "auth_method": "ExternalId",
            "role_arn": "arn:aws:iam::123:role/sfx",
            "poll_rate": 300,
            "regions": ["us-east-1"],
            "services": []
        });
        let body = resource.body(&Attributes::new(&value)).unwrap();

        assert_eq!(body.kind, "AWSCloudWatch");
        assert_eq!(body.settings["pollRate"], 300_000);
        assert_eq!(body.settings["regions"], json!(["us-east-1"]));
        assert!(!body.settings.contains_key("services"));
        assert!(!body.settings.contains_key("key"));
    }

    #[test]
    fn gcp_keys_survive_reads() {
        let resource = CloudIntegrationResource::new(CloudKind::Gcp);
        let mut integration = Integration::new("GCP", "gcp", true).with_setting("pollRate", json!(60_000));
        integration.id = Some("G1".to_string());
        let prior = json!({
            "ignore_failures": true,
            "project_service_keys": [{"project_id": "p", "project_key": "{...}"}]
        });

        let state = resource.state(&integration, &prior);
        assert_eq!(state["poll_rate"], 60);
        assert_eq!(state["project_service_keys"][0]["project_id"], "p");
        assert_eq!(state["ignore_failures"], true);
    }

    #[test]
    fn aws_auth_requirements() {
        let resource = CloudIntegrationResource::new(CloudKind::Aws);
        let diagnostics = resource.validate(&json!({
            "name": "prod", "enabled": true, "auth_method": "SecurityToken", "key": "AKIA", "poll_rate": 10
        }));
        let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(paths, vec!["poll_rate", "key"]);
    }

    #[test]
    fn azure_defaults_environment() {
        let resource = CloudIntegrationResource::new(CloudKind::Azure);
        let value = json!({
            "name": "az", "enabled": false, "app_id": "a", "secret_key": "s",
            "tenant_id": "t", "subscriptions": ["sub"]
        });
        let body = resource.body(&Attributes::new(&value)).unwrap();
        assert_eq!(body.settings["azureEnvironment"], "AZURE");
        assert_eq!(body.settings["subscriptions"], json!(["sub"]));
    }
}
