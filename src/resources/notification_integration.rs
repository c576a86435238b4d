//! `signalfx_webhook_integration`, `signalfx_slack_integration`,
//! `signalfx_pagerduty_integration`
//!
//! Secrets are write-only: the API never returns them, so state keeps the
//! value last applied.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{carry_over, Attributes, Resource};
use crate::client::Integration;
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Checks;

/// Which notification service a [`NotificationIntegrationResource`] manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Generic HTTP webhook.
    Webhook,
    /// Slack incoming webhook.
    Slack,
    /// PagerDuty service.
    PagerDuty,
}

impl NotificationKind {
    /// The integration `type` the API uses.
    pub fn api_type(self) -> &'static str {
        match self {
            Self::Webhook => "Webhook",
            Self::Slack => "Slack",
            Self::PagerDuty => "PagerDuty",
        }
    }

    fn secrets(self) -> &'static [&'static str] {
        match self {
            Self::Webhook => &["shared_secret"],
            Self::Slack => &["webhook_url"],
            Self::PagerDuty => &["api_key"],
        }
    }
}

/// A notification service integration of one [`NotificationKind`].
#[derive(Debug, Clone, Copy)]
pub struct NotificationIntegrationResource {
    kind: NotificationKind,
}

impl NotificationIntegrationResource {
    /// A resource for `kind`.
    pub fn new(kind: NotificationKind) -> Self {
        Self { kind }
    }

    fn body(&self, attrs: &Attributes<'_>) -> Result<Integration, ProviderError> {
        let integration = Integration::new(
            self.kind.api_type(),
            attrs.required_string("name")?,
            attrs.bool_or("enabled", true),
        );
        let integration = match self.kind {
            NotificationKind::Webhook => {
                let headers: Map<String, Value> = attrs
                    .blocks("headers")
                    .iter()
                    .filter_map(|h| Some((h.string("header_key")?, json!(h.string("header_value")?))))
                    .collect();
                integration
                    .with_setting("url", json!(attrs.required_string("url")?))
                    .with_setting("sharedSecret", json!(attrs.string("shared_secret")))
                    .with_setting(
                        "headers",
                        if headers.is_empty() { Value::Null } else { Value::Object(headers) },
                    )
            },
            NotificationKind::Slack => integration
                .with_setting("webhookUrl", json!(attrs.required_string("webhook_url")?)),
            NotificationKind::PagerDuty => {
                integration.with_setting("apiKey", json!(attrs.required_string("api_key")?))
            },
        };
        Ok(integration)
    }

    fn state(&self, integration: &Integration, prior: &Value) -> Value {
        let setting = |key: &str| integration.settings.get(key).cloned().unwrap_or(Value::Null);
        let mut state = json!({
            "id": integration.id,
            "name": integration.name,
            "enabled": integration.enabled,
        });
        if let Value::Object(obj) = &mut state {
            match self.kind {
                NotificationKind::Webhook => {
                    let headers: Vec<Value> = integration
                        .settings
                        .get("headers")
                        .and_then(Value::as_object)
                        .map(|h| {
                            h.iter()
                                .map(|(k, v)| json!({"header_key": k, "header_value": v}))
                                .collect()
                        })
                        .unwrap_or_default();
                    obj.insert("url".to_string(), setting("url"));
                    obj.insert("shared_secret".to_string(), setting("sharedSecret"));
                    obj.insert("headers".to_string(), Value::Array(headers));
                },
                NotificationKind::Slack => {
                    obj.insert("webhook_url".to_string(), setting("webhookUrl"));
                },
                NotificationKind::PagerDuty => {
                    obj.insert("api_key".to_string(), setting("apiKey"));
                },
            }
        }
        carry_over(&mut state, prior, self.kind.secrets());
        state
    }
}

#[async_trait]
impl Resource for NotificationIntegrationResource {
    fn type_name(&self) -> &'static str {
        match self.kind {
            NotificationKind::Webhook => "signalfx_webhook_integration",
            NotificationKind::Slack => "signalfx_slack_integration",
            NotificationKind::PagerDuty => "signalfx_pagerduty_integration",
        }
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("enabled", Attribute::optional_bool().with_default(json!(true)));
        match self.kind {
            NotificationKind::Webhook => schema
                .with_description("A webhook notification target")
                .with_attribute("url", Attribute::required_string())
                .with_attribute("shared_secret", Attribute::optional_string().sensitive())
                .with_block(
                    "headers",
                    NestedBlock::set(
                        Block::new()
                            .with_attribute("header_key", Attribute::required_string())
                            .with_attribute("header_value", Attribute::required_string().sensitive()),
                    ),
                ),
            NotificationKind::Slack => schema
                .with_description("A Slack notification target")
                .with_attribute("webhook_url", Attribute::required_string().sensitive()),
            NotificationKind::PagerDuty => schema
                .with_description("A PagerDuty notification target")
                .with_attribute("api_key", Attribute::required_string().sensitive()),
        }
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let attrs = Attributes::new(config);
        let mut checks = Checks::new();
        checks.non_empty("name", attrs.raw("name").and_then(Value::as_str));
        let url_key = match self.kind {
            NotificationKind::Webhook => Some("url"),
            NotificationKind::Slack => Some("webhook_url"),
            NotificationKind::PagerDuty => None,
        };
        if let Some(key) = url_key {
            if let Some(url) = attrs.string(key) {
                checks.ensure(reqwest::Url::parse(&url).is_ok(), || {
                    Diagnostic::error(format!("'{}' is not a valid URL", key)).with_attribute(key)
                });
            }
        }
        checks.into_diagnostics()
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError> {
        let body = self.body(&Attributes::new(planned))?;
        let integration = ctx.client.create_integration(&body).await?;
        Ok(self.state(&integration, planned))
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
        let body = self.body(&Attributes::new(planned))?;
        let integration = ctx.client.update_integration(&id, &body).await?;
        Ok(self.state(&integration, planned))
    }

    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError> {
        let id = Attributes::new(state).id()?;
        ctx.client.delete_integration(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_body_includes_headers() {
        let resource = NotificationIntegrationResource::new(NotificationKind::Webhook);
        let value = json!({
            "name": "hook",
            "url": "https://hooks.example.com/x",
            "shared_secret": "s3cr3t",
            "headers": [{"header_key": "X-Team", "header_value": "sre"}]
        });
        let body = resource.body(&Attributes::new(&value)).unwrap();

        assert_eq!(body.kind, "Webhook");
        assert!(body.enabled);
        assert_eq!(body.settings["headers"], json!({"X-Team": "sre"}));
        assert_eq!(body.settings["sharedSecret"], "s3cr3t");
    }

    #[test]
    fn secrets_are_kept_from_prior_state() {
        let resource = NotificationIntegrationResource::new(NotificationKind::Slack);
        let mut integration = Integration::new("Slack", "alerts", true);
        integration.id = Some("I1".to_string());
        let prior = json!({"webhook_url": "https://hooks.slack.com/x"});

        let state = resource.state(&integration, &prior);
        assert_eq!(state["webhook_url"], "https://hooks.slack.com/x");
        assert_eq!(state["id"], "I1");
    }

    #[test]
    fn rejects_bad_urls() {
        let resource = NotificationIntegrationResource::new(NotificationKind::Webhook);
        let diagnostics = resource.validate(&json!({"name": "hook", "url": "not a url"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("url"));
    }
}
