//! `signalfx_org_token`

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{carry_over, Attributes, Resource};
use crate::client::{Notification, OrgToken, TokenLimits};
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Checks;

const AUTH_SCOPES: &[&str] = &["API", "INGEST", "RUM"];

/// Organization access tokens. The name doubles as the id.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrgTokenResource;

fn token_body(attrs: &Attributes<'_>) -> Result<OrgToken, ProviderError> {
    let limits = attrs.block("dpm_limits").map(|l| TokenLimits {
        dpm_quota: l.int("dpm_limit"),
        dpm_notification_threshold: l.int("dpm_notification_threshold"),
    });
    Ok(OrgToken {
        name: attrs.required_string("name")?,
        description: attrs.string("description"),
        disabled: attrs.bool("disabled"),
        auth_scopes: attrs.strings("auth_scopes"),
        notifications: Notification::parse_all(&attrs.strings("notifications"))?,
        limits,
        secret: None,
    })
}

fn token_state(token: &OrgToken, prior: &Value) -> Value {
    let limits: Vec<Value> = token
        .limits
        .iter()
        .filter(|l| l.dpm_quota.is_some())
        .map(|l| {
            json!({
                "dpm_limit": l.dpm_quota,
                "dpm_notification_threshold": l.dpm_notification_threshold,
            })
        })
        .collect();
    let mut state = json!({
        "id": token.name,
        "name": token.name,
        "description": token.description,
        "disabled": token.disabled,
        "auth_scopes": token.auth_scopes,
        "notifications": token.notifications.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "dpm_limits": limits,
        "secret": token.secret,
    });
    carry_over(&mut state, prior, &["secret"]);
    state
}

#[async_trait]
impl Resource for OrgTokenResource {
    fn type_name(&self) -> &'static str {
        "signalfx_org_token"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("An organization access token")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("disabled", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute(
                "auth_scopes",
                Attribute::optional_string_set().with_description("API, INGEST and/or RUM"),
            )
            .with_attribute(
                "notifications",
                Attribute::optional_string_list()
                    .with_description("Who to notify when a limit is approached"),
            )
            .with_attribute("secret", Attribute::computed_string().sensitive())
            .with_block(
                "dpm_limits",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("dpm_limit", Attribute::required_int64())
                        .with_attribute("dpm_notification_threshold", Attribute::optional_int64()),
                )
                .with_max_items(1),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let attrs = Attributes::new(config);
        let mut checks = Checks::new();
        checks.non_empty("name", attrs.raw("name").and_then(Value::as_str));
        for (i, scope) in attrs.strings("auth_scopes").iter().enumerate() {
            checks.one_of(&format!("auth_scopes[{}]", i), Some(scope.as_str()), AUTH_SCOPES);
        }
        for (i, notification) in attrs.strings("notifications").iter().enumerate() {
            if let Err(err) = notification.parse::<Notification>() {
                checks.ensure(false, || {
                    Diagnostic::error(err.message()).with_attribute(format!("notifications[{}]", i))
                });
            }
        }
        if let Some(limits) = attrs.block("dpm_limits") {
            let limit = limits.int("dpm_limit");
            checks
                .int_range("dpm_limits.dpm_limit", limit, 1, i64::MAX)
                .int_range(
                    "dpm_limits.dpm_notification_threshold",
                    limits.int("dpm_notification_threshold"),
                    1,
                    limit.unwrap_or(i64::MAX),
                );
        }
        checks.into_diagnostics()
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError> {
        let body = token_body(&Attributes::new(planned))?;
        let token = ctx.client.create_org_token(&body).await?;
        Ok(token_state(&token, planned))
    }

    async fn read(&self, ctx: &ProviderContext, state: &Value) -> Result<Value, ProviderError> {
        let name = Attributes::new(state).id()?;
        let token = ctx.client.get_org_token(&name).await?;
        Ok(token_state(&token, state))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let name = Attributes::new(prior).id()?;
        let body = token_body(&Attributes::new(planned))?;
        let token = ctx.client.update_org_token(&name, &body).await?;
        Ok(token_state(&token, prior))
    }

    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError> {
        let name = Attributes::new(state).id()?;
        ctx.client.delete_org_token(&name).await
    }
}
