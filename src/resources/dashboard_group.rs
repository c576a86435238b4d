//! `signalfx_dashboard_group`

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Attributes, Resource};
use crate::client::{DashboardConfig, DashboardGroup};
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::reconcile::{diff_lists, reconcile_dashboard_configs};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// Dashboard groups with mirrored dashboards.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardGroupResource;

fn desired_configs(attrs: &Attributes<'_>) -> Result<Vec<DashboardConfig>, ProviderError> {
    attrs
        .blocks("dashboard")
        .iter()
        .map(|block| {
            Ok(DashboardConfig {
                config_id: None,
                dashboard_id: block.required_string("dashboard_id")?,
                name_override: block.string("name_override"),
                description_override: block.string("description_override"),
            })
        })
        .collect()
}

fn group_body(attrs: &Attributes<'_>) -> Result<DashboardGroup, ProviderError> {
    Ok(DashboardGroup {
        id: None,
        name: attrs.required_string("name")?,
        description: attrs.string("description"),
        teams: attrs.strings("teams"),
        dashboards: Vec::new(),
        dashboard_configs: Vec::new(),
    })
}

/// Dashboards shown as `dashboard` blocks.
///
/// The API lists a config for every dashboard in the group, owned ones
/// included. Only configs that were declared before, or that carry an
/// override, are tracked; on import everything is.
fn tracked_configs<'c>(
    configs: &'c [DashboardConfig],
    prior: Option<&[String]>,
) -> Vec<&'c DashboardConfig> {
    configs
        .iter()
        .filter(|c| match prior {
            None => true,
            Some(ids) => {
                ids.contains(&c.dashboard_id)
                    || c.name_override.is_some()
                    || c.description_override.is_some()
            },
        })
        .collect()
}

fn declared_ids(state: &Value) -> Vec<String> {
    Attributes::new(state)
        .blocks("dashboard")
        .iter()
        .filter_map(|b| b.string("dashboard_id"))
        .collect()
}

/// Same dashboards with the same overrides, in the same order.
fn mirrors_match(current: &[&DashboardConfig], desired: &[DashboardConfig]) -> bool {
    current.len() == desired.len()
        && current.iter().zip(desired).all(|(have, want)| {
            have.dashboard_id == want.dashboard_id
                && have.name_override == want.name_override
                && have.description_override == want.description_override
        })
}

fn same_fields(body: &DashboardGroup, current: &DashboardGroup) -> bool {
    let sorted = |teams: &[String]| {
        let mut teams = teams.to_vec();
        teams.sort();
        teams
    };
    body.name == current.name
        && body.description == current.description
        && sorted(&body.teams) == sorted(&current.teams)
}

fn group_state(ctx: &ProviderContext, group: &DashboardGroup, prior: &Value) -> Value {
    let id = group.id.clone().unwrap_or_default();
    let prior_ids = declared_ids(prior);
    let importing = prior.get("name").is_none();
    let prior_ids = (!importing).then_some(prior_ids.as_slice());

    let dashboards: Vec<Value> = tracked_configs(&group.dashboard_configs, prior_ids)
        .into_iter()
        .map(|c| {
            json!({
                "dashboard_id": c.dashboard_id,
                "name_override": c.name_override,
                "description_override": c.description_override,
                "config_id": c.config_id,
            })
        })
        .collect();

    json!({
        "id": id,
        "url": ctx.app_link("dashboardgroup", &id),
        "name": group.name,
        "description": group.description,
        "teams": group.teams,
        "dashboards": group.dashboards,
        "dashboard": dashboards,
    })
}

#[async_trait]
impl Resource for DashboardGroupResource {
    fn type_name(&self) -> &'static str {
        "signalfx_dashboard_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A group of dashboards, optionally mirroring dashboards from other groups")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("url", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "teams",
                Attribute::optional_string_set().with_description("Team ids to link the group to"),
            )
            .with_attribute(
                "dashboards",
                Attribute::computed_string_list().with_description("Every dashboard in the group"),
            )
            .with_block(
                "dashboard",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("dashboard_id", Attribute::required_string())
                        .with_attribute("name_override", Attribute::optional_string())
                        .with_attribute("description_override", Attribute::optional_string())
                        .with_attribute("config_id", Attribute::computed_string()),
                ),
            )
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError> {
        let attrs = Attributes::new(planned);
        let desired = desired_configs(&attrs)?;

        let mut group = ctx.client.create_dashboard_group(&group_body(&attrs)?).await?;
        let id = group.id.clone().unwrap_or_default();
        debug!(id = %id, mirrors = desired.len(), "Created dashboard group");

        if !desired.is_empty() {
            let mut body = group_body(&attrs)?;
            body.dashboard_configs = reconcile_dashboard_configs(&group.dashboard_configs, &desired);
            group = ctx.client.update_dashboard_group(&id, &body).await?;
        }
        Ok(group_state(ctx, &group, planned))
    }

    async fn read(&self, ctx: &ProviderContext, state: &Value) -> Result<Value, ProviderError> {
        let id = Attributes::new(state).id()?;
        let group = ctx.client.get_dashboard_group(&id).await?;
        Ok(group_state(ctx, &group, state))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let id = Attributes::new(prior).id()?;
        let attrs = Attributes::new(planned);
        let desired = desired_configs(&attrs)?;

        let current = ctx.client.get_dashboard_group(&id).await?;
        let prior_ids = declared_ids(prior);
        let tracked = tracked_configs(&current.dashboard_configs, Some(prior_ids.as_slice()));
        let before: Vec<&str> = tracked.iter().map(|c| c.dashboard_id.as_str()).collect();
        let after: Vec<&str> = desired.iter().map(|c| c.dashboard_id.as_str()).collect();
        let diff = diff_lists(&before, &after);
        debug!(
            id = %id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            kept = diff.kept.len(),
            "Reconciling mirrored dashboards"
        );

        let mut body = group_body(&attrs)?;
        if diff.is_unchanged() && mirrors_match(&tracked, &desired) && same_fields(&body, &current) {
            debug!(id = %id, "Dashboard group already matches, skipping update");
            return Ok(group_state(ctx, &current, planned));
        }
        body.dashboard_configs = reconcile_dashboard_configs(&current.dashboard_configs, &desired);
        let group = ctx.client.update_dashboard_group(&id, &body).await?;
        Ok(group_state(ctx, &group, planned))
    }

    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError> {
        let id = Attributes::new(state).id()?;
        ctx.client.delete_dashboard_group(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dashboard: &str, name: Option<&str>) -> DashboardConfig {
        DashboardConfig {
            config_id: Some(format!("CFG-{}", dashboard)),
            dashboard_id: dashboard.to_string(),
            name_override: name.map(str::to_string),
            description_override: None,
        }
    }

    #[test]
    fn tracks_declared_and_overridden_configs() {
        let configs = vec![config("OWN", None), config("D1", None), config("D2", Some("Mirror"))];
        let prior = vec!["D1".to_string()];

        let tracked: Vec<_> = tracked_configs(&configs, Some(prior.as_slice()))
            .into_iter()
            .map(|c| c.dashboard_id.as_str())
            .collect();
        assert_eq!(tracked, vec!["D1", "D2"]);

        assert_eq!(tracked_configs(&configs, None).len(), 3);
    }

    #[test]
    fn mirror_comparison() {
        let current = vec![config("D1", None), config("D2", Some("Mirror"))];
        let tracked: Vec<&DashboardConfig> = current.iter().collect();
        let mut desired = current.clone();
        for d in &mut desired {
            d.config_id = None;
        }
        assert!(mirrors_match(&tracked, &desired));
        assert!(!mirrors_match(&tracked, &desired[1..]));

        desired.reverse();
        assert!(!mirrors_match(&tracked, &desired));

        desired.reverse();
        desired[1].name_override = Some("Renamed".to_string());
        assert!(!mirrors_match(&tracked, &desired));
    }

    #[test]
    fn desired_configs_require_dashboard_id() {
        let value = json!({"dashboard": [{"name_override": "x"}]});
        assert!(desired_configs(&Attributes::new(&value)).is_err());

        let value = json!({"dashboard": [{"dashboard_id": "D1", "name_override": "x"}]});
        let configs = desired_configs(&Attributes::new(&value)).unwrap();
        assert_eq!(configs[0].name_override.as_deref(), Some("x"));
        assert!(configs[0].config_id.is_none());
    }
}
