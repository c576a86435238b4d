//! `signalfx_slo`

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{Attributes, Resource};
use crate::client::{Notification, Slo, SloAlertRule, SloInputs, SloRule, SloTarget};
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Checks;

const TARGET_TYPES: &[&str] = &["RollingWindow", "CalendarWindow"];
const ALERT_RULE_TYPES: &[&str] = &["BREACH", "ERROR_BUDGET_LEFT", "BURN_RATE"];
const SEVERITIES: &[&str] = &["Critical", "Major", "Minor", "Warning", "Info"];
const CYCLE_TYPES: &[&str] = &["week", "month"];

/// Request-based service level objectives.
#[derive(Debug, Clone, Copy, Default)]
pub struct SloResource;

fn rule_block() -> Block {
    Block::new()
        .with_attribute("severity", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("disabled", Attribute::optional_bool().with_default(json!(false)))
        .with_attribute("notifications", Attribute::optional_string_list())
        .with_attribute(
            "fire_lasting",
            Attribute::optional_string().with_description("Duration the condition must hold, e.g. 5m"),
        )
        .with_attribute(
            "percent_error_budget_left",
            Attribute::optional_float64().with_description("ERROR_BUDGET_LEFT threshold"),
        )
}

fn rule_body(attrs: &Attributes<'_>) -> Result<SloRule, ProviderError> {
    let mut parameters = Map::new();
    if let Some(fire_lasting) = attrs.string("fire_lasting") {
        parameters.insert("fireLasting".to_string(), json!(fire_lasting));
    }
    if let Some(left) = attrs.float("percent_error_budget_left") {
        parameters.insert("percentErrorBudgetLeft".to_string(), json!(left));
    }
    Ok(SloRule {
        severity: attrs.required_string("severity")?,
        description: attrs.string("description"),
        disabled: attrs.bool("disabled"),
        notifications: Notification::parse_all(&attrs.strings("notifications"))?,
        parameters,
    })
}

fn slo_body(attrs: &Attributes<'_>) -> Result<Slo, ProviderError> {
    let input = attrs
        .block("input")
        .ok_or_else(|| ProviderError::Validation("an input block is required".to_string()))?;
    let targets = attrs
        .blocks("target")
        .iter()
        .map(|t| {
            let alert_rules = t
                .blocks("alert_rule")
                .iter()
                .map(|a| {
                    Ok(SloAlertRule {
                        kind: a.required_string("type")?,
                        rules: a
                            .blocks("rule")
                            .iter()
                            .map(rule_body)
                            .collect::<Result<Vec<_>, _>>()?,
                    })
                })
                .collect::<Result<Vec<_>, ProviderError>>()?;
            Ok(SloTarget {
                kind: t.required_string("type")?,
                slo: t.float("slo").unwrap_or_default(),
                compliance_period: t.string("compliance_period"),
                cycle_type: t.string("cycle_type"),
                cycle_start: t.string("cycle_start"),
                alert_rules,
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    Ok(Slo {
        id: None,
        name: attrs.required_string("name")?,
        description: attrs.string("description"),
        kind: attrs.string("type").unwrap_or_else(|| "RequestBased".to_string()),
        inputs: SloInputs {
            program_text: input.required_string("program_text")?,
            good_events_label: input.string("good_events_label"),
            total_events_label: input.string("total_events_label"),
        },
        targets,
    })
}

fn rule_state(rule: &SloRule) -> Value {
    json!({
        "severity": rule.severity,
        "description": rule.description,
        "disabled": rule.disabled,
        "notifications": rule.notifications.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "fire_lasting": rule.parameters.get("fireLasting"),
        "percent_error_budget_left": rule.parameters.get("percentErrorBudgetLeft"),
    })
}

fn slo_state(slo: &Slo) -> Value {
    let targets: Vec<Value> = slo
        .targets
        .iter()
        .map(|t| {
            let alert_rules: Vec<Value> = t
                .alert_rules
                .iter()
                .map(|a| {
                    json!({
                        "type": a.kind,
                        "rule": a.rules.iter().map(rule_state).collect::<Vec<_>>(),
                    })
                })
                .collect();
            json!({
                "type": t.kind,
                "slo": t.slo,
                "compliance_period": t.compliance_period,
                "cycle_type": t.cycle_type,
                "cycle_start": t.cycle_start,
                "alert_rule": alert_rules,
            })
        })
        .collect();

    json!({
        "id": slo.id,
        "name": slo.name,
        "description": slo.description,
        "type": slo.kind,
        "input": [{
            "program_text": slo.inputs.program_text,
            "good_events_label": slo.inputs.good_events_label,
            "total_events_label": slo.inputs.total_events_label,
        }],
        "target": targets,
    })
}

#[async_trait]
impl Resource for SloResource {
    fn type_name(&self) -> &'static str {
        "signalfx_slo"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A service level objective")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "type",
                Attribute::optional_string().with_default(json!("RequestBased")).with_force_new(),
            )
            .with_block(
                "input",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("program_text", Attribute::required_string())
                        .with_attribute("good_events_label", Attribute::optional_string())
                        .with_attribute("total_events_label", Attribute::optional_string()),
                )
                .with_min_items(1)
                .with_max_items(1),
            )
            .with_block(
                "target",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("type", Attribute::required_string())
                        .with_attribute("slo", Attribute::required_float64())
                        .with_attribute("compliance_period", Attribute::optional_string())
                        .with_attribute("cycle_type", Attribute::optional_string())
                        .with_attribute("cycle_start", Attribute::optional_string())
                        .with_block(
                            "alert_rule",
                            NestedBlock::list(
                                Block::new()
                                    .with_attribute("type", Attribute::required_string())
                                    .with_block(
                                        "rule",
                                        NestedBlock::list(rule_block()).with_min_items(1),
                                    ),
                            ),
                        ),
                )
                .with_min_items(1)
                .with_max_items(1),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let attrs = Attributes::new(config);
        let mut checks = Checks::new();
        checks
            .non_empty("name", attrs.raw("name").and_then(Value::as_str))
            .one_of("type", attrs.raw("type").and_then(Value::as_str), &["RequestBased"]);

        for (i, target) in attrs.blocks("target").iter().enumerate() {
            let path = |field: &str| format!("target[{}].{}", i, field);
            let kind = target.string("type");
            checks
                .one_of(&path("type"), kind.as_deref(), TARGET_TYPES)
                .float_range(&path("slo"), target.float("slo"), 0.0, 100.0)
                .one_of(&path("cycle_type"), target.string("cycle_type").as_deref(), CYCLE_TYPES);
            match kind.as_deref() {
                Some("RollingWindow") => {
                    checks.ensure(target.string("compliance_period").is_some(), || {
                        Diagnostic::error("Rolling window targets need a compliance_period")
                            .with_attribute(path("compliance_period"))
                    });
                },
                Some("CalendarWindow") => {
                    checks.ensure(target.string("cycle_type").is_some(), || {
                        Diagnostic::error("Calendar window targets need a cycle_type")
                            .with_attribute(path("cycle_type"))
                    });
                },
                _ => {},
            }

            for (j, alert) in target.blocks("alert_rule").iter().enumerate() {
                let alert_path = format!("target[{}].alert_rule[{}]", i, j);
                checks.one_of(
                    &format!("{}.type", alert_path),
                    alert.string("type").as_deref(),
                    ALERT_RULE_TYPES,
                );
                for (k, rule) in alert.blocks("rule").iter().enumerate() {
                    let rule_path = format!("{}.rule[{}]", alert_path, k);
                    checks
                        .one_of(
                            &format!("{}.severity", rule_path),
                            rule.string("severity").as_deref(),
                            SEVERITIES,
                        )
                        .float_range(
                            &format!("{}.percent_error_budget_left", rule_path),
                            rule.float("percent_error_budget_left"),
                            0.0,
                            100.0,
                        );
                    for (n, notification) in rule.strings("notifications").iter().enumerate() {
                        if let Err(err) = notification.parse::<Notification>() {
                            checks.ensure(false, || {
                                Diagnostic::error(err.message())
                                    .with_attribute(format!("{}.notifications[{}]", rule_path, n))
                            });
                        }
                    }
                }
            }
        }
        checks.into_diagnostics()
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError> {
        let body = slo_body(&Attributes::new(planned))?;
        let slo = ctx.client.create_slo(&body).await?;
        Ok(slo_state(&slo))
    }

    async fn read(&self, ctx: &ProviderContext, state: &Value) -> Result<Value, ProviderError> {
        let id = Attributes::new(state).id()?;
        let slo = ctx.client.get_slo(&id).await?;
        Ok(slo_state(&slo))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let id = Attributes::new(prior).id()?;
        let body = slo_body(&Attributes::new(planned))?;
        let slo = ctx.client.update_slo(&id, &body).await?;
        Ok(slo_state(&slo))
    }

    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError> {
        let id = Attributes::new(state).id()?;
        ctx.client.delete_slo(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Value {
        json!({
            "name": "checkout availability",
            "input": [{
                "program_text": "G = data('good').publish(label='G')\nT = data('total').publish(label='T')",
                "good_events_label": "G",
                "total_events_label": "T"
            }],
            "target": [{
                "type": "RollingWindow",
                "slo": 99.9,
                "compliance_period": "30d",
                "alert_rule": [{
                    "type": "BREACH",
                    "rule": [{"severity": "Critical", "notifications": ["Email,sre@example.com"]}]
                }]
            }]
        })
    }

    #[test]
    fn body_maps_nested_blocks() {
        let value = config();
        let slo = slo_body(&Attributes::new(&value)).unwrap();

        assert_eq!(slo.kind, "RequestBased");
        assert_eq!(slo.inputs.good_events_label.as_deref(), Some("G"));
        assert_eq!(slo.targets[0].compliance_period.as_deref(), Some("30d"));
        let rule = &slo.targets[0].alert_rules[0].rules[0];
        assert_eq!(rule.severity, "Critical");
        assert_eq!(rule.notifications.len(), 1);
        assert!(rule.parameters.is_empty());
    }

    #[test]
    fn state_mirrors_body() {
        let value = config();
        let mut slo = slo_body(&Attributes::new(&value)).unwrap();
        slo.id = Some("SLO1".to_string());

        let state = slo_state(&slo);
        assert_eq!(state["id"], "SLO1");
        assert_eq!(state["input"][0]["total_events_label"], "T");
        assert_eq!(
            state["target"][0]["alert_rule"][0]["rule"][0]["notifications"],
            json!(["Email,sre@example.com"])
        );
    }

    #[test]
    fn valid_config_passes() {
        assert!(SloResource.validate(&config()).is_empty());
    }

    #[test]
    fn window_requirements() {
        let mut value = config();
        value["target"][0]["compliance_period"] = Value::Null;
        value["target"][0]["slo"] = json!(120.0);
        let paths: Vec<_> = SloResource
            .validate(&value)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        assert_eq!(paths, vec!["target[0].slo", "target[0].compliance_period"]);

        let mut value = config();
        value["target"][0]["type"] = json!("CalendarWindow");
        let paths: Vec<_> = SloResource
            .validate(&value)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        assert_eq!(paths, vec!["target[0].cycle_type"]);
    }
}
