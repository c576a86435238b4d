//! Plan computation shared by all resources.
//!
//! Compares prior state with the proposed configuration attribute by
//! attribute. Absent, `null` and empty collections compare equal: the API
//! returns empty lists where the configuration left a field unset, and that
//! must not show up as a perpetual diff.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Plan a create, update or destroy.
///
/// - `prior == None`: create. Every set attribute is an added change.
/// - `proposed == null`: destroy. Every set prior attribute is removed.
/// - otherwise: update. Computed attributes the proposal leaves empty carry
///   over from prior state unless the change forces replacement. An
///   optional+computed attribute the proposal sets is diffed like any other.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    if proposed.is_null() {
        return plan_destroy(prior);
    }

    let mut planned = proposed.clone();
    schema.block.apply_defaults(&mut planned);

    let Some(prior) = prior.filter(|p| !p.is_null()) else {
        let changes = attribute_names(schema, None, &planned)
            .into_iter()
            .filter_map(|name| {
                let value = normalized(planned.get(&name));
                (!value.is_null()).then(|| AttributeChange::added(name, value))
            })
            .collect();
        return PlanResult::with_changes(planned, changes, false);
    };

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for name in attribute_names(schema, Some(prior), &planned) {
        let flags = schema.block.attributes.get(&name).map(|attr| attr.flags);
        let after = normalized(planned.get(&name));
        match flags {
            Some(flags) if flags.is_computed_only() => continue,
            // Left unset, an optional+computed value keeps what the API reported.
            Some(flags) if flags.computed && after.is_null() => continue,
            _ => {},
        }
        let before = normalized(prior.get(&name));
        if before != after {
            requires_replace |= schema.is_force_new(&name);
            changes.push(AttributeChange::new(
                name,
                (!before.is_null()).then_some(before),
                (!after.is_null()).then_some(after),
            ));
        }
    }

    if let Value::Object(obj) = &mut planned {
        for (name, attr) in &schema.block.attributes {
            if !attr.flags.computed {
                continue;
            }
            let proposed_empty = normalized(obj.get(name)).is_null();
            if requires_replace && attr.flags.is_computed_only() {
                obj.insert(name.clone(), Value::Null);
            } else if proposed_empty {
                if let Some(prior_value) = prior.get(name).filter(|v| !v.is_null()) {
                    obj.insert(name.clone(), prior_value.clone());
                }
            }
        }
    }

    PlanResult::with_changes(planned, changes, requires_replace)
}

fn plan_destroy(prior: Option<&Value>) -> PlanResult {
    let changes = prior
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn attribute_names(schema: &Schema, prior: Option<&Value>, planned: &Value) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = schema
        .block
        .attributes
        .keys()
        .chain(schema.block.blocks.keys())
        .cloned()
        .collect();
    for value in prior.into_iter().chain(std::iter::once(planned)) {
        if let Some(obj) = value.as_object() {
            names.extend(obj.keys().cloned());
        }
    }
    names
}

fn normalized(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::Null,
        Some(Value::Array(a)) if a.is_empty() => Value::Null,
        Some(Value::Object(o)) if o.is_empty() => Value::Null,
        Some(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn dashboard_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("url", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("dashboard_group", Attribute::required_string().with_force_new())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("charts_resolution", Attribute::optional_string().with_default(json!("default")))
    }

    #[test]
    fn create_lists_set_attributes_and_defaults() {
        let plan = plan_resource(
            &dashboard_schema(),
            None,
            &json!({"name": "Hosts", "dashboard_group": "G1", "description": null}),
        );

        assert!(!plan.requires_replace);
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["charts_resolution", "dashboard_group", "name"]);
        assert_eq!(plan.planned_state["charts_resolution"], "default");
    }

    #[test]
    fn update_carries_computed_attributes() {
        let prior = json!({
            "id": "D1", "url": "https://app/#/dashboard/D1",
            "name": "Hosts", "dashboard_group": "G1", "charts_resolution": "default"
        });
        let plan = plan_resource(
            &dashboard_schema(),
            Some(&prior),
            &json!({"name": "All hosts", "dashboard_group": "G1"}),
        );

        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "name");
        assert_eq!(plan.planned_state["id"], "D1");
        assert_eq!(plan.planned_state["url"], "https://app/#/dashboard/D1");
    }

    #[test]
    fn optional_computed_edits_are_planned() {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("external_id", Attribute::optional_computed_string());
        let prior = json!({"id": "AWS1", "name": "prod", "external_id": "old-ext"});

        let plan = plan_resource(&schema, Some(&prior), &json!({"name": "prod", "external_id": "new-ext"}));
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0], AttributeChange::modified("external_id", json!("old-ext"), json!("new-ext")));
        assert_eq!(plan.planned_state["external_id"], "new-ext");
        assert_eq!(plan.planned_state["id"], "AWS1");

        let plan = plan_resource(&schema, Some(&prior), &json!({"name": "prod"}));
        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state["external_id"], "old-ext");
    }

    #[test]
    fn force_new_change_requires_replace_and_clears_computed() {
        let prior = json!({"id": "D1", "name": "Hosts", "dashboard_group": "G1"});
        let plan = plan_resource(
            &dashboard_schema(),
            Some(&prior),
            &json!({"name": "Hosts", "dashboard_group": "G2"}),
        );

        assert!(plan.requires_replace);
        assert!(plan.planned_state["id"].is_null());
    }

    #[test]
    fn empty_collections_equal_absent() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("teams", Attribute::optional_string_list());
        let prior = json!({"name": "Ops", "teams": []});

        let plan = plan_resource(&schema, Some(&prior), &json!({"name": "Ops"}));
        assert!(!plan.has_changes());
    }

    #[test]
    fn destroy_removes_everything() {
        let prior = json!({"id": "D1", "name": "Hosts", "description": null});
        let plan = plan_resource(&dashboard_schema(), Some(&prior), &Value::Null);

        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }
}
