//! Configuration validation.
//!
//! Two layers run on every `ValidateResourceConfig` call:
//!
//! - [`validate`] checks a JSON value against a [`Schema`]: required
//!   attributes, attribute types and nested block cardinality.
//! - [`Checks`] collects resource-specific value checks (enumerations,
//!   ranges) that a schema cannot express.
//!
//! ```
//! use signalfx_provider::schema::{Schema, Attribute};
//! use signalfx_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("max_precision", Attribute::optional_int64());
//!
//! assert!(validate(&schema, &json!({"name": "cpu", "max_precision": 3})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "cpu", "max_precision": "three"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("max_precision".to_string()));
//! ```

use crate::schema::{AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Validate a JSON value against a schema.
///
/// Returns one diagnostic per problem; an empty list means the value is valid.
/// Computed-only attributes are skipped since the provider sets them.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut walker = Walker::default();
    walker.block(&schema.block, value, "");
    walker.diagnostics
}

/// Paths read `target[0].alert_rule[1].type`, the same form resource checks use.
fn field(parent: &str, name: &str) -> String {
    match parent {
        "" => name.to_string(),
        _ => format!("{}.{}", parent, name),
    }
}

fn element(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn whole_number(value: &Value) -> bool {
    let Value::Number(n) = value else {
        return false;
    };
    n.is_i64() || n.as_f64().is_some_and(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
}

#[derive(Default)]
struct Walker {
    diagnostics: Vec<Diagnostic>,
}

impl Walker {
    fn report(&mut self, path: &str, summary: String, detail: Option<String>) {
        let mut diagnostic = Diagnostic::error(summary);
        if let Some(detail) = detail {
            diagnostic = diagnostic.with_detail(detail);
        }
        if !path.is_empty() {
            diagnostic = diagnostic.with_attribute(path);
        }
        self.diagnostics.push(diagnostic);
    }

    fn wrong_type(&mut self, path: &str, wanted: &str, value: &Value) {
        self.report(
            path,
            format!("{} has the wrong type", path),
            Some(format!("wanted {}, found {}", wanted, kind(value))),
        );
    }

    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let map = match value {
            Value::Null => return,
            Value::Object(map) => map,
            other => {
                let at = if path.is_empty() { "configuration" } else { path };
                self.report(
                    path,
                    format!("{} must be an object", at),
                    Some(format!("found {}", kind(other))),
                );
                return;
            },
        };

        for (name, attribute) in &block.attributes {
            if attribute.flags.is_computed_only() {
                continue;
            }
            let path = field(path, name);
            match map.get(name).filter(|v| !v.is_null()) {
                Some(v) => self.value(&attribute.attr_type, v, &path),
                None if attribute.flags.required => {
                    self.report(&path, format!("{} is required", path), None);
                },
                None => {},
            }
        }

        for (name, nested) in &block.blocks {
            self.nested(nested, map.get(name), &field(path, name));
        }
    }

    fn value(&mut self, expected: &AttributeType, value: &Value, path: &str) {
        match expected {
            AttributeType::Dynamic => {},
            AttributeType::String if !value.is_string() => self.wrong_type(path, "a string", value),
            AttributeType::Int64 if !whole_number(value) => self.wrong_type(path, "an integer", value),
            AttributeType::Float64 if !value.is_number() => self.wrong_type(path, "a number", value),
            AttributeType::Bool if !value.is_boolean() => self.wrong_type(path, "a bool", value),
            AttributeType::String | AttributeType::Int64 | AttributeType::Float64 | AttributeType::Bool => {},
            AttributeType::List(inner) | AttributeType::Set(inner) => match value {
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.value(inner, item, &element(path, i));
                    }
                },
                other => {
                    let wanted = match expected {
                        AttributeType::Set(_) => "a set",
                        _ => "a list",
                    };
                    self.wrong_type(path, wanted, other);
                },
            },
            AttributeType::Map(inner) => match value {
                Value::Object(entries) => {
                    for (key, item) in entries {
                        self.value(inner, item, &field(path, key));
                    }
                },
                other => self.wrong_type(path, "a map", other),
            },
            AttributeType::Object(members) => match value {
                Value::Object(map) => self.members(members, map, path),
                other => self.wrong_type(path, "an object", other),
            },
        }
    }

    // Object members carry no presence flags; only types are checked.
    fn members(&mut self, members: &BTreeMap<String, AttributeType>, map: &Map<String, Value>, path: &str) {
        for (name, expected) in members {
            if let Some(v) = map.get(name) {
                self.value(expected, v, &field(path, name));
            }
        }
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            self.count(nested, 0, path);
            return;
        };

        match (nested.nesting_mode, value) {
            // Hosts may encode a single block as a one-element list.
            (BlockNestingMode::Single, Value::Array(items)) if items.len() <= 1 => {
                if let Some(item) = items.first() {
                    self.block(&nested.block, item, path);
                }
            },
            (BlockNestingMode::Single, item) => self.block(&nested.block, item, path),
            (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(items)) => {
                self.count(nested, items.len(), path);
                for (i, item) in items.iter().enumerate() {
                    self.block(&nested.block, item, &element(path, i));
                }
            },
            (BlockNestingMode::Map, Value::Object(entries)) => {
                self.count(nested, entries.len(), path);
                for (key, item) in entries {
                    self.block(&nested.block, item, &field(path, key));
                }
            },
            (BlockNestingMode::Map, other) => self.wrong_type(path, "a map of blocks", other),
            (_, other) => self.wrong_type(path, "a list of blocks", other),
        }
    }

    fn count(&mut self, nested: &NestedBlock, found: usize, path: &str) {
        let found = u32::try_from(found).unwrap_or(u32::MAX);
        if found < nested.min_items {
            self.report(
                path,
                format!("{} needs at least {} block(s)", path, nested.min_items),
                Some(format!("found {}", found)),
            );
        }
        // A max of zero is unbounded.
        if nested.max_items != 0 && found > nested.max_items {
            self.report(
                path,
                format!("{} takes at most {} block(s)", path, nested.max_items),
                Some(format!("found {}", found)),
            );
        }
    }
}

/// Collector for value checks that go beyond the schema.
///
/// Every check ignores absent values; presence is the schema's job.
#[derive(Debug, Default)]
pub struct Checks {
    diagnostics: Vec<Diagnostic>,
}

impl Checks {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value must be one of `allowed`.
    pub fn one_of(&mut self, path: &str, value: Option<&str>, allowed: &[&str]) -> &mut Self {
        if let Some(v) = value {
            if !allowed.contains(&v) {
                self.diagnostics.push(
                    Diagnostic::error(format!("Invalid value for '{}'", path))
                        .with_detail(format!(
                            "Got \"{}\", expected one of: {}",
                            v,
                            allowed.join(", ")
                        ))
                        .with_attribute(path),
                );
            }
        }
        self
    }

    /// The value must be within `[min, max]`.
    pub fn int_range(&mut self, path: &str, value: Option<i64>, min: i64, max: i64) -> &mut Self {
        if let Some(v) = value {
            if v < min || v > max {
                self.diagnostics.push(
                    Diagnostic::error(format!("Value out of range for '{}'", path))
                        .with_detail(format!("Got {}, expected {} to {}", v, min, max))
                        .with_attribute(path),
                );
            }
        }
        self
    }

    /// The value must be within `[min, max]`.
    pub fn float_range(&mut self, path: &str, value: Option<f64>, min: f64, max: f64) -> &mut Self {
        if let Some(v) = value {
            if v < min || v > max {
                self.diagnostics.push(
                    Diagnostic::error(format!("Value out of range for '{}'", path))
                        .with_detail(format!("Got {}, expected {} to {}", v, min, max))
                        .with_attribute(path),
                );
            }
        }
        self
    }

    /// The string must not be empty or whitespace.
    pub fn non_empty(&mut self, path: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            if v.trim().is_empty() {
                self.diagnostics.push(
                    Diagnostic::error(format!("'{}' must not be empty", path)).with_attribute(path),
                );
            }
        }
        self
    }

    /// Record an arbitrary failure when `ok` is false.
    pub fn ensure(&mut self, ok: bool, diagnostic: impl FnOnce() -> Diagnostic) -> &mut Self {
        if !ok {
            self.diagnostics.push(diagnostic());
        }
        self
    }

    /// Append diagnostics produced elsewhere.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> &mut Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    /// Consume the collector.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn required_attributes() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "latency"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "name has the wrong type");
        assert_eq!(diagnostics[0].detail.as_deref(), Some("wanted a string, found a number"));
    }

    #[test]
    fn computed_attributes_are_ignored() {
        let schema = Schema::v0().with_attribute("secret", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"secret": 123})).is_empty());
    }

    #[test]
    fn integers_accept_whole_floats() {
        let schema = Schema::v0().with_attribute("poll_rate", Attribute::required_int64());

        assert!(validate(&schema, &json!({"poll_rate": 300})).is_empty());
        assert!(validate(&schema, &json!({"poll_rate": 300.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"poll_rate": 300.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"poll_rate": "300"})).len(), 1);
    }

    #[test]
    fn set_elements_are_checked() {
        let schema = Schema::v0().with_attribute(
            "auth_scopes",
            Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::OPTIONAL),
        );

        assert!(validate(&schema, &json!({"auth_scopes": ["API", "INGEST"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"auth_scopes": ["API", 7]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("auth_scopes[1]".to_string()));

        let diagnostics = validate(&schema, &json!({"auth_scopes": "API"}));
        assert!(diagnostics[0].detail.as_deref().unwrap_or_default().contains("set"));
    }

    #[test]
    fn map_values_are_checked() {
        let schema = Schema::v0().with_attribute(
            "feature_preview",
            Attribute::optional_bool_map(),
        );

        assert!(validate(&schema, &json!({"feature_preview": {"beta_charts": true}})).is_empty());

        let diagnostics = validate(&schema, &json!({"feature_preview": {"beta_charts": "yes"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("feature_preview.beta_charts".to_string())
        );
    }

    #[test]
    fn single_block_as_object_or_list() {
        let schema = Schema::v0().with_block(
            "input",
            NestedBlock::single(Block::new().with_attribute("program_text", Attribute::required_string()))
                .with_min_items(1),
        );

        assert!(validate(&schema, &json!({"input": {"program_text": "A"}})).is_empty());
        assert!(validate(&schema, &json!({"input": [{"program_text": "A"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "input needs at least 1 block(s)");

        let diagnostics = validate(&schema, &json!({"input": {"program_text": 1}}));
        assert_eq!(diagnostics[0].attribute, Some("input.program_text".to_string()));
    }

    #[test]
    fn block_lists() {
        let schema = Schema::v0().with_block(
            "chart",
            NestedBlock::list(Block::new().with_attribute("chart_id", Attribute::required_string()))
                .with_max_items(2),
        );

        assert!(validate(&schema, &json!({"chart": [{"chart_id": "A"}]})).is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"chart": [{"chart_id": "A"}, {"chart_id": "B"}, {"chart_id": "C"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("found 3"));

        let diagnostics = validate(&schema, &json!({"chart": [{"chart_id": 5}]}));
        assert_eq!(diagnostics[0].attribute, Some("chart[0].chart_id".to_string()));

        let diagnostics = validate(&schema, &json!({"chart": "A"}));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("wanted a list of blocks, found a string"));
    }

    #[test]
    fn paths_match_resource_checks() {
        let schema = Schema::v0().with_block(
            "target",
            NestedBlock::single(
                Block::new().with_attribute("slo", Attribute::required_float64()).with_block(
                    "alert_rule",
                    NestedBlock::list(Block::new().with_attribute("type", Attribute::required_string())),
                ),
            ),
        );

        let diagnostics = validate(
            &schema,
            &json!({"target": {"slo": 99.9, "alert_rule": [{"type": 1}]}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("target.alert_rule[0].type".to_string())
        );
    }

    #[test]
    fn root_must_be_an_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "configuration must be an object");
        assert!(diagnostics[0].attribute.is_none());
        assert!(!validate(&schema, &json!([])).is_empty());
        assert!(validate(&schema, &json!({"name": "x"})).is_empty());
    }

    #[test]
    fn value_checks() {
        let mut checks = Checks::new();
        checks
            .one_of("plot_type", Some("PieChart"), &["LineChart", "AreaChart"])
            .one_of("unit_prefix", None, &["Metric", "Binary"])
            .int_range("width", Some(13), 1, 12)
            .int_range("height", Some(1), 1, 100)
            .float_range("slo", Some(100.5), 0.0, 100.0)
            .non_empty("name", Some("  "))
            .ensure(true, || Diagnostic::error("never"));

        let diagnostics = checks.into_diagnostics();
        let paths: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(paths, vec!["plot_type", "width", "slo", "name"]);
    }
}
