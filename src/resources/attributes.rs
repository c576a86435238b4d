//! Typed access to attribute maps sent by the host.

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Read-only view over a JSON object of attributes.
///
/// `null`, absent and wrongly typed values all read as unset; the schema
/// validator has already reported type errors by the time resources run.
#[derive(Debug, Clone, Copy)]
pub struct Attributes<'a> {
    value: &'a Value,
}

impl<'a> Attributes<'a> {
    /// Wrap a state or config value.
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// The raw value of `key`, if set.
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.value.get(key).filter(|v| !v.is_null())
    }

    /// A non-empty string.
    pub fn string(&self, key: &str) -> Option<String> {
        self.raw(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// A string that must be present.
    pub fn required_string(&self, key: &str) -> Result<String, ProviderError> {
        self.string(key)
            .ok_or_else(|| ProviderError::Validation(format!("'{}' is required", key)))
    }

    /// An integer.
    pub fn int(&self, key: &str) -> Option<i64> {
        self.raw(key).and_then(Value::as_i64)
    }

    /// A float. Integers are widened.
    pub fn float(&self, key: &str) -> Option<f64> {
        self.raw(key).and_then(Value::as_f64)
    }

    /// A boolean, `false` when unset.
    pub fn bool(&self, key: &str) -> bool {
        self.bool_or(key, false)
    }

    /// A boolean with an explicit default.
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.raw(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// A list or set of strings. Non-string items are skipped.
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.raw(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A map of strings.
    pub fn string_map(&self, key: &str) -> Map<String, Value> {
        self.raw(key)
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| v.is_string())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every instance of nested block `key`. A single object counts as one.
    pub fn blocks(&self, key: &str) -> Vec<Attributes<'a>> {
        match self.raw(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| item.is_object())
                .map(Attributes::new)
                .collect(),
            Some(obj @ Value::Object(_)) => vec![Attributes::new(obj)],
            _ => Vec::new(),
        }
    }

    /// The first instance of nested block `key`.
    pub fn block(&self, key: &str) -> Option<Attributes<'a>> {
        self.blocks(key).into_iter().next()
    }

    /// The `id` attribute of a resource state.
    pub fn id(&self) -> Result<String, ProviderError> {
        self.string("id")
            .ok_or_else(|| ProviderError::Validation("resource state has no id".to_string()))
    }
}

/// Copy `keys` from `from` into `state` where `state` has no value.
///
/// Used for write-only inputs the API never returns.
pub fn carry_over(state: &mut Value, from: &Value, keys: &[&str]) {
    let Value::Object(obj) = state else {
        return;
    };
    for key in keys {
        let missing = obj.get(*key).map_or(true, Value::is_null);
        if let Some(prior) = from.get(*key).filter(|v| !v.is_null()) {
            if missing {
                obj.insert((*key).to_string(), prior.clone());
            }
        }
    }
}

/// `Some(vec)` unless empty.
pub fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}
