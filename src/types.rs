//! Values passed between the gRPC layer and [`crate::provider`].

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generated as pb;

/// The plugin protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "PROVIDER_PLUGIN";

/// `PROVIDER_PLUGIN|1|<addr>`, printed once the listener is bound.
pub fn handshake_line(addr: &SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}

/// One top-level attribute or block that a plan touches. `before` is `None`
/// on create, `after` is `None` on destroy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute or block name.
    pub path: String,
    /// Value in prior state.
    pub before: Option<Value>,
    /// Value in the planned state.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// A change of `path` from `before` to `after`.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// `path` becomes set.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// `path` goes away.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// `path` changes value.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

// Absent sides travel as empty byte strings.
impl From<AttributeChange> for pb::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        let bytes = |v: Option<Value>| v.and_then(|v| serde_json::to_vec(&v).ok()).unwrap_or_default();
        Self {
            path: change.path,
            before: bytes(change.before),
            after: bytes(change.after),
        }
    }
}

impl From<pb::AttributeChange> for AttributeChange {
    fn from(proto: pb::AttributeChange) -> Self {
        let value = |b: &[u8]| (!b.is_empty()).then(|| serde_json::from_slice(b).ok()).flatten();
        Self {
            before: value(&proto.before),
            after: value(&proto.after),
            path: proto.path,
        }
    }
}

/// What `Plan` answers: the state to apply and how it differs from prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State after apply; `null` when destroying.
    pub planned_state: Value,
    /// Per-attribute differences.
    pub changes: Vec<AttributeChange>,
    /// Apply must delete and re-create.
    pub requires_replace: bool,
}

impl PlanResult {
    /// `state` stays as it is.
    pub fn no_change(state: Value) -> Self {
        Self::with_changes(state, Vec::new(), false)
    }

    /// A plan towards `planned_state`.
    pub fn with_changes(planned_state: Value, changes: Vec<AttributeChange>, requires_replace: bool) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether apply would do anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// State recovered by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// e.g. `signalfx_dashboard`.
    pub resource_type: String,
    /// As a read would return it.
    pub state: Value,
}

impl ImportedResource {
    /// `state` of type `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// What `GetMetadata` answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Optional protocol features.
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features the provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// `Plan` is also called for destroys.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn changes_cross_the_wire() {
        let change = AttributeChange::modified("name", json!("old"), json!("new"));
        let proto = pb::AttributeChange::from(change.clone());
        assert_eq!(proto.path, "name");
        assert_eq!(proto.before, b"\"old\"".to_vec());
        assert_eq!(AttributeChange::from(proto), change);

        let proto = pb::AttributeChange::from(AttributeChange::added("description", json!("cpu")));
        assert!(proto.before.is_empty());
        let back = AttributeChange::from(proto);
        assert!(back.before.is_none());
        assert_eq!(back.after, Some(json!("cpu")));
    }

    #[test]
    fn plan_results() {
        assert!(!PlanResult::no_change(json!({"id": "D1"})).has_changes());
        let plan = PlanResult::with_changes(
            json!({"id": "D1", "name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
            false,
        );
        assert!(plan.has_changes());
        assert!(!plan.requires_replace);
    }

    #[test]
    fn handshake() {
        let addr: SocketAddr = "127.0.0.1:50051".parse().unwrap();
        assert_eq!(handshake_line(&addr), "PROVIDER_PLUGIN|1|127.0.0.1:50051");
    }
}
