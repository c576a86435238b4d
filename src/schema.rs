//! Schema types describing provider configuration, resources, and data sources.
//!
//! Every resource in [`crate::resources`] declares its shape with these types.
//! The same schema drives validation ([`crate::validation`]), planning
//! ([`crate::plan`]) and the `GetSchema` RPC. Maps are ordered so the
//! schema a host sees is stable between runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Whole number.
    Int64,
    /// Floating point number.
    Float64,
    /// `true` / `false`.
    Bool,
    /// Ordered elements.
    List(Box<AttributeType>),
    /// Unordered, unique elements.
    Set(Box<AttributeType>),
    /// String keys to values.
    Map(Box<AttributeType>),
    /// Fixed fields.
    Object(BTreeMap<String, AttributeType>),
    /// Anything JSON.
    Dynamic,
}

impl AttributeType {
    /// `list(element)`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// `set(element)`.
    pub fn set(element: AttributeType) -> Self {
        Self::Set(Box::new(element))
    }

    /// `map(element)`.
    pub fn map(element: AttributeType) -> Self {
        Self::Map(Box::new(element))
    }
}

/// Who may set an attribute, and whether it is secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must appear in configuration.
    pub required: bool,
    /// May appear in configuration.
    pub optional: bool,
    /// Filled in by the provider.
    pub computed: bool,
    /// Never shown in plans or logs.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Set by the user, always.
    pub const REQUIRED: Self = Self::of(true, false, false);
    /// Set by the user, or absent.
    pub const OPTIONAL: Self = Self::of(false, true, false);
    /// Set by the provider only.
    pub const COMPUTED: Self = Self::of(false, false, true);
    /// Set by the user, or by the API when the user leaves it out.
    pub const OPTIONAL_COMPUTED: Self = Self::of(false, true, true);

    const fn of(required: bool, optional: bool, computed: bool) -> Self {
        Self {
            required,
            optional,
            computed,
            sensitive: false,
        }
    }

    /// Computed and never configurable.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Presence and secrecy.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated docs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change replaces the object instead of updating it.
    #[serde(default)]
    pub force_new: bool,
    /// Planned when the configuration leaves the attribute out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

macro_rules! attribute_constructors {
    ($($(#[$doc:meta])* $name:ident => $ty:expr, $flags:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name() -> Self {
                Self::new($ty, $flags)
            }
        )*
    };
}

impl Attribute {
    /// An attribute of `attr_type` with `flags`.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    attribute_constructors! {
        /// Required string.
        required_string => AttributeType::String, AttributeFlags::REQUIRED;
        /// Optional string.
        optional_string => AttributeType::String, AttributeFlags::OPTIONAL;
        /// Computed string.
        computed_string => AttributeType::String, AttributeFlags::COMPUTED;
        /// Optional string the API fills in when omitted.
        optional_computed_string => AttributeType::String, AttributeFlags::OPTIONAL_COMPUTED;
        /// Required integer.
        required_int64 => AttributeType::Int64, AttributeFlags::REQUIRED;
        /// Optional integer.
        optional_int64 => AttributeType::Int64, AttributeFlags::OPTIONAL;
        /// Required number.
        required_float64 => AttributeType::Float64, AttributeFlags::REQUIRED;
        /// Optional number.
        optional_float64 => AttributeType::Float64, AttributeFlags::OPTIONAL;
        /// Required boolean.
        required_bool => AttributeType::Bool, AttributeFlags::REQUIRED;
        /// Optional boolean.
        optional_bool => AttributeType::Bool, AttributeFlags::OPTIONAL;
        /// Required list of strings.
        required_string_list => AttributeType::list(AttributeType::String), AttributeFlags::REQUIRED;
        /// Optional list of strings.
        optional_string_list => AttributeType::list(AttributeType::String), AttributeFlags::OPTIONAL;
        /// Computed list of strings.
        computed_string_list => AttributeType::list(AttributeType::String), AttributeFlags::COMPUTED;
        /// Optional set of strings.
        optional_string_set => AttributeType::set(AttributeType::String), AttributeFlags::OPTIONAL;
        /// Optional map of flags, keyed by name.
        optional_bool_map => AttributeType::map(AttributeType::Bool), AttributeFlags::OPTIONAL;
    }

    /// Attach a description.
    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    /// Replace the object when this attribute changes.
    pub fn with_force_new(self) -> Self {
        Self { force_new: true, ..self }
    }

    /// Value planned when the attribute is left out.
    pub fn with_default(self, default: Value) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    /// Hide the value in plans and logs.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How repeated occurrences of a nested block are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// Zero or one.
    #[default]
    Single,
    /// Ordered.
    List,
    /// Unordered and unique.
    Set,
    /// Keyed by string.
    Map,
}

/// Attributes plus nested blocks, e.g. a resource body or one `chart` entry
/// of a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Shown in generated docs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add attribute `name`.
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Add nested block `name`.
    pub fn with_block(mut self, name: impl Into<String>, nested: NestedBlock) -> Self {
        self.blocks.insert(name.into(), nested);
        self
    }

    /// Attach a description.
    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    /// Fill absent or null attributes that declare a default, recursing into
    /// nested blocks.
    pub fn apply_defaults(&self, value: &mut Value) {
        let Some(obj) = value.as_object_mut() else {
            return;
        };
        for (name, attr) in &self.attributes {
            let Some(default) = &attr.default else {
                continue;
            };
            if obj.get(name).map_or(true, Value::is_null) {
                obj.insert(name.clone(), default.clone());
            }
        }
        for (name, nested) in &self.blocks {
            match obj.get_mut(name) {
                Some(Value::Array(items)) => {
                    items.iter_mut().for_each(|item| nested.block.apply_defaults(item));
                },
                Some(Value::Object(map)) if nested.nesting_mode == BlockNestingMode::Map => {
                    map.values_mut().for_each(|item| nested.block.apply_defaults(item));
                },
                Some(item) => nested.block.apply_defaults(item),
                None => {},
            }
        }
    }
}

/// A block nested under a parent, with cardinality limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Shape of each occurrence.
    #[serde(flatten)]
    pub block: Block,
    /// Arrangement of occurrences.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest occurrences allowed.
    #[serde(default)]
    pub min_items: u32,
    /// Most occurrences allowed; 0 is unbounded.
    #[serde(default)]
    pub max_items: u32,
    /// A change replaces the object instead of updating it.
    #[serde(default)]
    pub force_new: bool,
}

impl NestedBlock {
    fn nested(block: Block, nesting_mode: BlockNestingMode) -> Self {
        Self {
            block,
            max_items: u32::from(nesting_mode == BlockNestingMode::Single),
            nesting_mode,
            min_items: 0,
            force_new: false,
        }
    }

    /// At most one occurrence.
    pub fn single(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Single)
    }

    /// Ordered occurrences.
    pub fn list(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::List)
    }

    /// Unordered occurrences.
    pub fn set(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Set)
    }

    /// Occurrences keyed by string.
    pub fn map(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Map)
    }

    /// Require at least `min` occurrences.
    pub fn with_min_items(self, min: u32) -> Self {
        Self { min_items: min, ..self }
    }

    /// Allow at most `max` occurrences.
    pub fn with_max_items(self, max: u32) -> Self {
        Self { max_items: max, ..self }
    }

    /// Replace the object when this block changes.
    pub fn with_force_new(self) -> Self {
        Self { force_new: true, ..self }
    }
}

/// The versioned schema of one resource, data source or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Bumped when the state layout changes.
    #[serde(default)]
    pub version: u64,
    /// Top-level attributes and blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// An empty schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add top-level attribute `name`.
    pub fn with_attribute(self, name: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            block: self.block.with_attribute(name, attribute),
            ..self
        }
    }

    /// Add top-level block `name`.
    pub fn with_block(self, name: impl Into<String>, nested: NestedBlock) -> Self {
        Self {
            block: self.block.with_block(name, nested),
            ..self
        }
    }

    /// Attach a description.
    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            block: self.block.with_description(description),
            ..self
        }
    }

    /// Whether changing top-level attribute or block `name` forces replacement.
    pub fn is_force_new(&self, name: &str) -> bool {
        match (self.block.attributes.get(name), self.block.blocks.get(name)) {
            (Some(attr), _) => attr.force_new,
            (None, Some(nested)) => nested.force_new,
            (None, None) => false,
        }
    }

    /// Whether top-level attribute `name` is filled in by the provider.
    pub fn is_computed(&self, name: &str) -> bool {
        self.block
            .attributes
            .get(name)
            .is_some_and(|attr| attr.flags.computed)
    }
}

/// Everything `GetSchema` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The provider block.
    #[serde(default)]
    pub provider: Schema,
    /// Resources by type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Data sources by type name.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider block, resources or data sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block schema.
    pub fn with_provider_config(self, provider: Schema) -> Self {
        Self { provider, ..self }
    }

    /// Register resource `name`.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register data source `name`.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Whether a diagnostic fails the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Fails the operation.
    Error,
    /// Reported, but the operation goes ahead.
    Warning,
}

/// A message for the host, optionally pinned to an attribute path such as
/// `chart[2].width`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One line.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Offending attribute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn new(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, summary)
    }

    /// A warning.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a longer explanation.
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..self
        }
    }

    /// Pin to an attribute path.
    pub fn with_attribute(self, attribute: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            ..self
        }
    }

    /// Whether this fails the operation.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any diagnostic fails the operation.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
