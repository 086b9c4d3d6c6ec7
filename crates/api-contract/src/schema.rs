//! Resolved schema model
//!
//! A `Schema` is the dereferenced form of an OpenAPI schema object. Only the
//! keywords that drive payload generation and boundary fuzzing are kept.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between the segments of a nested field name (`address#street`)
pub const FIELD_SEPARATOR: char = '#';

/// Primitive kind of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl SchemaKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(SchemaKind::String),
            "integer" => Some(SchemaKind::Integer),
            "number" => Some(SchemaKind::Number),
            "boolean" => Some(SchemaKind::Boolean),
            "array" => Some(SchemaKind::Array),
            "object" => Some(SchemaKind::Object),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SchemaKind::Integer | SchemaKind::Number)
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaKind::String => "string",
            SchemaKind::Integer => "integer",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Array => "array",
            SchemaKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// A numeric bound accepted by the [`Schema`] builders
#[derive(Debug, Clone)]
pub struct Bound(Option<Number>);

impl From<f64> for Bound {
    fn from(n: f64) -> Self {
        Bound(Number::from_f64(n))
    }
}

impl From<i64> for Bound {
    fn from(n: i64) -> Self {
        Bound(Some(Number::from(n)))
    }
}

impl From<Number> for Bound {
    fn from(n: Number) -> Self {
        Bound(Some(n))
    }
}

fn approximate(n: &Number) -> f64 {
    n.as_f64()
        .or_else(|| n.to_string().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// A fully resolved schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Declared `type`; inferred from `properties`/`items` when absent
    pub kind: Option<SchemaKind>,
    pub format: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    /// Bounds keep the contract's literal so large integers stay exact
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    pub example: Option<Value>,
    pub default: Option<Value>,
    pub nullable: bool,
    /// Names of required properties (object schemas only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    pub items: Option<Box<Schema>>,
}

impl Schema {
    pub fn of_kind(kind: SchemaKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of_kind(SchemaKind::String)
    }

    pub fn integer() -> Self {
        Self::of_kind(SchemaKind::Integer)
    }

    pub fn number() -> Self {
        Self::of_kind(SchemaKind::Number)
    }

    pub fn boolean() -> Self {
        Self::of_kind(SchemaKind::Boolean)
    }

    pub fn object() -> Self {
        Self::of_kind(SchemaKind::Object)
    }

    pub fn array_of(items: Schema) -> Self {
        Self {
            kind: Some(SchemaKind::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn min_length(mut self, n: u64) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: u64) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn minimum(mut self, n: impl Into<Bound>) -> Self {
        self.minimum = n.into().0;
        self
    }

    pub fn maximum(mut self, n: impl Into<Bound>) -> Self {
        self.maximum = n.into().0;
        self
    }

    /// `minimum` as a float; literals past the `f64` range become infinite
    pub fn minimum_f64(&self) -> Option<f64> {
        self.minimum.as_ref().map(approximate)
    }

    /// `maximum` as a float; literals past the `f64` range become infinite
    pub fn maximum_f64(&self) -> Option<f64> {
        self.maximum.as_ref().map(approximate)
    }

    pub fn property(mut self, name: &str, schema: Schema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    pub fn required_property(mut self, name: &str, schema: Schema) -> Self {
        self.required.push(name.to_string());
        self.property(name, schema)
    }

    /// Declared kind, or the kind implied by the structural keywords
    pub fn effective_kind(&self) -> Option<SchemaKind> {
        self.kind.or_else(|| {
            if !self.properties.is_empty() {
                Some(SchemaKind::Object)
            } else if self.items.is_some() {
                Some(SchemaKind::Array)
            } else {
                None
            }
        })
    }

    pub fn is_kind(&self, kind: SchemaKind) -> bool {
        self.effective_kind() == Some(kind)
    }

    /// Objects (and arrays of objects) are containers; everything else is a leaf
    pub fn is_leaf(&self) -> bool {
        match self.effective_kind() {
            Some(SchemaKind::Object) => false,
            Some(SchemaKind::Array) => self
                .items
                .as_deref()
                .map(|items| items.is_leaf())
                .unwrap_or(true),
            _ => true,
        }
    }

    /// Properties of this schema, looking through array `items`
    fn child_properties(&self) -> Option<&Schema> {
        match self.effective_kind() {
            Some(SchemaKind::Object) => Some(self),
            Some(SchemaKind::Array) => self.items.as_deref().and_then(|i| i.child_properties()),
            _ => None,
        }
    }

    /// Every property reachable from this schema, keyed by `#`-joined path
    pub fn flatten_fields(&self) -> BTreeMap<String, Schema> {
        let mut fields = BTreeMap::new();
        self.collect_fields("", &mut fields);
        fields
    }

    fn collect_fields(&self, prefix: &str, out: &mut BTreeMap<String, Schema>) {
        let Some(container) = self.child_properties() else {
            return;
        };
        for (name, child) in &container.properties {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}{}{}", prefix, FIELD_SEPARATOR, name)
            };
            child.collect_fields(&path, out);
            out.insert(path, child.clone());
        }
    }

    /// Look up a nested field by its `#`-joined path
    pub fn field(&self, path: &str) -> Option<&Schema> {
        let mut current = self;
        for segment in path.split(FIELD_SEPARATOR) {
            current = current.child_properties()?.properties.get(segment)?;
        }
        Some(current)
    }

    /// Whether the last segment of `path` is listed as required by its parent
    pub fn is_field_required(&self, path: &str) -> bool {
        let (parent, name) = match path.rsplit_once(FIELD_SEPARATOR) {
            Some((parent, name)) => (self.field(parent), name),
            None => (Some(self), path),
        };
        parent
            .and_then(|p| p.child_properties())
            .map(|p| p.required.iter().any(|r| r == name))
            .unwrap_or(false)
    }
}
