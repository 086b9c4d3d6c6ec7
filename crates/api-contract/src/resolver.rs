//! `$ref` dereferencing
//!
//! Turns raw schema objects into [`Schema`] values, following local JSON
//! pointer references (`#/components/schemas/Pet`, `#/definitions/Pet`, ...).
//! Cycles are cut at the second visit of the same reference.

use crate::{ContractError, Result, Schema, SchemaKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Upper bound on `$ref` → `$ref` chains for non-schema objects
const MAX_REF_CHAIN: usize = 32;

pub struct RefResolver<'a> {
    root: &'a Value,
    visiting: Vec<String>,
}

impl<'a> RefResolver<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            visiting: Vec::new(),
        }
    }

    /// Find the target of a local reference
    pub fn lookup(&self, reference: &str) -> Result<&'a Value> {
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| ContractError::UnresolvedRef(reference.to_string()))?;
        self.root
            .pointer(pointer)
            .ok_or_else(|| ContractError::UnresolvedRef(reference.to_string()))
    }

    /// Follow `$ref` chains on parameters, request bodies and responses
    pub fn deref(&self, value: &'a Value) -> Result<&'a Value> {
        let mut current = value;
        for _ in 0..MAX_REF_CHAIN {
            match current.get("$ref").and_then(Value::as_str) {
                Some(reference) => current = self.lookup(reference)?,
                None => return Ok(current),
            }
        }
        Err(ContractError::Invalid(format!(
            "reference chain longer than {} hops",
            MAX_REF_CHAIN
        )))
    }

    pub fn resolve_schema(&mut self, value: &'a Value) -> Result<Schema> {
        let Some(object) = value.as_object() else {
            // `true` / `{}` style schemas accept anything
            return Ok(Schema::default());
        };

        if let Some(reference) = object.get("$ref").and_then(Value::as_str) {
            if self.visiting.iter().any(|r| r == reference) {
                debug!("Cyclic reference {} cut to an empty object", reference);
                return Ok(Schema::object());
            }
            let target = self.lookup(reference)?;
            self.visiting.push(reference.to_string());
            let resolved = self.resolve_schema(target);
            self.visiting.pop();
            return resolved;
        }

        let mut schema = self.composed_base(object)?;
        self.apply_keywords(object, &mut schema)?;
        Ok(schema)
    }

    /// `allOf` merges every member, `oneOf`/`anyOf` take the first one
    fn composed_base(&mut self, object: &'a Map<String, Value>) -> Result<Schema> {
        let mut base = Schema::default();
        if let Some(members) = object.get("allOf").and_then(Value::as_array) {
            for member in members {
                let resolved = self.resolve_schema(member)?;
                merge_into(&mut base, resolved);
            }
        }
        for keyword in ["oneOf", "anyOf"] {
            if let Some(first) = object
                .get(keyword)
                .and_then(Value::as_array)
                .and_then(|members| members.first())
            {
                let resolved = self.resolve_schema(first)?;
                merge_into(&mut base, resolved);
            }
        }
        Ok(base)
    }

    fn apply_keywords(&mut self, object: &'a Map<String, Value>, schema: &mut Schema) -> Result<()> {
        match object.get("type") {
            Some(Value::String(name)) => {
                if let Some(kind) = SchemaKind::from_type_name(name) {
                    schema.kind = Some(kind);
                }
            }
            Some(Value::Array(names)) => {
                for name in names.iter().filter_map(Value::as_str) {
                    match SchemaKind::from_type_name(name) {
                        Some(kind) if schema.kind.is_none() => schema.kind = Some(kind),
                        _ if name == "null" => schema.nullable = true,
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        if let Some(format) = object.get("format").and_then(Value::as_str) {
            schema.format = Some(format.to_string());
        }
        if let Some(n) = object.get("minLength").and_then(as_length) {
            schema.min_length = Some(n);
        }
        if let Some(n) = object.get("maxLength").and_then(as_length) {
            schema.max_length = Some(n);
        }
        if let Some(Value::Number(n)) = object.get("minimum") {
            schema.minimum = Some(n.clone());
        }
        if let Some(Value::Number(n)) = object.get("maximum") {
            schema.maximum = Some(n.clone());
        }
        // OpenAPI 3.0 uses booleans, 3.1 moved the bound into the keyword
        match object.get("exclusiveMinimum") {
            Some(Value::Bool(b)) => schema.exclusive_minimum = *b,
            Some(Value::Number(n)) => {
                schema.minimum = Some(n.clone());
                schema.exclusive_minimum = true;
            }
            _ => {}
        }
        match object.get("exclusiveMaximum") {
            Some(Value::Bool(b)) => schema.exclusive_maximum = *b,
            Some(Value::Number(n)) => {
                schema.maximum = Some(n.clone());
                schema.exclusive_maximum = true;
            }
            _ => {}
        }
        if let Some(pattern) = object.get("pattern").and_then(Value::as_str) {
            schema.pattern = Some(pattern.to_string());
        }
        if let Some(values) = object.get("enum").and_then(Value::as_array) {
            schema.enum_values = values.clone();
        }
        if let Some(example) = object.get("example") {
            schema.example = Some(example.clone());
        } else if let Some(first) = object
            .get("examples")
            .and_then(Value::as_array)
            .and_then(|e| e.first())
        {
            schema.example = Some(first.clone());
        }
        if let Some(default) = object.get("default") {
            schema.default = Some(default.clone());
        }
        if let Some(nullable) = object.get("nullable").and_then(Value::as_bool) {
            schema.nullable = schema.nullable || nullable;
        }
        if let Some(required) = object.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !schema.required.iter().any(|r| r == name) {
                    schema.required.push(name.to_string());
                }
            }
        }
        if let Some(properties) = object.get("properties").and_then(Value::as_object) {
            let mut resolved = BTreeMap::new();
            for (name, property) in properties {
                resolved.insert(name.clone(), self.resolve_schema(property)?);
            }
            schema.properties.extend(resolved);
        }
        if let Some(items) = object.get("items") {
            schema.items = Some(Box::new(self.resolve_schema(items)?));
        }
        Ok(())
    }
}

fn as_length(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

/// Merge `other` into `base`; keywords already set on `base` win
fn merge_into(base: &mut Schema, other: Schema) {
    base.kind = base.kind.or(other.kind);
    base.format = base.format.take().or(other.format);
    base.min_length = base.min_length.or(other.min_length);
    base.max_length = base.max_length.or(other.max_length);
    base.minimum = base.minimum.take().or(other.minimum);
    base.maximum = base.maximum.take().or(other.maximum);
    base.exclusive_minimum |= other.exclusive_minimum;
    base.exclusive_maximum |= other.exclusive_maximum;
    base.pattern = base.pattern.take().or(other.pattern);
    if base.enum_values.is_empty() {
        base.enum_values = other.enum_values;
    }
    base.example = base.example.take().or(other.example);
    base.default = base.default.take().or(other.default);
    base.nullable |= other.nullable;
    for name in other.required {
        if !base.required.contains(&name) {
            base.required.push(name);
        }
    }
    for (name, property) in other.properties {
        base.properties.entry(name).or_insert(property);
    }
    base.items = base.items.take().or(other.items);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "components": {
                "schemas": {
                    "Named": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {"name": {"type": "string", "maxLength": 10}}
                    },
                    "Pet": {
                        "allOf": [
                            {"$ref": "#/components/schemas/Named"},
                            {"type": "object", "properties": {"age": {"type": "integer", "minimum": 1}}}
                        ]
                    },
                    "Node": {
                        "type": "object",
                        "properties": {
                            "value": {"type": "number", "exclusiveMaximum": 5},
                            "next": {"$ref": "#/components/schemas/Node"}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_all_of_merges_properties_and_required() {
        let doc = document();
        let mut resolver = RefResolver::new(&doc);
        let pet = resolver
            .resolve_schema(&json!({"$ref": "#/components/schemas/Pet"}))
            .unwrap();

        assert_eq!(pet.effective_kind(), Some(SchemaKind::Object));
        assert_eq!(pet.required, vec!["name".to_string()]);
        assert_eq!(pet.field("name").unwrap().max_length, Some(10));
        assert_eq!(pet.field("age").unwrap().minimum_f64(), Some(1.0));
    }

    #[test]
    fn test_cycle_is_cut() {
        let doc = document();
        let mut resolver = RefResolver::new(&doc);
        let node = resolver
            .resolve_schema(&json!({"$ref": "#/components/schemas/Node"}))
            .unwrap();

        let next = node.field("next").unwrap();
        assert!(next.properties.is_empty());
        assert_eq!(next.effective_kind(), Some(SchemaKind::Object));
    }

    #[test]
    fn test_numeric_exclusive_bound() {
        let doc = document();
        let mut resolver = RefResolver::new(&doc);
        let node = resolver
            .resolve_schema(&json!({"$ref": "#/components/schemas/Node"}))
            .unwrap();

        let value = node.field("value").unwrap();
        assert_eq!(value.maximum_f64(), Some(5.0));
        assert!(value.exclusive_maximum);
    }

    #[test]
    fn test_large_integer_bounds_stay_exact() {
        let doc = json!({});
        let input = json!({
            "type": "integer",
            "minimum": -9007199254740993i64,
            "maximum": 9007199254740993i64,
            "pattern": "^[0-9]+$"
        });
        let mut resolver = RefResolver::new(&doc);
        let schema = resolver.resolve_schema(&input).unwrap();

        assert_eq!(schema.minimum.unwrap().to_string(), "-9007199254740993");
        assert_eq!(schema.maximum.unwrap().to_string(), "9007199254740993");
        assert_eq!(schema.pattern.as_deref(), Some("^[0-9]+$"));
    }

    #[test]
    fn test_unknown_reference_fails() {
        let doc = document();
        let mut resolver = RefResolver::new(&doc);
        let err = resolver
            .resolve_schema(&json!({"$ref": "#/components/schemas/Missing"}))
            .unwrap_err();
        assert!(matches!(err, ContractError::UnresolvedRef(_)));
    }

    #[test]
    fn test_type_array_with_null() {
        let doc = json!({});
        let mut resolver = RefResolver::new(&doc);
        let schema = resolver
            .resolve_schema(&json!({"type": ["null", "string"]}))
            .unwrap();
        assert_eq!(schema.kind, Some(SchemaKind::String));
        assert!(schema.nullable);
    }
}
