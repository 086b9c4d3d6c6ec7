//! Payload generation and field-path access
//!
//! Payloads are plain `serde_json::Value` documents. Nested fields are
//! addressed with `#`-joined paths; when a path crosses an array the
//! operation applies to every element.

use api_contract::{Schema, SchemaKind, FIELD_SEPARATOR};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::boundary::MAX_GENERATED_LENGTH;

// ============================================================================
// Generation
// ============================================================================

/// Deterministic sample value for `schema`
///
/// Preference order: `example`, `default`, first `enum` entry, then a value
/// derived from kind, format and constraints.
pub fn example_value(schema: &Schema) -> Value {
    if let Some(example) = &schema.example {
        return example.clone();
    }
    if let Some(default) = &schema.default {
        return default.clone();
    }
    if let Some(first) = schema.enum_values.first() {
        return first.clone();
    }

    match schema.effective_kind() {
        Some(SchemaKind::Object) => Value::Object(
            schema
                .properties
                .iter()
                .map(|(name, child)| (name.clone(), example_value(child)))
                .collect(),
        ),
        Some(SchemaKind::Array) => Value::Array(
            schema
                .items
                .as_deref()
                .map(|items| vec![example_value(items)])
                .unwrap_or_default(),
        ),
        Some(SchemaKind::Integer) => Value::from(sample_integer(schema)),
        Some(SchemaKind::Number) => sample_number(schema),
        Some(SchemaKind::Boolean) => Value::Bool(true),
        Some(SchemaKind::String) | None => Value::String(sample_string(schema)),
    }
}

fn sample_string(schema: &Schema) -> String {
    let formatted = match schema.format.as_deref() {
        Some("date") => Some("2024-01-15"),
        Some("date-time") => Some("2024-01-15T10:30:00Z"),
        Some("email") => Some("fuzz@example.com"),
        Some("uuid") => Some("5f1c6e7a-2b3d-4c8e-9f10-112233445566"),
        Some("uri") | Some("url") => Some("https://example.com/resource"),
        Some("ipv4") => Some("10.0.0.1"),
        Some("ipv6") => Some("2001:db8::1"),
        Some("byte") => Some("ZnV6eg=="),
        _ => None,
    };
    if let Some(value) = formatted {
        return value.to_string();
    }

    if let Some(pattern) = &schema.pattern {
        debug!("Sample string is not generated from pattern {}", pattern);
    }
    let min = schema.min_length.unwrap_or(0).min(MAX_GENERATED_LENGTH) as usize;
    let max = schema.max_length.map(|n| n as usize).unwrap_or(usize::MAX);
    let length = 4usize.max(min).min(max);
    "fuzz".chars().cycle().take(length).collect()
}

fn sample_integer(schema: &Schema) -> i64 {
    let mut value: i64 = 1;
    if let Some(min) = &schema.minimum {
        value = value.max(integer_limit(min, schema.exclusive_minimum, true));
    }
    if let Some(max) = &schema.maximum {
        value = value.min(integer_limit(max, schema.exclusive_maximum, false));
    }
    value
}

/// Innermost `i64` admitted by a bound; `as` saturates past the `i64` range
fn integer_limit(bound: &Number, exclusive: bool, lower: bool) -> i64 {
    if let Some(n) = bound.as_i64() {
        return match (exclusive, lower) {
            (false, _) => n,
            (true, true) => n.saturating_add(1),
            (true, false) => n.saturating_sub(1),
        };
    }
    let float = bound.to_string().parse::<f64>().unwrap_or(0.0);
    let edge = match (exclusive, lower) {
        (false, true) => float.ceil(),
        (true, true) => float.floor() + 1.0,
        (false, false) => float.floor(),
        (true, false) => float.ceil() - 1.0,
    };
    edge as i64
}

fn sample_number(schema: &Schema) -> Value {
    let finite = |bound: Option<f64>| bound.filter(|f| f.is_finite());
    let (minimum, maximum) = (finite(schema.minimum_f64()), finite(schema.maximum_f64()));

    let mut value = 1.5f64;
    if let Some(min) = minimum {
        if value < min || (schema.exclusive_minimum && value == min) {
            value = min + 1.0;
        }
    }
    if let Some(max) = maximum {
        if value > max || (schema.exclusive_maximum && value == max) {
            value = match minimum {
                Some(min) => min + (max - min) / 2.0,
                None => max - 1.0,
            };
        }
    }
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Literal `text` as a JSON value of `kind`, falling back to a string
pub fn typed_value(kind: SchemaKind, text: &str) -> Value {
    if kind.is_numeric() {
        if let Ok(number @ Value::Number(_)) = serde_json::from_str::<Value>(text) {
            return number;
        }
    }
    Value::String(text.to_string())
}

// ============================================================================
// Field access
// ============================================================================

/// Value of a `#`-joined field; through arrays the first element is used
pub fn get_field<'a>(payload: &'a Value, field: &str) -> Option<&'a Value> {
    field
        .split(FIELD_SEPARATOR)
        .try_fold(payload, |current, segment| descend(current)?.get(segment))
}

fn descend(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first().and_then(descend),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

/// Overwrite an existing field. Returns whether anything was written.
pub fn set_field(payload: &mut Value, field: &str, value: Value) -> bool {
    let segments: Vec<&str> = field.split(FIELD_SEPARATOR).collect();
    let mut write = |object: &mut Map<String, Value>, name: &str| match object.get_mut(name) {
        Some(slot) => {
            *slot = value.clone();
            true
        }
        None => false,
    };
    visit_parents(payload, &segments, &mut write)
}

/// Write a field, creating it (and missing parent objects) when absent
pub fn insert_field(payload: &mut Value, field: &str, value: Value) {
    let segments: Vec<&str> = field.split(FIELD_SEPARATOR).collect();
    insert_at(payload, &segments, value);
}

fn insert_at(target: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(object) = target {
        let slot = object.entry(head.to_string()).or_insert(Value::Null);
        insert_at(slot, rest, value);
    }
}

/// Remove a field. Returns whether anything was removed.
pub fn remove_field(payload: &mut Value, field: &str) -> bool {
    let segments: Vec<&str> = field.split(FIELD_SEPARATOR).collect();
    let mut remove = |object: &mut Map<String, Value>, name: &str| object.remove(name).is_some();
    visit_parents(payload, &segments, &mut remove)
}

fn visit_parents<F>(value: &mut Value, segments: &[&str], apply: &mut F) -> bool
where
    F: FnMut(&mut Map<String, Value>, &str) -> bool,
{
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };
    match value {
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |hit, item| visit_parents(item, segments, apply) || hit),
        Value::Object(object) if rest.is_empty() => apply(object, *head),
        Value::Object(object) => object
            .get_mut(*head)
            .map(|child| visit_parents(child, rest, apply))
            .unwrap_or(false),
        _ => false,
    }
}

/// Top-level payload entries as query parameters; nulls are omitted and
/// arrays repeat the parameter
pub fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Value::Object(object) = payload else {
        return Vec::new();
    };
    let mut pairs = Vec::new();
    for (name, value) in object {
        match value {
            Value::Null => {}
            Value::Array(items) => pairs.extend(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| (name.clone(), crate::strategy::value_as_text(item))),
            ),
            other => pairs.push((name.clone(), crate::strategy::value_as_text(other))),
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_example_value_preferences() {
        let mut schema = Schema::string();
        schema.enum_values = vec![json!("AVAILABLE"), json!("SOLD")];
        assert_eq!(example_value(&schema), json!("AVAILABLE"));

        schema.default = Some(json!("SOLD"));
        assert_eq!(example_value(&schema), json!("SOLD"));

        schema.example = Some(json!("PENDING"));
        assert_eq!(example_value(&schema), json!("PENDING"));
    }

    #[test]
    fn test_example_value_honors_constraints() {
        assert_eq!(example_value(&Schema::string().min_length(6)), json!("fuzzfu"));
        assert_eq!(example_value(&Schema::string().max_length(2)), json!("fu"));
        assert_eq!(example_value(&Schema::integer().minimum(10.0)), json!(10));
        assert_eq!(example_value(&Schema::integer().maximum(0.0)), json!(0));
        assert_eq!(example_value(&Schema::string().format("email")), json!("fuzz@example.com"));

        let schema = Schema::object()
            .property("tags", Schema::array_of(Schema::string()))
            .property("active", Schema::boolean());
        assert_eq!(
            example_value(&schema),
            json!({"active": true, "tags": ["fuzz"]})
        );
    }

    #[test]
    fn test_sample_numbers_saturate_at_extreme_bounds() {
        assert_eq!(example_value(&Schema::integer().minimum(-1.0e40)), json!(1));
        assert_eq!(example_value(&Schema::integer().maximum(-1.0e40)), json!(i64::MIN));
        assert_eq!(example_value(&Schema::integer().minimum(1.0e40)), json!(i64::MAX));

        let mut lowest = Schema::integer().maximum(i64::MIN);
        lowest.exclusive_maximum = true;
        assert_eq!(example_value(&lowest), json!(i64::MIN));

        assert!(example_value(&Schema::number().maximum(f64::MAX)).is_number());
    }

    #[test]
    fn test_nested_field_access() {
        let mut payload = json!({"owner": {"email": "a@b.io"}, "tags": [{"id": 1}, {"id": 2}]});
        assert_eq!(get_field(&payload, "owner#email"), Some(&json!("a@b.io")));
        assert_eq!(get_field(&payload, "tags#id"), Some(&json!(1)));
        assert!(get_field(&payload, "owner#phone").is_none());

        assert!(set_field(&mut payload, "tags#id", Value::Null));
        assert_eq!(payload["tags"], json!([{"id": null}, {"id": null}]));

        assert!(!set_field(&mut payload, "owner#phone", json!("1")));
        assert!(remove_field(&mut payload, "owner#email"));
        assert_eq!(payload["owner"], json!({}));
        assert!(!remove_field(&mut payload, "owner#email"));
    }

    #[test]
    fn test_insert_field_creates_parents() {
        let mut payload = json!({});
        insert_field(&mut payload, "address#city", json!("Oslo"));
        assert_eq!(payload, json!({"address": {"city": "Oslo"}}));
    }

    #[test]
    fn test_typed_value() {
        assert_eq!(typed_value(SchemaKind::Integer, "42"), json!(42));
        assert_eq!(typed_value(SchemaKind::Integer, "abc"), json!("abc"));
        assert_eq!(typed_value(SchemaKind::String, "42"), json!("42"));
        let huge = typed_value(SchemaKind::Integer, "9223372036854775808");
        assert_eq!(huge.to_string(), "9223372036854775808");
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&json!({"limit": 10, "name": "rex", "cursor": null, "tag": ["a", "b"]}));
        assert_eq!(
            pairs,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("name".to_string(), "rex".to_string()),
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
            ]
        );
    }
}
