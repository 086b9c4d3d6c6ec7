//! Per-field fuzzers
//!
//! Both families walk the leaf fields of a payload and mutate one field per
//! request. Boundary fuzzers are instantiated from the rule table in
//! [`crate::boundary`]; value fuzzers send nulls, empty strings or values
//! padded with whitespace.

use api_contract::{HttpMethod, Schema, SchemaKind};
use serde_json::Value;
use tracing::debug;

use super::{FuzzAttempt, FuzzContext, Fuzzer};
use crate::boundary::BoundaryRule;
use crate::model::{FuzzingData, ResponseCodeFamily};
use crate::payload::{example_value, get_field, insert_field, set_field, typed_value};
use crate::strategy::{merge_fuzzing, value_as_text, FuzzingStrategy};

const PINNED_REASON: &str = "field is pinned by reference data";

/// Overwrite `field` in a copy of the payload
fn mutated_payload(data: &FuzzingData, field: &str, value: Value) -> Value {
    let mut payload = data.payload.clone();
    if !set_field(&mut payload, field, value.clone()) {
        insert_field(&mut payload, field, value);
    }
    payload
}

fn scenario(strategy: &FuzzingStrategy, field: &str) -> String {
    format!("Send [{}] in field [{}]", strategy.truncated_value(), field)
}

// ============================================================================
// Boundary fuzzers
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct BoundaryFieldFuzzer {
    rule: &'static BoundaryRule,
}

impl BoundaryFieldFuzzer {
    pub fn new(rule: &'static BoundaryRule) -> Self {
        Self { rule }
    }

    pub fn schemas_it_applies_to(&self) -> &'static [SchemaKind] {
        self.rule.applies_to
    }

    /// Whether `field` carries the constraint this fuzzer needs
    pub fn has_boundary_defined(&self, field: &str, data: &FuzzingData) -> bool {
        match data.field_schema(field) {
            Some(schema) => self.rule.is_defined(schema),
            None => self
                .rule
                .applies_to
                .first()
                .map(|kind| self.rule.is_defined(&Schema::of_kind(*kind)))
                .unwrap_or(false),
        }
    }

    pub fn boundary_value(&self, schema: &Schema) -> Option<String> {
        self.rule.value(schema)
    }

    /// Strategy for `field`: SKIP when pinned, REPLACE with the boundary otherwise
    fn strategy_for(&self, field: &str, schema: &Schema, data: &FuzzingData) -> Option<FuzzingStrategy> {
        if !self.has_boundary_defined(field, data) {
            debug!(
                "{} has no {:?} boundary for field {}",
                self.rule.name, self.rule.direction, field
            );
            return None;
        }
        if data.is_pinned(field) {
            return Some(FuzzingStrategy::skip());
        }
        self.boundary_value(schema)
            .map(|value| FuzzingStrategy::replace().with_data(value))
    }
}

impl Fuzzer for BoundaryFieldFuzzer {
    fn name(&self) -> &str {
        self.rule.name
    }

    fn description(&self) -> &str {
        self.rule.description
    }

    fn skip_for(&self) -> &[HttpMethod] {
        self.rule.skip_for
    }

    fn fuzz(&self, data: &FuzzingData, ctx: &mut FuzzContext<'_>) {
        for (field, schema) in data.leaf_fields() {
            if !self.rule.matches(schema) {
                continue;
            }
            let Some(strategy) = self.strategy_for(field, schema, data) else {
                continue;
            };
            if strategy.is_skip() {
                ctx.skip(self.name(), data, format!("{} [{}]", PINNED_REASON, field));
                continue;
            }
            let literal = strategy.data().unwrap_or_default();
            let value = typed_value(self.rule.emits, literal);
            let attempt = FuzzAttempt::new(
                scenario(&strategy, field),
                ResponseCodeFamily::FourXX,
                mutated_payload(data, field, value),
            );
            ctx.execute(self.name(), data, attempt);
        }
    }
}

// ============================================================================
// Value fuzzers
// ============================================================================

const EDGE_SPACES: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValueKind {
    Null,
    EmptyString,
    LeadingSpaces,
    TrailingSpaces,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldValueFuzzer {
    kind: FieldValueKind,
}

impl FieldValueFuzzer {
    pub fn new(kind: FieldValueKind) -> Self {
        Self { kind }
    }

    pub fn all() -> [FieldValueFuzzer; 4] {
        [
            Self::new(FieldValueKind::Null),
            Self::new(FieldValueKind::EmptyString),
            Self::new(FieldValueKind::LeadingSpaces),
            Self::new(FieldValueKind::TrailingSpaces),
        ]
    }

    fn strategy(&self) -> FuzzingStrategy {
        match self.kind {
            FieldValueKind::Null => FuzzingStrategy::replace(),
            FieldValueKind::EmptyString => FuzzingStrategy::replace().with_data(""),
            FieldValueKind::LeadingSpaces => FuzzingStrategy::prefix().with_data(EDGE_SPACES),
            FieldValueKind::TrailingSpaces => FuzzingStrategy::trail().with_data(EDGE_SPACES),
        }
    }

    fn is_edge_spaces(&self) -> bool {
        matches!(
            self.kind,
            FieldValueKind::LeadingSpaces | FieldValueKind::TrailingSpaces
        )
    }

    fn applies_to(&self, schema: &Schema) -> bool {
        !self.is_edge_spaces() || schema.is_kind(SchemaKind::String)
    }

    fn expected(&self, field: &str, data: &FuzzingData, ctx: &FuzzContext<'_>) -> ResponseCodeFamily {
        if self.is_edge_spaces() {
            ctx.settings.edge_spaces_strategy.expected()
        } else {
            ResponseCodeFamily::for_required(data.is_required(field))
        }
    }

    /// Mutated value for `field`, or `None` when the field must be skipped
    fn mutate(&self, field: &str, schema: &Schema, data: &FuzzingData) -> Option<Value> {
        let strategy = self.strategy();
        let current = get_field(&data.payload, field)
            .cloned()
            .unwrap_or_else(|| example_value(schema));

        match data.ref_data.get(field) {
            Some(pinned) if self.is_edge_spaces() => {
                let mutated = strategy.apply_to(&current).map(|v| value_as_text(&v));
                Some(Value::String(merge_fuzzing(
                    mutated.as_deref(),
                    &value_as_text(pinned),
                    EDGE_SPACES,
                )))
            }
            Some(_) => FuzzingStrategy::skip().apply_to(&current),
            None => strategy.apply_to(&current),
        }
    }
}

impl Fuzzer for FieldValueFuzzer {
    fn name(&self) -> &str {
        match self.kind {
            FieldValueKind::Null => "NullValuesInFieldsFuzzer",
            FieldValueKind::EmptyString => "EmptyStringValuesInFieldsFuzzer",
            FieldValueKind::LeadingSpaces => "LeadingSpacesInFieldsFuzzer",
            FieldValueKind::TrailingSpaces => "TrailingSpacesInFieldsFuzzer",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            FieldValueKind::Null => "iterate through each field and send null values",
            FieldValueKind::EmptyString => "iterate through each field and send empty string values",
            FieldValueKind::LeadingSpaces => {
                "iterate through each String field and send values prefixed with spaces"
            }
            FieldValueKind::TrailingSpaces => {
                "iterate through each String field and send values suffixed with spaces"
            }
        }
    }

    fn fuzz(&self, data: &FuzzingData, ctx: &mut FuzzContext<'_>) {
        let strategy = self.strategy();
        for (field, schema) in data.leaf_fields() {
            if !self.applies_to(schema) {
                continue;
            }
            let Some(value) = self.mutate(field, schema, data) else {
                ctx.skip(self.name(), data, format!("{} [{}]", PINNED_REASON, field));
                continue;
            };
            let attempt = FuzzAttempt::new(
                scenario(&strategy, field),
                self.expected(field, data, ctx),
                mutated_payload(data, field, value),
            );
            ctx.execute(self.name(), data, attempt);
        }
    }
}
