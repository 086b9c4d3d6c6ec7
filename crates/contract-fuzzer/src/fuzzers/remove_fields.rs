//! Removes sets of fields from the payload

use api_contract::HttpMethod;
use tracing::warn;

use super::{FuzzAttempt, FuzzContext, Fuzzer};
use crate::model::{FieldsFuzzingStrategy, FuzzingData, ResponseCodeFamily};
use crate::payload::remove_field;

/// Upper bound on subsets tried per operation
pub const MAX_SUBSETS: usize = 5_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveFieldsFuzzer;

/// Subsets of `fields` with sizes `1..=max_size`, smallest first, each size
/// in lexicographic order; at most `limit` of them
pub fn field_subsets<'a>(fields: &[&'a str], max_size: usize, limit: usize) -> Vec<Vec<&'a str>> {
    let mut subsets = Vec::new();
    for size in 1..=max_size.min(fields.len()) {
        let mut indices: Vec<usize> = (0..size).collect();
        loop {
            if subsets.len() == limit {
                return subsets;
            }
            subsets.push(indices.iter().map(|&i| fields[i]).collect());

            // advance to the next combination
            let Some(pos) = (0..size).rev().find(|&i| indices[i] != i + fields.len() - size) else {
                break;
            };
            indices[pos] += 1;
            for next in pos + 1..size {
                indices[next] = indices[next - 1] + 1;
            }
        }
    }
    subsets
}

impl RemoveFieldsFuzzer {
    fn max_size(&self, fields: usize, ctx: &FuzzContext<'_>) -> usize {
        match ctx.settings.fields_fuzzing_strategy {
            FieldsFuzzingStrategy::OneByOne => 1,
            FieldsFuzzingStrategy::Size => ctx.settings.max_fields_to_remove.unwrap_or(fields),
            FieldsFuzzingStrategy::Powerset => fields,
        }
    }
}

impl Fuzzer for RemoveFieldsFuzzer {
    fn name(&self) -> &str {
        "RemoveFieldsFuzzer"
    }

    fn description(&self) -> &str {
        "iterate through each request field and remove it, alone or in sets chosen by the fields fuzzing strategy"
    }

    fn skip_for(&self) -> &[HttpMethod] {
        &[HttpMethod::Get, HttpMethod::Delete]
    }

    fn fuzz(&self, data: &FuzzingData, ctx: &mut FuzzContext<'_>) {
        let fields: Vec<&str> = data
            .all_fields
            .keys()
            .map(String::as_str)
            .filter(|field| !data.is_pinned(field))
            .collect();
        let max_size = self.max_size(fields.len(), ctx);
        let subsets = field_subsets(&fields, max_size, MAX_SUBSETS + 1);
        if subsets.len() > MAX_SUBSETS {
            warn!(
                "{} {}: more than {} field combinations, only the first {} are sent",
                data.method, data.path, MAX_SUBSETS, MAX_SUBSETS
            );
        }

        for subset in subsets.into_iter().take(MAX_SUBSETS) {
            let mut payload = data.payload.clone();
            for field in &subset {
                remove_field(&mut payload, field);
            }
            let required = subset.iter().any(|field| data.is_required(field));
            let attempt = FuzzAttempt::new(
                format!("Remove fields {:?}", subset),
                ResponseCodeFamily::for_required(required),
                payload,
            );
            ctx.execute(self.name(), data, attempt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{run, FixedCaller};
    use super::super::FuzzerSettings;
    use super::*;
    use api_contract::Schema;
    use serde_json::json;

    fn data() -> FuzzingData {
        FuzzingData::new(HttpMethod::Post, "/pets")
            .with_schema(
                Schema::object()
                    .required_property("name", Schema::string())
                    .property("age", Schema::integer())
                    .property("color", Schema::string()),
            )
            .with_payload(json!({"name": "rex", "age": 3, "color": "brown"}))
            .with_response_codes(["201", "400"])
    }

    #[test]
    fn test_field_subsets() {
        let fields = ["a", "b", "c"];
        assert_eq!(field_subsets(&fields, 1, 100), vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(
            field_subsets(&fields, 3, 100),
            vec![
                vec!["a"],
                vec!["b"],
                vec!["c"],
                vec!["a", "b"],
                vec!["a", "c"],
                vec!["b", "c"],
                vec!["a", "b", "c"],
            ]
        );
        assert_eq!(field_subsets(&fields, 9, 2).len(), 2);
        assert!(field_subsets(&[], 3, 100).is_empty());
    }

    #[test]
    fn test_one_by_one() {
        let caller = FixedCaller::new(400);
        let (listener, _) = run(&RemoveFieldsFuzzer, &data(), &FuzzerSettings::default(), &caller);
        let expected: Vec<_> = listener.outcomes.iter().map(|o| o.expected.as_str()).collect();
        assert_eq!(expected, vec!["2XX", "2XX", "4XX"]);
        assert_eq!(listener.outcomes[2].payload, json!({"age": 3, "color": "brown"}));
    }

    #[test]
    fn test_size_and_powerset() {
        let caller = FixedCaller::new(400);
        let size = FuzzerSettings {
            fields_fuzzing_strategy: FieldsFuzzingStrategy::Size,
            max_fields_to_remove: Some(2),
            ..FuzzerSettings::default()
        };
        let (listener, _) = run(&RemoveFieldsFuzzer, &data(), &size, &caller);
        assert_eq!(listener.outcomes.len(), 6);

        let powerset = FuzzerSettings {
            fields_fuzzing_strategy: FieldsFuzzingStrategy::Powerset,
            ..FuzzerSettings::default()
        };
        let (listener, _) = run(&RemoveFieldsFuzzer, &data(), &powerset, &caller);
        assert_eq!(listener.outcomes.len(), 7);
        assert_eq!(listener.outcomes[6].payload, json!({}));
    }

    #[test]
    fn test_pinned_fields_are_kept() {
        let caller = FixedCaller::new(400);
        let data = data().with_ref_data("name", json!("rex"));
        let (listener, _) = run(&RemoveFieldsFuzzer, &data, &FuzzerSettings::default(), &caller);
        assert_eq!(listener.outcomes.len(), 2);
        assert!(listener.outcomes.iter().all(|o| o.payload["name"] == json!("rex")));
    }
}
