//! Fuzzing strategies
//!
//! A strategy says how a fuzzed value is combined with a field's current
//! value: replace it, prefix it, append to it, leave it alone, or skip the
//! field entirely.

use serde_json::Value;
use std::fmt;

/// Attached data longer than this is cut in [`FuzzingStrategy::truncated_value`]
pub const TRUNCATION_THRESHOLD: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Trail,
    Replace,
    Prefix,
    Noop,
    Skip,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Trail => "TRAIL",
            StrategyKind::Replace => "REPLACE",
            StrategyKind::Prefix => "PREFIX",
            StrategyKind::Noop => "NOOP",
            StrategyKind::Skip => "SKIP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzingStrategy {
    kind: StrategyKind,
    data: Option<String>,
}

impl FuzzingStrategy {
    fn of(kind: StrategyKind) -> Self {
        Self { kind, data: None }
    }

    pub fn trail() -> Self {
        Self::of(StrategyKind::Trail)
    }

    pub fn replace() -> Self {
        Self::of(StrategyKind::Replace)
    }

    pub fn prefix() -> Self {
        Self::of(StrategyKind::Prefix)
    }

    pub fn noop() -> Self {
        Self::of(StrategyKind::Noop)
    }

    pub fn skip() -> Self {
        Self::of(StrategyKind::Skip)
    }

    /// Attach the payload used by `process`
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attach an optional payload; `None` means no payload
    pub fn with_optional_data(mut self, data: Option<String>) -> Self {
        self.data = data;
        self
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_skip(&self) -> bool {
        self.kind == StrategyKind::Skip
    }

    /// Apply the mutation to `value`. Returns `None` only for SKIP.
    pub fn process(&self, value: &str) -> Option<String> {
        let data = self.data.as_deref().unwrap_or_default();
        match self.kind {
            StrategyKind::Replace => Some(data.to_string()),
            StrategyKind::Prefix => Some(format!("{}{}", data, value)),
            StrategyKind::Trail => Some(format!("{}{}", value, data)),
            StrategyKind::Noop => Some(value.to_string()),
            StrategyKind::Skip => None,
        }
    }

    /// JSON form of [`process`](Self::process). REPLACE without data yields `null`.
    pub fn apply_to(&self, original: &Value) -> Option<Value> {
        match self.kind {
            StrategyKind::Replace => Some(
                self.data
                    .as_ref()
                    .map(|d| Value::String(d.clone()))
                    .unwrap_or(Value::Null),
            ),
            StrategyKind::Noop => Some(original.clone()),
            StrategyKind::Skip => None,
            StrategyKind::Prefix | StrategyKind::Trail => {
                self.process(&value_as_text(original)).map(Value::String)
            }
        }
    }

    /// Display form with the attached data cut at [`TRUNCATION_THRESHOLD`] characters
    pub fn truncated_value(&self) -> String {
        match &self.data {
            None => self.name().to_string(),
            Some(data) if data.chars().count() > TRUNCATION_THRESHOLD => {
                let head: String = data.chars().take(TRUNCATION_THRESHOLD).collect();
                format!("{} with {}...", self.name(), head)
            }
            Some(data) => format!("{} with {}", self.name(), data),
        }
    }
}

impl fmt::Display for FuzzingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{} with {}", self.name(), data),
            None => f.write_str(self.name()),
        }
    }
}

/// Text of a JSON value as it would be typed into a field
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pick a strategy from the whitespace around `original` and apply it.
///
/// Blank or missing → `fallback`; leading whitespace → `fallback + replacement`;
/// trailing whitespace → `replacement + fallback`; otherwise `original` as-is.
pub fn merge_fuzzing(original: Option<&str>, replacement: &str, fallback: &str) -> String {
    let (strategy, input) = match original {
        Some(value) if !value.trim().is_empty() => {
            if value.starts_with(char::is_whitespace) {
                (FuzzingStrategy::prefix().with_data(fallback), replacement)
            } else if value.ends_with(char::is_whitespace) {
                (FuzzingStrategy::trail().with_data(fallback), replacement)
            } else {
                (FuzzingStrategy::noop(), value)
            }
        }
        _ => (FuzzingStrategy::replace().with_data(fallback), ""),
    };
    strategy.process(input).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_factories_tag_their_kind() {
        assert_eq!(FuzzingStrategy::trail().name(), "TRAIL");
        assert_eq!(FuzzingStrategy::replace().name(), "REPLACE");
        assert_eq!(FuzzingStrategy::prefix().name(), "PREFIX");
        assert_eq!(FuzzingStrategy::noop().name(), "NOOP");
        assert_eq!(FuzzingStrategy::skip().name(), "SKIP");
        assert_eq!(FuzzingStrategy::replace().kind(), StrategyKind::Replace);
        assert!(FuzzingStrategy::skip().is_skip());
    }

    #[test]
    fn test_process() {
        assert_eq!(FuzzingStrategy::replace().with_data("x").process("v").unwrap(), "x");
        assert_eq!(FuzzingStrategy::prefix().with_data("x").process("v").unwrap(), "xv");
        assert_eq!(FuzzingStrategy::trail().with_data("x").process("v").unwrap(), "vx");
        assert_eq!(FuzzingStrategy::noop().with_data("x").process("v").unwrap(), "v");
        assert!(FuzzingStrategy::skip().with_data("x").process("v").is_none());
    }

    #[test]
    fn test_apply_to_json() {
        let original = json!(42);
        assert_eq!(FuzzingStrategy::replace().apply_to(&original), Some(Value::Null));
        assert_eq!(
            FuzzingStrategy::trail().with_data("  ").apply_to(&original),
            Some(json!("42  "))
        );
        assert_eq!(FuzzingStrategy::noop().apply_to(&original), Some(json!(42)));
        assert_eq!(FuzzingStrategy::skip().apply_to(&original), None);
    }

    #[test]
    fn test_merge_missing_value_uses_fallback() {
        assert_eq!(merge_fuzzing(None, "air", "  "), "  ");
    }

    #[test]
    fn test_merge_blank_value_uses_fallback() {
        assert_eq!(merge_fuzzing(Some("  "), "air", "replaced"), "replaced");
    }

    #[test]
    fn test_merge_leading_space_prefixes() {
        assert_eq!(merge_fuzzing(Some(" test"), "air", "  "), "  air");
    }

    #[test]
    fn test_merge_trailing_space_trails() {
        assert_eq!(merge_fuzzing(Some("test  "), "air", "  "), "air  ");
    }

    #[test]
    fn test_merge_without_edge_spaces_is_unchanged() {
        assert_eq!(merge_fuzzing(Some("test"), "air", "replaced"), "test");
    }

    #[test]
    fn test_truncation_above_threshold() {
        let strategy = FuzzingStrategy::replace().with_data("t".repeat(50));
        assert_eq!(
            strategy.truncated_value(),
            format!("REPLACE with {}...", "t".repeat(30))
        );
        assert_eq!(strategy.to_string(), format!("REPLACE with {}", "t".repeat(50)));
    }

    #[test]
    fn test_no_truncation_at_threshold() {
        let strategy = FuzzingStrategy::replace().with_data("t".repeat(30));
        assert_eq!(strategy.truncated_value(), strategy.to_string());
        assert!(!strategy.truncated_value().ends_with("..."));
    }

    #[test]
    fn test_truncation_just_above_threshold() {
        let strategy = FuzzingStrategy::replace().with_data("a".repeat(31));
        let truncated = strategy.truncated_value();
        assert!(truncated.contains("REPLACE"));
        assert!(truncated.contains("with"));
        assert!(truncated.contains(&"a".repeat(30)));
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_no_data_shows_name_only() {
        let strategy = FuzzingStrategy::replace().with_optional_data(None);
        assert_eq!(strategy.to_string(), "REPLACE");
        assert_eq!(strategy.truncated_value(), "REPLACE");
    }

    #[test]
    fn test_truncation_counts_characters() {
        let strategy = FuzzingStrategy::replace().with_data("é".repeat(31));
        assert_eq!(
            strategy.truncated_value(),
            format!("REPLACE with {}...", "é".repeat(30))
        );
    }

    proptest! {
        #[test]
        fn prop_merge_without_edge_whitespace_is_identity(
            value in "[a-z0-9][a-z0-9 ]{0,20}[a-z0-9]",
            replacement in "[a-z]{0,10}",
            fallback in " {1,3}",
        ) {
            prop_assert_eq!(merge_fuzzing(Some(&value), &replacement, &fallback), value);
        }

        #[test]
        fn prop_truncated_never_exceeds_threshold(data in "[a-z]{0,80}") {
            let strategy = FuzzingStrategy::prefix().with_data(data);
            let truncated = strategy.truncated_value();
            let shown = truncated.trim_start_matches("PREFIX with ").trim_end_matches("...");
            prop_assert!(shown.chars().count() <= TRUNCATION_THRESHOLD);
        }
    }
}
