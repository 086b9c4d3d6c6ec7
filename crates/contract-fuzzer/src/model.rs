//! Per-operation fuzzing input and response expectations

use api_contract::{HttpMethod, Schema, FIELD_SEPARATOR};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::FuzzError;

/// Everything a fuzzer needs to know about one (path, method) pair
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzingData {
    pub method: HttpMethod,
    /// Path template as declared in the contract, e.g. `/pets/{petId}`
    pub path: String,
    /// Generated payload; the request body, or query parameters for GET/DELETE
    pub payload: Value,
    pub schema: Schema,
    /// Every field of `schema`, keyed by `#`-joined path
    pub all_fields: BTreeMap<String, Schema>,
    /// Values substituted into the path template
    pub path_params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    /// Fields pinned to fixed values by reference data
    pub ref_data: BTreeMap<String, Value>,
    /// Documented response codes (`200`, `4XX`, `default`, ...)
    pub response_codes: Vec<String>,
}

impl FuzzingData {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            payload: Value::Object(Default::default()),
            schema: Schema::object(),
            all_fields: BTreeMap::new(),
            path_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            ref_data: BTreeMap::new(),
            response_codes: Vec::new(),
        }
    }

    /// Set the schema and recompute `all_fields`
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.all_fields = schema.flatten_fields();
        self.schema = schema;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_path_param(mut self, name: &str, value: &str) -> Self {
        self.path_params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_ref_data(mut self, field: &str, value: Value) -> Self {
        self.ref_data.insert(field.to_string(), value);
        self
    }

    pub fn with_response_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn field_schema(&self, field: &str) -> Option<&Schema> {
        self.all_fields.get(field)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.schema.is_field_required(field)
    }

    pub fn is_pinned(&self, field: &str) -> bool {
        self.ref_data.contains_key(field)
    }

    /// Non-container fields in sorted order
    pub fn leaf_fields(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.all_fields
            .iter()
            .filter(|(_, schema)| schema.is_leaf())
            .map(|(name, schema)| (name.as_str(), schema))
    }

    /// Top-level fields only, used when removing fields
    pub fn top_level_fields(&self) -> Vec<&str> {
        self.all_fields
            .keys()
            .filter(|name| !name.contains(FIELD_SEPARATOR))
            .map(String::as_str)
            .collect()
    }

    /// Path template with `{name}` placeholders substituted
    pub fn resolved_path(&self) -> String {
        let mut path = self.path.clone();
        for (name, value) in &self.path_params {
            path = path.replace(&format!("{{{}}}", name), value);
        }
        path
    }
}

/// What a fuzzer expects the service to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCodeFamily {
    TwoXX,
    FourXX,
    FiveXX,
    Exact(u16),
}

impl ResponseCodeFamily {
    pub fn matches(&self, code: u16) -> bool {
        match self {
            ResponseCodeFamily::TwoXX => (200..300).contains(&code),
            ResponseCodeFamily::FourXX => (400..500).contains(&code),
            ResponseCodeFamily::FiveXX => (500..600).contains(&code),
            ResponseCodeFamily::Exact(expected) => *expected == code,
        }
    }

    /// Pick the family from whether the mutated field(s) must be present
    pub fn for_required(required: bool) -> Self {
        if required {
            ResponseCodeFamily::FourXX
        } else {
            ResponseCodeFamily::TwoXX
        }
    }
}

impl fmt::Display for ResponseCodeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCodeFamily::TwoXX => f.write_str("2XX"),
            ResponseCodeFamily::FourXX => f.write_str("4XX"),
            ResponseCodeFamily::FiveXX => f.write_str("5XX"),
            ResponseCodeFamily::Exact(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for ResponseCodeFamily {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "2XX" => Ok(ResponseCodeFamily::TwoXX),
            "4XX" => Ok(ResponseCodeFamily::FourXX),
            "5XX" => Ok(ResponseCodeFamily::FiveXX),
            other => other
                .parse::<u16>()
                .ok()
                .filter(|code| (100..600).contains(code))
                .map(ResponseCodeFamily::Exact)
                .ok_or_else(|| FuzzError::InvalidArgument(format!("response code {}", s))),
        }
    }
}

/// How `RemoveFieldsFuzzer` chooses the sets of fields to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldsFuzzingStrategy {
    #[default]
    OneByOne,
    Size,
    Powerset,
}

impl FieldsFuzzingStrategy {
    pub const ALL: [FieldsFuzzingStrategy; 3] = [
        FieldsFuzzingStrategy::OneByOne,
        FieldsFuzzingStrategy::Size,
        FieldsFuzzingStrategy::Powerset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldsFuzzingStrategy::OneByOne => "ONEBYONE",
            FieldsFuzzingStrategy::Size => "SIZE",
            FieldsFuzzingStrategy::Powerset => "POWERSET",
        }
    }
}

impl fmt::Display for FieldsFuzzingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldsFuzzingStrategy {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FuzzError::InvalidArgument(format!("fields fuzzing strategy {}", s)))
    }
}

/// Whether the service is expected to trim before or after validating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeSpacesStrategy {
    #[default]
    TrimAndValidate,
    ValidateAndTrim,
}

impl EdgeSpacesStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeSpacesStrategy::TrimAndValidate => "trimAndValidate",
            EdgeSpacesStrategy::ValidateAndTrim => "validateAndTrim",
        }
    }

    pub fn expected(&self) -> ResponseCodeFamily {
        match self {
            EdgeSpacesStrategy::TrimAndValidate => ResponseCodeFamily::TwoXX,
            EdgeSpacesStrategy::ValidateAndTrim => ResponseCodeFamily::FourXX,
        }
    }
}

impl FromStr for EdgeSpacesStrategy {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [EdgeSpacesStrategy::TrimAndValidate, EdgeSpacesStrategy::ValidateAndTrim]
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FuzzError::InvalidArgument(format!("edge spaces strategy {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pet_data() -> FuzzingData {
        let schema = Schema::object()
            .required_property("name", Schema::string())
            .property(
                "owner",
                Schema::object().required_property("email", Schema::string().format("email")),
            );
        FuzzingData::new(HttpMethod::Post, "/owners/{ownerId}/pets")
            .with_schema(schema)
            .with_payload(json!({"name": "rex", "owner": {"email": "a@b.io"}}))
            .with_path_param("ownerId", "42")
    }

    #[test]
    fn test_fields_and_requirements() {
        let data = pet_data();
        let leaves: Vec<_> = data.leaf_fields().map(|(name, _)| name).collect();
        assert_eq!(leaves, vec!["name", "owner#email"]);
        assert_eq!(data.top_level_fields(), vec!["name", "owner"]);
        assert!(data.is_required("name"));
        assert!(!data.is_required("owner"));
        assert!(data.is_required("owner#email"));
        assert!(data.field_schema("owner#email").is_some());
    }

    #[test]
    fn test_resolved_path() {
        assert_eq!(pet_data().resolved_path(), "/owners/42/pets");
    }

    #[test]
    fn test_response_code_family() {
        assert!(ResponseCodeFamily::TwoXX.matches(204));
        assert!(!ResponseCodeFamily::TwoXX.matches(400));
        assert!(ResponseCodeFamily::FourXX.matches(422));
        assert!(ResponseCodeFamily::Exact(409).matches(409));
        assert_eq!("4xx".parse::<ResponseCodeFamily>().unwrap(), ResponseCodeFamily::FourXX);
        assert_eq!("201".parse::<ResponseCodeFamily>().unwrap(), ResponseCodeFamily::Exact(201));
        assert!("999".parse::<ResponseCodeFamily>().is_err());
        assert_eq!(ResponseCodeFamily::for_required(true).to_string(), "4XX");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "powerset".parse::<FieldsFuzzingStrategy>().unwrap(),
            FieldsFuzzingStrategy::Powerset
        );
        assert!("random".parse::<FieldsFuzzingStrategy>().is_err());
        assert_eq!(
            "validateAndTrim".parse::<EdgeSpacesStrategy>().unwrap().expected(),
            ResponseCodeFamily::FourXX
        );
    }
}
