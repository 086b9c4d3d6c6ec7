//! User-defined test cases
//!
//! The custom fuzzer file is YAML keyed by contract path, then by test name.
//! Each test lists field values to overlay on the generated payload plus the
//! reserved keys below.
//!
//! ```yaml
//! /pets:
//!   duplicatedName:
//!     name: "rex"
//!     expectedResponseCode: 409
//!     httpMethod: POST
//! ```

use api_contract::HttpMethod;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{FuzzAttempt, FuzzContext, Fuzzer};
use crate::model::{FuzzingData, ResponseCodeFamily};
use crate::payload::{insert_field, set_field};
use crate::strategy::value_as_text;
use crate::Result;

pub const EXPECTED_RESPONSE_CODE: &str = "expectedResponseCode";
/// Optional; restricts a test to one method of the path
pub const HTTP_METHOD: &str = "httpMethod";

type TestCase = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomTests {
    paths: BTreeMap<String, BTreeMap<String, TestCase>>,
}

impl CustomTests {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tests = Self::from_yaml(&fs::read_to_string(path)?)?;
        info!(
            "Loaded {} custom test(s) from {}",
            tests.paths.values().map(BTreeMap::len).sum::<usize>(),
            path.display()
        );
        Ok(tests)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        let paths = serde_json::from_value(serde_json::to_value(raw)?)?;
        Ok(Self { paths })
    }

    pub fn for_path(&self, path: &str) -> Option<&BTreeMap<String, TestCase>> {
        self.paths.get(path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CustomFuzzer;

impl CustomFuzzer {
    fn expected(test: &TestCase) -> Option<ResponseCodeFamily> {
        test.get(EXPECTED_RESPONSE_CODE)
            .and_then(|code| value_as_text(code).parse().ok())
    }

    fn runs_for(test: &TestCase, method: HttpMethod) -> bool {
        match test.get(HTTP_METHOD) {
            Some(value) => value_as_text(value)
                .parse::<HttpMethod>()
                .map(|m| m == method)
                .unwrap_or(false),
            None => true,
        }
    }
}

impl Fuzzer for CustomFuzzer {
    fn name(&self) -> &str {
        "CustomFuzzer"
    }

    fn description(&self) -> &str {
        "send requests with user-supplied field values from the custom fuzzer file"
    }

    fn fuzz(&self, data: &FuzzingData, ctx: &mut FuzzContext<'_>) {
        let tests = match ctx.settings.custom_tests.as_ref() {
            Some(tests) => tests.for_path(&data.path).cloned(),
            None => {
                debug!("No custom fuzzer file supplied, nothing to do for {}", data.path);
                return;
            }
        };
        let Some(tests) = tests else {
            return;
        };

        for (name, test) in &tests {
            if !Self::runs_for(test, data.method) {
                continue;
            }
            let Some(expected) = Self::expected(test) else {
                ctx.skip(
                    self.name(),
                    data,
                    format!("test {} has no valid {}", name, EXPECTED_RESPONSE_CODE),
                );
                continue;
            };

            let mut payload = data.payload.clone();
            for (field, value) in test {
                if field == EXPECTED_RESPONSE_CODE || field == HTTP_METHOD {
                    continue;
                }
                if !set_field(&mut payload, field, value.clone()) {
                    insert_field(&mut payload, field, value.clone());
                }
            }
            let attempt = FuzzAttempt::new(format!("Custom test {}", name), expected, payload);
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
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TESTS: &str = r#"
/pets:
  duplicatedName:
    name: rex
    expectedResponseCode: 409
  tooOld:
    age: 300
    expectedResponseCode: 4XX
    httpMethod: PUT
  missingCode:
    name: x
/owners:
  other:
    expectedResponseCode: 200
"#;

    fn data() -> FuzzingData {
        FuzzingData::new(HttpMethod::Post, "/pets")
            .with_schema(Schema::object().property("name", Schema::string()))
            .with_payload(json!({"name": "fuzz"}))
            .with_response_codes(["201", "409"])
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", TESTS).unwrap();
        let tests = CustomTests::from_file(file.path()).unwrap();
        assert_eq!(tests.for_path("/pets").map(BTreeMap::len), Some(3));
        assert!(tests.for_path("/stores").is_none());
    }

    #[test]
    fn test_runs_matching_tests() {
        let settings = FuzzerSettings {
            custom_tests: Some(CustomTests::from_yaml(TESTS).unwrap()),
            ..FuzzerSettings::default()
        };
        let caller = FixedCaller::new(409);
        let (listener, stats) = run(&CustomFuzzer, &data(), &settings, &caller);

        assert_eq!(listener.outcomes.len(), 1);
        let outcome = &listener.outcomes[0];
        assert_eq!(outcome.scenario, "Custom test duplicatedName");
        assert_eq!(outcome.expected, "409");
        assert_eq!(outcome.payload, json!({"name": "rex"}));
        assert_eq!(stats.success, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_without_file_sends_nothing() {
        let caller = FixedCaller::new(200);
        let (listener, stats) = run(&CustomFuzzer, &data(), &FuzzerSettings::default(), &caller);
        assert!(listener.outcomes.is_empty());
        assert_eq!(stats.total, 0);
    }
}
