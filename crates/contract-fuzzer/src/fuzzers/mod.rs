//! Fuzzer registry and execution context
//!
//! A fuzzer is stateless: it inspects a [`FuzzingData`], derives mutated
//! payloads and hands each one to [`FuzzContext::execute`], which calls the
//! service and reports the classified outcome.

use api_contract::HttpMethod;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::caller::{ServiceCaller, ServiceRequest};
use crate::config::FuzzConfig;
use crate::listener::{
    classify, ExecutionStatistics, Listener, ResultKind, SkippedTest, TestCaseOutcome,
};
use crate::model::{EdgeSpacesStrategy, FieldsFuzzingStrategy, FuzzingData, ResponseCodeFamily};
use crate::{boundary, Result};

pub mod custom;
pub mod field;
pub mod happy;
pub mod remove_fields;

pub use custom::{CustomFuzzer, CustomTests};
pub use field::{BoundaryFieldFuzzer, FieldValueFuzzer};
pub use happy::HappyFuzzer;
pub use remove_fields::RemoveFieldsFuzzer;

pub trait Fuzzer {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Methods this fuzzer never runs for
    fn skip_for(&self) -> &[HttpMethod] {
        &[]
    }

    fn fuzz(&self, data: &FuzzingData, ctx: &mut FuzzContext<'_>);
}

// ============================================================================
// Settings
// ============================================================================

/// Run-wide options the fuzzers read
#[derive(Debug, Clone, Default)]
pub struct FuzzerSettings {
    pub fields_fuzzing_strategy: FieldsFuzzingStrategy,
    pub max_fields_to_remove: Option<usize>,
    pub edge_spaces_strategy: EdgeSpacesStrategy,
    pub custom_tests: Option<CustomTests>,
}

impl FuzzerSettings {
    pub fn from_config(config: &FuzzConfig) -> Result<Self> {
        let custom_tests = config
            .custom_fuzzer_file
            .as_deref()
            .map(|path: &Path| CustomTests::from_file(path))
            .transpose()?;
        Ok(Self {
            fields_fuzzing_strategy: config.fields_fuzzing_strategy,
            max_fields_to_remove: config.max_fields_to_remove,
            edge_spaces_strategy: config.edge_spaces_strategy,
            custom_tests,
        })
    }
}

// ============================================================================
// Context
// ============================================================================

/// One mutated request a fuzzer wants sent
#[derive(Debug, Clone)]
pub struct FuzzAttempt {
    pub scenario: String,
    pub expected: ResponseCodeFamily,
    pub payload: Value,
}

impl FuzzAttempt {
    pub fn new(scenario: impl Into<String>, expected: ResponseCodeFamily, payload: Value) -> Self {
        Self {
            scenario: scenario.into(),
            expected,
            payload,
        }
    }
}

pub struct FuzzContext<'a> {
    pub server: &'a str,
    pub caller: &'a dyn ServiceCaller,
    pub listener: &'a mut dyn Listener,
    pub statistics: &'a mut ExecutionStatistics,
    pub settings: &'a FuzzerSettings,
}

impl<'a> FuzzContext<'a> {
    /// Send the attempt, classify the response and report it
    pub fn execute(&mut self, fuzzer: &str, data: &FuzzingData, attempt: FuzzAttempt) -> ResultKind {
        let request = ServiceRequest::from_data(self.server, data, &attempt.payload);
        let (actual, detail) = match self.caller.call(&request) {
            Ok(response) => (Some(response.status), response.body),
            Err(e) => (None, e.to_string()),
        };
        let result = classify(attempt.expected, actual, &data.response_codes);
        self.statistics.record(result);

        let outcome = TestCaseOutcome {
            id: self.statistics.total,
            fuzzer: fuzzer.to_string(),
            path: data.path.clone(),
            method: data.method,
            scenario: attempt.scenario,
            expected: attempt.expected.to_string(),
            actual,
            result,
            detail,
            payload: attempt.payload,
        };
        self.listener.report(&outcome);
        result
    }

    pub fn skip(&mut self, fuzzer: &str, data: &FuzzingData, reason: impl Into<String>) {
        self.statistics.record_skip();
        let skipped = SkippedTest {
            id: self.statistics.total,
            fuzzer: fuzzer.to_string(),
            path: data.path.clone(),
            method: data.method,
            reason: reason.into(),
        };
        self.listener.skip(&skipped);
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registered fuzzers in name order
pub struct FuzzerRegistry {
    fuzzers: Vec<Box<dyn Fuzzer>>,
}

impl FuzzerRegistry {
    pub fn empty() -> Self {
        Self {
            fuzzers: Vec::new(),
        }
    }

    /// Every built-in fuzzer
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for rule in boundary::BOUNDARY_RULES {
            registry.register(Box::new(BoundaryFieldFuzzer::new(rule)));
        }
        for fuzzer in FieldValueFuzzer::all() {
            registry.register(Box::new(fuzzer));
        }
        registry.register(Box::new(HappyFuzzer));
        registry.register(Box::new(RemoveFieldsFuzzer));
        registry.register(Box::new(CustomFuzzer));
        registry
    }

    /// Add a fuzzer; a fuzzer with the same name is replaced
    pub fn register(&mut self, fuzzer: Box<dyn Fuzzer>) {
        match self
            .fuzzers
            .binary_search_by(|f| f.name().cmp(fuzzer.name()))
        {
            Ok(index) => {
                debug!("Replacing fuzzer {}", fuzzer.name());
                self.fuzzers[index] = fuzzer;
            }
            Err(index) => self.fuzzers.insert(index, fuzzer),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Fuzzer> {
        self.fuzzers.iter().map(|f| f.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.fuzzers.iter().map(|f| f.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Fuzzer> {
        self.iter().find(|f| f.name() == name)
    }

    pub fn len(&self) -> usize {
        self.fuzzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fuzzers.is_empty()
    }
}
