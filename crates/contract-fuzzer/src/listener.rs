//! Test-case outcomes and session statistics
//!
//! Every fuzz attempt ends as a [`TestCaseOutcome`] (or a [`SkippedTest`])
//! handed to a [`Listener`]. Aggregate counts live in an explicit
//! [`ExecutionStatistics`] value owned by the session.

use api_contract::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{error, info, warn};

use crate::model::ResponseCodeFamily;

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    pub total: u64,
    pub success: u64,
    pub warnings: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl ExecutionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ResultKind) {
        self.total += 1;
        match kind {
            ResultKind::Success => self.success += 1,
            ResultKind::Warn => self.warnings += 1,
            ResultKind::Error => self.errors += 1,
        }
    }

    pub fn record_skip(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    /// Executed test cases, skipped ones excluded
    pub fn all(&self) -> u64 {
        self.total - self.skipped
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Print summary to stdout
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║ Contract Fuzzing Summary                                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!(
            "║ Total: {:>8} | Passed: {:>8} | Warnings: {:>8}     ║",
            self.total, self.success, self.warnings
        );
        println!(
            "║ Errors: {:>7} | Skipped: {:>7} | Executed: {:>8}     ║",
            self.errors, self.skipped, self.all()
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl fmt::Display for ExecutionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {}, passed {}, warnings {}, errors {}, skipped {}",
            self.total, self.success, self.warnings, self.errors, self.skipped
        )
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Whether `code` is covered by the documented response codes
pub fn is_documented(code: u16, documented: &[String]) -> bool {
    let exact = code.to_string();
    documented.iter().any(|doc| {
        let doc = doc.trim();
        if doc.eq_ignore_ascii_case("default") || doc == exact {
            return true;
        }
        let bytes = doc.as_bytes();
        bytes.len() == 3
            && bytes[1..].eq_ignore_ascii_case(b"xx")
            && bytes[0] == exact.as_bytes()[0]
    })
}

/// Compare the actual response code with what the fuzzer expected
pub fn classify(expected: ResponseCodeFamily, actual: Option<u16>, documented: &[String]) -> ResultKind {
    let Some(code) = actual else {
        return ResultKind::Error;
    };
    match (expected.matches(code), is_documented(code, documented)) {
        (true, true) => ResultKind::Success,
        (true, false) | (false, true) => ResultKind::Warn,
        (false, false) => ResultKind::Error,
    }
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCaseOutcome {
    /// 1-based position in the session
    pub id: u64,
    pub fuzzer: String,
    pub path: String,
    pub method: HttpMethod,
    pub scenario: String,
    pub expected: String,
    pub actual: Option<u16>,
    pub result: ResultKind,
    /// Response body, or the transport error
    pub detail: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTest {
    pub id: u64,
    pub fuzzer: String,
    pub path: String,
    pub method: HttpMethod,
    pub reason: String,
}

pub trait Listener {
    fn start_session(&mut self) {}

    fn report(&mut self, outcome: &TestCaseOutcome);

    fn skip(&mut self, skipped: &SkippedTest);

    fn end_session(&mut self, _statistics: &ExecutionStatistics) {}
}

/// Logs every outcome through `tracing`
#[derive(Debug, Default)]
pub struct TracingListener;

impl Listener for TracingListener {
    fn start_session(&mut self) {
        info!("Starting fuzzing session");
    }

    fn report(&mut self, outcome: &TestCaseOutcome) {
        let actual = outcome
            .actual
            .map(|code| code.to_string())
            .unwrap_or_else(|| "none".to_string());
        match outcome.result {
            ResultKind::Success => info!(
                "Test {} [{}] {} {}: {} | expected {}, got {}",
                outcome.id, outcome.fuzzer, outcome.method, outcome.path,
                outcome.scenario, outcome.expected, actual
            ),
            ResultKind::Warn => warn!(
                "Test {} [{}] {} {}: {} | expected {}, got {}",
                outcome.id, outcome.fuzzer, outcome.method, outcome.path,
                outcome.scenario, outcome.expected, actual
            ),
            ResultKind::Error => error!(
                "Test {} [{}] {} {}: {} | expected {}, got {} ({})",
                outcome.id, outcome.fuzzer, outcome.method, outcome.path,
                outcome.scenario, outcome.expected, actual, outcome.detail
            ),
        }
    }

    fn skip(&mut self, skipped: &SkippedTest) {
        info!(
            "Test {} [{}] {} {} skipped: {}",
            skipped.id, skipped.fuzzer, skipped.method, skipped.path, skipped.reason
        );
    }

    fn end_session(&mut self, statistics: &ExecutionStatistics) {
        info!("Finished fuzzing session: {}", statistics);
    }
}

/// Keeps every outcome in memory
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub outcomes: Vec<TestCaseOutcome>,
    pub skipped: Vec<SkippedTest>,
    pub sessions_started: u32,
    pub final_statistics: Option<ExecutionStatistics>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes_for<'a>(&'a self, fuzzer: &'a str) -> impl Iterator<Item = &'a TestCaseOutcome> + 'a {
        self.outcomes.iter().filter(move |o| o.fuzzer == fuzzer)
    }
}

impl Listener for RecordingListener {
    fn start_session(&mut self) {
        self.sessions_started += 1;
    }

    fn report(&mut self, outcome: &TestCaseOutcome) {
        self.outcomes.push(outcome.clone());
    }

    fn skip(&mut self, skipped: &SkippedTest) {
        self.skipped.push(skipped.clone());
    }

    fn end_session(&mut self, statistics: &ExecutionStatistics) {
        self.final_statistics = Some(statistics.clone());
    }
}
