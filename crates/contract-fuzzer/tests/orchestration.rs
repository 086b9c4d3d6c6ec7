//! End-to-end fuzzing passes against a scripted service

use api_contract::{Contract, HttpMethod};
use contract_fuzzer::caller::{CallError, ServiceCaller, ServiceRequest, ServiceResponse};
use contract_fuzzer::config::{FuzzConfig, Selection};
use contract_fuzzer::listener::{RecordingListener, ResultKind};
use contract_fuzzer::session::{Session, SessionOutcome};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::io::Write;
use tempfile::NamedTempFile;

const PETSTORE: &str = r#"
openapi: 3.0.1
info:
  title: Petstore
  version: 1.0.0
paths:
  /health:
    head:
      responses:
        200:
          description: up
    options:
      responses:
        204:
          description: allowed methods
  /pets:
    get:
      parameters:
        - name: limit
          in: query
          required: true
          schema:
            type: integer
            format: int32
            minimum: 1
            maximum: 100
      responses:
        200:
          description: ok
        400:
          description: bad request
    post:
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Pet'
      responses:
        201:
          description: created
        4XX:
          description: rejected
  /pets/{petId}:
    parameters:
      - name: petId
        in: path
        schema:
          type: integer
    get:
      responses:
        200:
          description: ok
    delete:
      responses:
        204:
          description: deleted
    head:
      responses:
        200:
          description: ok
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name:
          type: string
          minLength: 1
          maxLength: 20
        age:
          type: integer
          minimum: 0
        tag:
          type: string
"#;

/// Accepts a POST when `name` is a non-empty string and every other field
/// is well typed; everything else is answered like a strict service would
struct PetService {
    requests: RefCell<Vec<ServiceRequest>>,
}

impl PetService {
    fn new() -> Self {
        Self {
            requests: RefCell::new(Vec::new()),
        }
    }

    fn valid_pet(body: &Value) -> bool {
        let name_ok = body["name"]
            .as_str()
            .map(|n| !n.is_empty() && n.len() <= 20 && n.trim() == n)
            .unwrap_or(false);
        let age_ok = match &body["age"] {
            Value::Null => body.get("age").is_none(),
            age => age.as_i64().map(|a| a >= 0).unwrap_or(false),
        };
        let tag_ok = body.get("tag").map(|t| t.is_string()).unwrap_or(true);
        name_ok && age_ok && tag_ok
    }
}

impl ServiceCaller for PetService {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, CallError> {
        self.requests.borrow_mut().push(request.clone());
        let status = match request.method {
            HttpMethod::Post => {
                if request.body.as_ref().map(Self::valid_pet).unwrap_or(false) {
                    201
                } else {
                    400
                }
            }
            HttpMethod::Get if request.url.ends_with("/pets") => {
                let limit = request
                    .query
                    .iter()
                    .find(|(name, _)| name == "limit")
                    .and_then(|(_, value)| value.parse::<i64>().ok());
                match limit {
                    Some(1..=100) => 200,
                    _ => 400,
                }
            }
            HttpMethod::Delete => 204,
            _ => 200,
        };
        Ok(ServiceResponse::new(status, "{}"))
    }
}

struct Unreachable;

impl ServiceCaller for Unreachable {
    fn call(&self, _: &ServiceRequest) -> Result<ServiceResponse, CallError> {
        Err(CallError::Transport("connection refused".to_string()))
    }
}

fn contract_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    write!(file, "{}", PETSTORE).unwrap();
    file
}

fn run_with(config: &FuzzConfig, caller: &dyn ServiceCaller) -> (SessionOutcome, RecordingListener) {
    let mut listener = RecordingListener::new();
    let outcome = Session::new(config, caller, &mut listener)
        .run(|| Contract::from_file(&config.contract));
    (outcome, listener)
}

fn invocations(listener: &RecordingListener) -> Vec<(String, String, HttpMethod, String)> {
    listener
        .outcomes
        .iter()
        .map(|o| (o.path.clone(), o.fuzzer.clone(), o.method, o.scenario.clone()))
        .collect()
}

#[test]
fn test_full_pass_orders_paths_then_fuzzers() {
    let file = contract_file();
    let config = FuzzConfig::new(file.path(), "http://localhost:8080");
    let service = PetService::new();
    let (outcome, listener) = run_with(&config, &service);

    assert!(outcome.error.is_none());
    assert!(!listener.outcomes.is_empty());

    let paths: Vec<&str> = listener.outcomes.iter().map(|o| o.path.as_str()).collect();
    let mut sorted_paths = paths.clone();
    sorted_paths.sort();
    assert_eq!(paths, sorted_paths);

    for path in ["/pets", "/pets/{petId}"] {
        let fuzzers: Vec<&str> = listener
            .outcomes
            .iter()
            .filter(|o| o.path == path)
            .map(|o| o.fuzzer.as_str())
            .collect();
        let mut sorted = fuzzers.clone();
        sorted.sort();
        assert_eq!(fuzzers, sorted, "fuzzers out of order for {}", path);
    }

    // HEAD is not fuzzed
    assert!(listener.outcomes.iter().all(|o| o.method != HttpMethod::Head));
    assert!(listener.outcomes.iter().all(|o| o.path != "/health"));
    assert!(service
        .requests
        .borrow()
        .iter()
        .all(|r| !r.url.contains('{')));
}

#[test]
fn test_same_input_gives_same_invocations() {
    let file = contract_file();
    let config = FuzzConfig::new(file.path(), "http://localhost:8080");

    let (_, first) = run_with(&config, &PetService::new());
    let (_, second) = run_with(&config, &PetService::new());
    assert_eq!(invocations(&first), invocations(&second));
    assert_eq!(first.final_statistics, second.final_statistics);
}

#[test]
fn test_skip_for_methods_are_honored() {
    let file = contract_file();
    let config = FuzzConfig::new(file.path(), "http://localhost:8080")
        .fuzzers(Selection::Named(vec!["RemoveFieldsFuzzer".to_string()]));
    let (_, listener) = run_with(&config, &PetService::new());

    assert!(!listener.outcomes.is_empty());
    assert!(listener.outcomes.iter().all(|o| o.method == HttpMethod::Post));
    let expected: Vec<&str> = listener.outcomes.iter().map(|o| o.expected.as_str()).collect();
    assert_eq!(expected, vec!["2XX", "4XX", "2XX"]);
    assert!(listener.outcomes.iter().all(|o| o.result == ResultKind::Success));
}

#[test]
fn test_boundary_fuzzers_hit_the_query_and_the_body() {
    let file = contract_file();
    let config = FuzzConfig::new(file.path(), "http://localhost:8080")
        .fuzzers(Selection::parse(
            "IntegerFieldsAboveMaximumFuzzer,StringFieldsRightBoundaryFuzzer,NoSuchFuzzer",
            ',',
        ))
        .paths(Selection::parse("/pets;/unknown", ';'));
    let (outcome, listener) = run_with(&config, &PetService::new());

    assert!(outcome.error.is_none());
    let sent: Vec<(&str, HttpMethod, &Value)> = listener
        .outcomes
        .iter()
        .map(|o| (o.fuzzer.as_str(), o.method, &o.payload))
        .collect();
    // age has a minimum but no maximum, tag has no maxLength
    assert_eq!(sent.len(), 2);
    assert_eq!(listener.outcomes_for("IntegerFieldsAboveMaximumFuzzer").count(), 1);
    assert_eq!(listener.outcomes_for("NoSuchFuzzer").count(), 0);
    assert_eq!(sent[0].0, "IntegerFieldsAboveMaximumFuzzer");
    assert_eq!(sent[0].1, HttpMethod::Get);
    assert_eq!(sent[0].2["limit"], json!(101));
    assert_eq!(sent[1].0, "StringFieldsRightBoundaryFuzzer");
    assert_eq!(sent[1].1, HttpMethod::Post);
    assert_eq!(sent[1].2["name"].as_str().map(str::len), Some(21));
    assert!(listener.outcomes.iter().all(|o| o.result == ResultKind::Success));
}

#[test]
fn test_path_without_supported_methods_is_skipped() {
    let file = contract_file();
    let config = FuzzConfig::new(file.path(), "http://localhost:8080")
        .paths(Selection::parse("/health", ';'));
    let service = PetService::new();
    let (outcome, listener) = run_with(&config, &service);

    assert!(!outcome.is_aborted());
    assert!(listener.outcomes.is_empty());
    assert!(listener.skipped.is_empty());
    assert!(service.requests.borrow().is_empty());
    assert_eq!(outcome.statistics.total, 0);
    assert!(listener.final_statistics.is_some());
}

#[test]
fn test_statistics_match_reported_outcomes() {
    let file = contract_file();
    let mut refs = NamedTempFile::new().unwrap();
    writeln!(refs, "/pets:\n  name: Buddy").unwrap();
    let config = FuzzConfig::new(file.path(), "http://localhost:8080")
        .paths(Selection::parse("/pets", ';'))
        .ref_data(refs.path());
    let (outcome, listener) = run_with(&config, &PetService::new());

    let stats = listener.final_statistics.clone().unwrap();
    assert_eq!(stats, outcome.statistics);
    assert_eq!(stats.all() as usize, listener.outcomes.len());
    assert_eq!(stats.skipped as usize, listener.skipped.len());
    assert!(stats.skipped > 0);
    assert_eq!(stats.total, stats.success + stats.warnings + stats.errors + stats.skipped);
    assert!(listener.skipped.iter().all(|s| s.reason.contains("name")));
}

#[test]
fn test_transport_failures_do_not_abort() {
    let file = contract_file();
    let config = FuzzConfig::new(file.path(), "http://localhost:8080")
        .fuzzers(Selection::parse("HappyFuzzer", ','));
    let (outcome, listener) = run_with(&config, &Unreachable);

    assert!(outcome.error.is_none());
    assert_eq!(listener.outcomes.len(), 4);
    assert_eq!(outcome.statistics.errors, 4);
    assert!(listener.outcomes.iter().all(|o| o.actual.is_none()));
}

#[test]
fn test_missing_contract_aborts_with_summary() {
    let config = FuzzConfig::new("/no/such/contract.yml", "http://localhost:8080");
    let (outcome, listener) = run_with(&config, &PetService::new());

    assert!(outcome.is_aborted());
    assert_eq!(outcome.statistics.total, 0);
    assert_eq!(listener.sessions_started, 1);
    assert!(listener.final_statistics.is_some());
}
