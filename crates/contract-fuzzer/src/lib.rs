//! Contract Fuzzer
//!
//! Contract-driven negative testing for REST APIs. For every operation of an
//! OpenAPI contract a payload is generated, every registered fuzzer mutates it
//! (boundary values, nulls, whitespace, removed fields, ...), the request is
//! sent, and the response code is classified against what the fuzzer expects.
//!
//! # Usage
//!
//! ```rust,ignore
//! use contract_fuzzer::prelude::*;
//!
//! let config = FuzzConfig::new("petstore.yml", "http://localhost:8080");
//! let caller = HttpServiceCaller::new(config.connection_timeout)?;
//! let mut listener = TracingListener::default();
//!
//! let outcome = Session::new(&config, &caller, &mut listener)
//!     .run(|| Contract::from_file(&config.contract));
//! outcome.statistics.print_summary();
//! ```

use thiserror::Error;

pub mod boundary;
pub mod caller;
pub mod config;
pub mod factory;
pub mod fuzzers;
pub mod listener;
pub mod model;
pub mod orchestrator;
pub mod payload;
pub mod session;
pub mod strategy;

pub mod prelude {
    pub use crate::caller::{HttpServiceCaller, ServiceCaller, ServiceRequest, ServiceResponse};
    pub use crate::config::{FuzzConfig, Selection};
    pub use crate::factory::FuzzingDataFactory;
    pub use crate::fuzzers::{Fuzzer, FuzzerRegistry};
    pub use crate::listener::{ExecutionStatistics, Listener, RecordingListener, TracingListener};
    pub use crate::model::{FuzzingData, ResponseCodeFamily};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::session::{Session, SessionOutcome};
    pub use crate::strategy::{merge_fuzzing, FuzzingStrategy};
    pub use api_contract::{Contract, HttpMethod};
}

#[derive(Error, Debug)]
pub enum FuzzError {
    #[error("Contract error: {0}")]
    Contract(#[from] api_contract::ContractError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, FuzzError>;
