//! API Contract Model
//!
//! Loads OpenAPI 3 and Swagger 2 documents (JSON or YAML) and turns them into a
//! fully dereferenced schema graph keyed by path → method → operation.
//!
//! Consumers never see a `$ref`: every schema reachable from an operation is
//! resolved while the contract is loaded.
//!
//! # Usage
//!
//! ```rust,ignore
//! use api_contract::{Contract, HttpMethod};
//!
//! let contract = Contract::from_file("petstore.yml")?;
//! for (path, item) in &contract.paths {
//!     for (method, operation) in item.operations() {
//!         println!("{method} {path} -> {:?}", operation.operation_id);
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod contract;
pub mod resolver;
pub mod schema;

pub use contract::{Contract, Operation, Parameter, ParameterLocation, PathItem};
pub use schema::{Bound, Schema, SchemaKind, FIELD_SEPARATOR};

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse contract: {0}")]
    Parse(String),
    #[error("Invalid contract: {0}")]
    Invalid(String),
    #[error("Unresolved reference: {0}")]
    UnresolvedRef(String),
    #[error("Unknown HTTP method: {0}")]
    UnknownMethod(String),
}

pub type Result<T> = std::result::Result<T, ContractError>;

/// HTTP methods an operation can be declared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Whether requests with this method carry a JSON body
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ContractError::UnknownMethod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("Delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_method_body() {
        assert!(HttpMethod::Post.has_body());
        assert!(HttpMethod::Patch.has_body());
        assert!(!HttpMethod::Get.has_body());
        assert!(!HttpMethod::Delete.has_body());
    }

    #[test]
    fn test_method_ordering_is_declaration_order() {
        let mut methods = vec![HttpMethod::Delete, HttpMethod::Get, HttpMethod::Post];
        methods.sort();
        assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Post, HttpMethod::Delete]);
    }
}
