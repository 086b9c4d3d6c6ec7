//! Service caller
//!
//! Executes one request against the service under test. The fuzzers only
//! see the [`ServiceCaller`] trait, so tests can substitute a scripted caller.

use api_contract::HttpMethod;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::model::FuzzingData;
use crate::payload::query_pairs;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body; only set for methods that carry one
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl ServiceRequest {
    /// Build the request for `data` with `payload` in place of its template
    pub fn from_data(server: &str, data: &FuzzingData, payload: &Value) -> Self {
        let url = format!("{}{}", server.trim_end_matches('/'), data.resolved_path());
        let headers = data
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let (body, query) = if data.method.has_body() {
            (Some(payload.clone()), Vec::new())
        } else {
            (None, query_pairs(payload))
        };
        Self {
            method: data.method,
            url,
            headers,
            body,
            query,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: String,
}

impl ServiceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub trait ServiceCaller {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, CallError>;
}

/// Blocking HTTP transport
pub struct HttpServiceCaller {
    client: reqwest::blocking::Client,
}

impl HttpServiceCaller {
    pub fn new(timeout: Duration) -> Result<Self, CallError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl ServiceCaller for HttpServiceCaller {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, CallError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| CallError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!("{} {}", request.method, request.url);
        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                CallError::Timeout(e.to_string())
            } else if e.is_builder() {
                CallError::InvalidRequest(e.to_string())
            } else {
                CallError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| CallError::Transport(e.to_string()))?;
        Ok(ServiceResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_request() {
        let data = FuzzingData::new(HttpMethod::Put, "/pets/{petId}")
            .with_path_param("petId", "9")
            .with_header("X-Tenant", "acme");
        let payload = json!({"name": "rex"});

        let request = ServiceRequest::from_data("http://localhost:8080/", &data, &payload);
        assert_eq!(request.url, "http://localhost:8080/pets/9");
        assert_eq!(request.body, Some(payload));
        assert!(request.query.is_empty());
        assert_eq!(request.headers, vec![("X-Tenant".to_string(), "acme".to_string())]);
    }

    #[test]
    fn test_query_request() {
        let data = FuzzingData::new(HttpMethod::Get, "/pets");
        let payload = json!({"limit": 5, "cursor": null});

        let request = ServiceRequest::from_data("http://api", &data, &payload);
        assert_eq!(request.url, "http://api/pets");
        assert!(request.body.is_none());
        assert_eq!(request.query, vec![("limit".to_string(), "5".to_string())]);
    }

    #[test]
    fn test_unreachable_server_is_a_call_error() {
        let caller = HttpServiceCaller::new(Duration::from_millis(200)).unwrap();
        let request = ServiceRequest {
            method: HttpMethod::Get,
            url: "http://127.0.0.1:9/unreachable".to_string(),
            headers: Vec::new(),
            body: None,
            query: Vec::new(),
        };
        assert!(caller.call(&request).is_err());
    }
}
