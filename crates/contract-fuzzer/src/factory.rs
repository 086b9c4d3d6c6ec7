//! FuzzingData construction
//!
//! Turns each supported operation of a contract path into a [`FuzzingData`]
//! record: generated payload, its schema, path parameters, headers and the
//! reference-data overlay.

use api_contract::{Contract, HttpMethod, Operation, ParameterLocation, Schema};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::PathScopedValues;
use crate::model::FuzzingData;
use crate::payload::{example_value, insert_field};
use crate::strategy::value_as_text;

/// Methods the fuzzers know how to exercise
pub const SUPPORTED_METHODS: [HttpMethod; 5] = [
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Patch,
    HttpMethod::Get,
    HttpMethod::Delete,
];

pub struct FuzzingDataFactory<'a> {
    contract: &'a Contract,
    url_params: BTreeMap<String, String>,
    ref_data: PathScopedValues,
    headers: PathScopedValues,
}

impl<'a> FuzzingDataFactory<'a> {
    pub fn new(contract: &'a Contract) -> Self {
        Self {
            contract,
            url_params: BTreeMap::new(),
            ref_data: PathScopedValues::default(),
            headers: PathScopedValues::default(),
        }
    }

    pub fn url_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.url_params = params;
        self
    }

    pub fn ref_data(mut self, values: PathScopedValues) -> Self {
        self.ref_data = values;
        self
    }

    pub fn headers(mut self, values: PathScopedValues) -> Self {
        self.headers = values;
        self
    }

    /// One record per supported method of `path`, in method order
    pub fn create(&self, path: &str) -> Vec<FuzzingData> {
        let Some(item) = self.contract.paths.get(path) else {
            debug!("Path {} is not part of the contract", path);
            return Vec::new();
        };
        let data: Vec<FuzzingData> = item
            .operations()
            .filter(|(method, _)| SUPPORTED_METHODS.contains(method))
            .map(|(method, operation)| self.create_for(path, method, operation))
            .collect();
        info!("Path {} has {} fuzzable operation(s)", path, data.len());
        data
    }

    fn create_for(&self, path: &str, method: HttpMethod, operation: &Operation) -> FuzzingData {
        let schema = if method.has_body() {
            operation.request_body.clone().unwrap_or_else(Schema::object)
        } else {
            query_schema(operation)
        };
        let mut payload = example_value(&schema);
        let pinned = self.ref_data.for_path(path);
        let path_names = template_params(path);

        let mut data = FuzzingData::new(method, path)
            .with_response_codes(operation.response_codes());

        for (field, value) in &pinned {
            if path_names.iter().any(|name| name == field) {
                continue;
            }
            insert_field(&mut payload, field, value.clone());
            data = data.with_ref_data(field, value.clone());
        }

        for name in &path_names {
            let value = self.path_param_value(name, operation, &pinned);
            data = data.with_path_param(name, &value);
        }

        for parameter in operation.parameters_in(ParameterLocation::Header) {
            data = data.with_header(&parameter.name, &value_as_text(&example_value(&parameter.schema)));
        }
        for (name, value) in self.headers.for_path(path) {
            data = data.with_header(&name, &value_as_text(&value));
        }

        data.with_schema(schema).with_payload(payload)
    }

    /// `--urlParams`, then reference data, then the parameter's sample value
    fn path_param_value(
        &self,
        name: &str,
        operation: &Operation,
        pinned: &BTreeMap<String, Value>,
    ) -> String {
        if let Some(value) = self.url_params.get(name) {
            return value.clone();
        }
        if let Some(value) = pinned.get(name) {
            return value_as_text(value);
        }
        operation
            .parameters_in(ParameterLocation::Path)
            .find(|p| p.name == name)
            .map(|p| value_as_text(&example_value(&p.schema)))
            .unwrap_or_else(|| "1".to_string())
    }
}

/// Object schema whose properties are the operation's query parameters
fn query_schema(operation: &Operation) -> Schema {
    operation
        .parameters_in(ParameterLocation::Query)
        .fold(Schema::object(), |schema, parameter| {
            if parameter.required {
                schema.required_property(&parameter.name, parameter.schema.clone())
            } else {
                schema.property(&parameter.name, parameter.schema.clone())
            }
        })
}

/// `{name}` placeholders of a path template, in order of appearance
fn template_params(path: &str) -> Vec<String> {
    path.split('{')
        .skip(1)
        .filter_map(|rest| rest.split_once('}').map(|(name, _)| name.to_string()))
        .collect()
}
