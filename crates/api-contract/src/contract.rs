//! Contract loading
//!
//! Reads an OpenAPI 3 or Swagger 2 document and builds the resolved
//! path → method → operation model.

use crate::resolver::RefResolver;
use crate::{ContractError, HttpMethod, Result, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const JSON_MEDIA_TYPE: &str = "application/json";

/// Where a parameter is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<Schema>,
    /// Status code (`"200"`, `"4XX"`, `"default"`) → response body schema
    pub responses: BTreeMap<String, Option<Schema>>,
}

impl Operation {
    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    pub fn response_codes(&self) -> Vec<String> {
        self.responses.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    operations: BTreeMap<HttpMethod, Operation>,
}

impl PathItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, method: HttpMethod, operation: Operation) -> Self {
        self.operations.insert(method, operation);
        self
    }

    /// Operations in `HttpMethod` order
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        self.operations.iter().map(|(m, o)| (*m, o))
    }

    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.operations.get(&method)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A loaded, fully dereferenced contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub title: Option<String>,
    pub version: Option<String>,
    /// Path template → operations, sorted by path
    pub paths: BTreeMap<String, PathItem>,
    /// Named component schemas (`components.schemas` or `definitions`)
    pub schemas: BTreeMap<String, Schema>,
}

impl Contract {
    /// Load a contract from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading contract from {:?}", path);

        let content = fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        let document = if is_yaml {
            parse_yaml(&content)?
        } else {
            match serde_json::from_str::<Value>(&content) {
                Ok(value) => value,
                Err(json_err) => parse_yaml(&content).map_err(|_| {
                    ContractError::Parse(format!("not valid JSON or YAML: {}", json_err))
                })?,
            }
        };

        Self::from_value(&document)
    }

    /// Build the resolved model from an in-memory document
    pub fn from_value(document: &Value) -> Result<Self> {
        if document.get("openapi").is_none() && document.get("swagger").is_none() {
            return Err(ContractError::Invalid(
                "missing 'openapi' or 'swagger' version key".to_string(),
            ));
        }
        let raw_paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| ContractError::Invalid("missing 'paths' object".to_string()))?;

        let mut resolver = RefResolver::new(document);

        let mut schemas = BTreeMap::new();
        let named = document
            .pointer("/components/schemas")
            .or_else(|| document.get("definitions"))
            .and_then(Value::as_object);
        if let Some(named) = named {
            for (name, raw) in named {
                schemas.insert(name.clone(), resolver.resolve_schema(raw)?);
            }
        }

        let mut paths = BTreeMap::new();
        for (template, raw_item) in raw_paths {
            let raw_item = resolver.deref(raw_item)?;
            let shared = parse_parameters(&mut resolver, raw_item.get("parameters"))?;
            let mut item = PathItem::new();

            for method in HttpMethod::ALL {
                let key = method.as_str().to_ascii_lowercase();
                let Some(raw_op) = raw_item.get(&key) else {
                    continue;
                };
                let operation = parse_operation(&mut resolver, raw_op, &shared)?;
                item.operations.insert(method, operation);
            }
            paths.insert(template.clone(), item);
        }

        let info = document.get("info");
        let contract = Self {
            title: info
                .and_then(|i| i.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string),
            version: info
                .and_then(|i| i.get("version"))
                .and_then(Value::as_str)
                .map(str::to_string),
            paths,
            schemas,
        };

        info!(
            "Loaded contract with {} paths and {} schemas",
            contract.paths.len(),
            contract.schemas.len()
        );
        Ok(contract)
    }

    pub fn path_names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }
}

/// YAML contracts often use unquoted status codes as keys, so go through
/// `serde_yaml::Value` and let `serde_json` stringify non-string keys
fn parse_yaml(content: &str) -> Result<Value> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ContractError::Parse(e.to_string()))?;
    serde_json::to_value(yaml).map_err(|e| ContractError::Parse(e.to_string()))
}

/// Parameters plus a Swagger 2 `in: body` schema, if any
struct ParsedParameters {
    parameters: Vec<Parameter>,
    body: Option<Schema>,
}

fn parse_parameters<'a>(
    resolver: &mut RefResolver<'a>,
    raw: Option<&'a Value>,
) -> Result<ParsedParameters> {
    let mut parsed = ParsedParameters {
        parameters: Vec::new(),
        body: None,
    };
    let Some(list) = raw.and_then(Value::as_array) else {
        return Ok(parsed);
    };

    for raw_param in list {
        let raw_param = resolver.deref(raw_param)?;
        let name = raw_param
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let location_name = raw_param.get("in").and_then(Value::as_str).unwrap_or_default();

        if location_name == "body" {
            if let Some(schema) = raw_param.get("schema") {
                parsed.body = Some(resolver.resolve_schema(schema)?);
            }
            continue;
        }
        let Some(location) = ParameterLocation::from_name(location_name) else {
            debug!("Ignoring parameter {} in unsupported location '{}'", name, location_name);
            continue;
        };

        // Swagger 2 keeps the type keywords on the parameter itself
        let schema = match raw_param.get("schema") {
            Some(schema) => resolver.resolve_schema(schema)?,
            None => resolver.resolve_schema(raw_param)?,
        };
        let required = location == ParameterLocation::Path
            || raw_param
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false);

        parsed.parameters.push(Parameter {
            name,
            location,
            required,
            schema,
        });
    }
    Ok(parsed)
}

fn parse_operation<'a>(
    resolver: &mut RefResolver<'a>,
    raw: &'a Value,
    shared: &ParsedParameters,
) -> Result<Operation> {
    let own = parse_parameters(resolver, raw.get("parameters"))?;

    // operation-level parameters override path-level ones with the same name and location
    let mut parameters: Vec<Parameter> = shared
        .parameters
        .iter()
        .filter(|p| {
            !own.parameters
                .iter()
                .any(|o| o.name == p.name && o.location == p.location)
        })
        .cloned()
        .collect();
    parameters.extend(own.parameters);

    let request_body = match raw.get("requestBody") {
        Some(body) => {
            let body = resolver.deref(body)?;
            match json_schema_of(body) {
                Some(schema) => Some(resolver.resolve_schema(schema)?),
                None => None,
            }
        }
        None => own.body.or_else(|| shared.body.clone()),
    };

    let mut responses = BTreeMap::new();
    if let Some(raw_responses) = raw.get("responses").and_then(Value::as_object) {
        for (code, response) in raw_responses {
            let response = resolver.deref(response)?;
            let schema = match json_schema_of(response).or_else(|| response.get("schema")) {
                Some(schema) => Some(resolver.resolve_schema(schema)?),
                None => None,
            };
            responses.insert(code.clone(), schema);
        }
    }

    Ok(Operation {
        operation_id: raw
            .get("operationId")
            .and_then(Value::as_str)
            .map(str::to_string),
        parameters,
        request_body,
        responses,
    })
}

/// Schema of the JSON media type of a request body or response, falling back to the first one
fn json_schema_of(holder: &Value) -> Option<&Value> {
    let content = holder.get("content")?.as_object()?;
    let media = content
        .get(JSON_MEDIA_TYPE)
        .or_else(|| {
            content
                .iter()
                .find(|(name, _)| name.contains("json"))
                .map(|(_, media)| media)
        })
        .or_else(|| content.values().next())?;
    media.get("schema")
}
