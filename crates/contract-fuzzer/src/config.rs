//! Run configuration
//!
//! `FuzzConfig` is the validated form of the command line. Reference data,
//! headers and custom tests live in YAML files that are loaded once when the
//! session starts.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::model::{EdgeSpacesStrategy, FieldsFuzzingStrategy};
use crate::{FuzzError, Result};

/// Key of the section in path-scoped files that applies to every path
pub const ALL_PATHS: &str = "all";

pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Selections
// ============================================================================

/// `all`, or an explicit list of names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Named(Vec<String>),
}

impl Selection {
    /// Parse a `separator`-joined list; blank input and `all` select everything
    pub fn parse(input: &str, separator: char) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Selection::All;
        }
        let names: Vec<String> = trimmed
            .split(separator)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            Selection::All
        } else {
            Selection::Named(names)
        }
    }

    pub fn includes(&self, name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Named(names) => names.iter().any(|n| n == name),
        }
    }
}

// ============================================================================
// Reporting level
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportingLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl ReportingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingLevel::Info => "info",
            ReportingLevel::Warn => "warn",
            ReportingLevel::Error => "error",
        }
    }
}

impl FromStr for ReportingLevel {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(ReportingLevel::Info),
            "warn" | "warning" => Ok(ReportingLevel::Warn),
            "error" => Ok(ReportingLevel::Error),
            other => Err(FuzzError::InvalidArgument(format!(
                "reporting level {} (expected info, warn or error)",
                other
            ))),
        }
    }
}

// ============================================================================
// Path-scoped values
// ============================================================================

/// YAML map of `path | all` → field → value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathScopedValues {
    entries: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PathScopedValues {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let values = Self::from_yaml(&content)?;
        info!(
            "Loaded {} path section(s) from {}",
            values.entries.len(),
            path.display()
        );
        Ok(values)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        let entries: BTreeMap<String, BTreeMap<String, Value>> =
            serde_json::from_value(serde_json::to_value(raw)?)?;
        Ok(Self { entries })
    }

    pub fn insert(&mut self, path: &str, field: &str, value: Value) {
        self.entries
            .entry(path.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    /// Values for `path`: the `all` section overlaid with the path's own
    pub fn for_path(&self, path: &str) -> BTreeMap<String, Value> {
        let mut merged = self.entries.get(ALL_PATHS).cloned().unwrap_or_default();
        if let Some(specific) = self.entries.get(path) {
            merged.extend(specific.clone());
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse `name:value;name:value`
pub fn parse_url_params(input: &str) -> Result<BTreeMap<String, String>> {
    input
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| {
                    FuzzError::InvalidArgument(format!("url parameter '{}' is not name:value", entry))
                })
        })
        .collect()
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzConfig {
    pub contract: PathBuf,
    /// Base URL requests are sent to
    pub server: String,
    pub fuzzers: Selection,
    pub paths: Selection,
    pub fields_fuzzing_strategy: FieldsFuzzingStrategy,
    /// Largest subset `SIZE` removes; `None` means every size
    pub max_fields_to_remove: Option<usize>,
    pub ref_data_file: Option<PathBuf>,
    pub headers_file: Option<PathBuf>,
    pub reporting_level: ReportingLevel,
    pub edge_spaces_strategy: EdgeSpacesStrategy,
    pub url_params: BTreeMap<String, String>,
    pub custom_fuzzer_file: Option<PathBuf>,
    pub connection_timeout: Duration,
}

impl FuzzConfig {
    pub fn new(contract: impl Into<PathBuf>, server: &str) -> Self {
        Self {
            contract: contract.into(),
            server: server.to_string(),
            fuzzers: Selection::All,
            paths: Selection::All,
            fields_fuzzing_strategy: FieldsFuzzingStrategy::default(),
            max_fields_to_remove: None,
            ref_data_file: None,
            headers_file: None,
            reporting_level: ReportingLevel::default(),
            edge_spaces_strategy: EdgeSpacesStrategy::default(),
            url_params: BTreeMap::new(),
            custom_fuzzer_file: None,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    pub fn fuzzers(mut self, selection: Selection) -> Self {
        self.fuzzers = selection;
        self
    }

    pub fn paths(mut self, selection: Selection) -> Self {
        self.paths = selection;
        self
    }

    pub fn fields_fuzzing_strategy(mut self, strategy: FieldsFuzzingStrategy) -> Self {
        self.fields_fuzzing_strategy = strategy;
        self
    }

    pub fn max_fields_to_remove(mut self, n: usize) -> Self {
        self.max_fields_to_remove = Some(n);
        self
    }

    pub fn ref_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.ref_data_file = Some(path.into());
        self
    }

    pub fn headers(mut self, path: impl Into<PathBuf>) -> Self {
        self.headers_file = Some(path.into());
        self
    }

    pub fn edge_spaces_strategy(mut self, strategy: EdgeSpacesStrategy) -> Self {
        self.edge_spaces_strategy = strategy;
        self
    }

    pub fn url_param(mut self, name: &str, value: &str) -> Self {
        self.url_params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn custom_fuzzer_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_fuzzer_file = Some(path.into());
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Check the mandatory arguments
    pub fn validate(&self) -> Result<()> {
        if self.contract.as_os_str().is_empty() {
            return Err(FuzzError::InvalidArgument(
                "missing required argument --contract".to_string(),
            ));
        }
        let server = self.server.trim();
        if server.is_empty() {
            return Err(FuzzError::InvalidArgument(
                "missing required argument --server".to_string(),
            ));
        }
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(FuzzError::InvalidArgument(format!(
                "server '{}' must be an http(s) URL",
                server
            )));
        }
        if self.max_fields_to_remove == Some(0) {
            return Err(FuzzError::InvalidArgument(
                "--maxFieldsToRemove must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load_ref_data(&self) -> Result<PathScopedValues> {
        load_optional(self.ref_data_file.as_deref())
    }

    pub fn load_headers(&self) -> Result<PathScopedValues> {
        load_optional(self.headers_file.as_deref())
    }
}

fn load_optional(path: Option<&Path>) -> Result<PathScopedValues> {
    match path {
        Some(path) => PathScopedValues::from_file(path),
        None => Ok(PathScopedValues::default()),
    }
}
