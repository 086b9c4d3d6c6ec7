//! Contract Fuzzer CLI
//!
//! Usage:
//!   contract-fuzz --contract api.yml --server http://localhost:8080 [OPTIONS]
//!   contract-fuzz list fuzzers
//!   contract-fuzz list paths --contract api.yml
//!   contract-fuzz list fieldsFuzzerStrategies
//!   contract-fuzz version
//!
//! Examples:
//!   contract-fuzz --contract api.yml --server http://localhost:8080
//!   contract-fuzz --contract api.yml --server http://localhost:8080 \
//!                 --fuzzers HappyFuzzer,RemoveFieldsFuzzer --paths "/pets;/owners"
//!   contract-fuzz --contract api.yml --server http://localhost:8080 \
//!                 --refData refs.yml --headers headers.yml --reportingLevel warn

use anyhow::{Context, Result};
use api_contract::Contract;
use clap::{Parser, Subcommand, ValueEnum};
use contract_fuzzer::config::{parse_url_params, FuzzConfig, ReportingLevel, Selection};
use contract_fuzzer::fuzzers::FuzzerRegistry;
use contract_fuzzer::listener::{ExecutionStatistics, Listener, TracingListener};
use contract_fuzzer::model::{EdgeSpacesStrategy, FieldsFuzzingStrategy};
use contract_fuzzer::caller::HttpServiceCaller;
use contract_fuzzer::session::Session;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGETS: [&str; 3] = ["contract_fuzz", "contract_fuzzer", "api_contract"];

#[derive(Parser, Debug)]
#[command(
    name = "contract-fuzz",
    about = "Negative and boundary testing of REST APIs driven by their OpenAPI contract"
)]
struct FuzzArgs {
    #[command(subcommand)]
    command: Option<Command>,

    /// OpenAPI / Swagger contract (JSON or YAML)
    #[arg(long, global = true)]
    contract: Option<PathBuf>,

    /// Base URL of the service under test
    #[arg(long)]
    server: Option<String>,

    /// `all` or a comma separated list of fuzzer names
    #[arg(long, default_value = "all")]
    fuzzers: String,

    /// `all` or a semicolon separated list of contract paths
    #[arg(long, default_value = "all")]
    paths: String,

    /// ONEBYONE, SIZE or POWERSET
    #[arg(long = "fieldsFuzzingStrategy", default_value = "ONEBYONE")]
    fields_fuzzing_strategy: String,

    /// Largest number of fields removed together with SIZE
    #[arg(long = "maxFieldsToRemove")]
    max_fields_to_remove: Option<usize>,

    /// YAML file of fixed field values per path
    #[arg(long = "refData")]
    ref_data: Option<PathBuf>,

    /// YAML file of headers per path
    #[arg(long)]
    headers: Option<PathBuf>,

    /// info, warn or error
    #[arg(long = "reportingLevel", default_value = "info")]
    reporting_level: String,

    /// trimAndValidate or validateAndTrim
    #[arg(long = "edgeSpacesStrategy", default_value = "trimAndValidate")]
    edge_spaces_strategy: String,

    /// Path parameter values as name:value;name:value
    #[arg(long = "urlParams", default_value = "")]
    url_params: String,

    /// YAML file with user-defined test cases
    #[arg(long = "customFuzzerFile")]
    custom_fuzzer_file: Option<PathBuf>,

    /// Extra log directive as target:level, repeatable
    #[arg(long = "log")]
    log: Vec<String>,

    /// Request timeout in seconds
    #[arg(long = "connectionTimeout", default_value_t = 10)]
    connection_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List fuzzers, contract paths or field fuzzing strategies
    List {
        #[arg(value_enum)]
        what: ListTarget,
    },
    /// Print the version
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ListTarget {
    #[value(name = "fuzzers")]
    Fuzzers,
    #[value(name = "paths")]
    Paths,
    #[value(name = "fieldsFuzzerStrategies")]
    FieldsFuzzerStrategies,
}

impl FuzzArgs {
    fn to_config(&self) -> contract_fuzzer::Result<FuzzConfig> {
        let mut config = FuzzConfig::new(
            self.contract.clone().unwrap_or_default(),
            self.server.as_deref().unwrap_or_default(),
        )
        .fuzzers(Selection::parse(&self.fuzzers, ','))
        .paths(Selection::parse(&self.paths, ';'))
        .fields_fuzzing_strategy(self.fields_fuzzing_strategy.parse::<FieldsFuzzingStrategy>()?)
        .edge_spaces_strategy(self.edge_spaces_strategy.parse::<EdgeSpacesStrategy>()?)
        .connection_timeout(Duration::from_secs(self.connection_timeout));

        config.reporting_level = self.reporting_level.parse::<ReportingLevel>()?;
        config.url_params = parse_url_params(&self.url_params)?;
        if let Some(n) = self.max_fields_to_remove {
            config = config.max_fields_to_remove(n);
        }
        if let Some(path) = &self.ref_data {
            config = config.ref_data(path);
        }
        if let Some(path) = &self.headers {
            config = config.headers(path);
        }
        if let Some(path) = &self.custom_fuzzer_file {
            config = config.custom_fuzzer_file(path);
        }
        Ok(config)
    }

    /// `RUST_LOG` wins; otherwise the reporting level for our crates plus `--log`
    fn log_filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let level = self
            .reporting_level
            .parse::<ReportingLevel>()
            .unwrap_or_default();
        let mut directives: Vec<String> = CRATE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level.as_str()))
            .collect();
        directives.push("warn".to_string());
        for entry in &self.log {
            let (target, level) = entry
                .split_once(':')
                .with_context(|| format!("--log expects target:level, got {}", entry))?;
            directives.push(format!("{}={}", target.trim(), level.trim()));
        }
        EnvFilter::try_new(directives.join(",")).context("invalid log directive")
    }
}

fn main() -> ExitCode {
    let args = FuzzArgs::parse();

    let filter = match args.log_filter() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(1);
        }
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &args.command {
        Some(Command::Version) => {
            println!("contract-fuzz {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some(Command::List { what }) => match list(*what, &args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::from(1)
            }
        },
        None => run(&args),
    }
}

fn list(what: ListTarget, args: &FuzzArgs) -> Result<()> {
    match what {
        ListTarget::Fuzzers => {
            let registry = FuzzerRegistry::with_defaults();
            println!("Registered fuzzers ({}):", registry.len());
            for fuzzer in registry.iter() {
                println!("  {:<40} {}", fuzzer.name(), fuzzer.description());
            }
        }
        ListTarget::Paths => {
            let path = args
                .contract
                .as_ref()
                .context("list paths requires --contract")?;
            let contract = Contract::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            println!("Contract paths ({}):", contract.paths.len());
            for (name, item) in &contract.paths {
                let methods: Vec<String> = item.operations().map(|(m, _)| m.to_string()).collect();
                println!("  {:<40} {}", name, methods.join(", "));
            }
        }
        ListTarget::FieldsFuzzerStrategies => {
            println!("Fields fuzzing strategies:");
            for strategy in FieldsFuzzingStrategy::ALL {
                println!("  {}", strategy);
            }
        }
    }
    Ok(())
}

fn run(args: &FuzzArgs) -> ExitCode {
    let mut listener = TracingListener;

    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => return abort(&mut listener, &e),
    };
    let caller = match HttpServiceCaller::new(config.connection_timeout) {
        Ok(caller) => caller,
        Err(e) => return abort(&mut listener, &e),
    };

    let outcome = Session::new(&config, &caller, &mut listener)
        .run(|| Contract::from_file(&config.contract));
    outcome.statistics.print_summary();

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Fatal error before a session could start
fn abort(listener: &mut dyn Listener, e: &dyn std::fmt::Display) -> ExitCode {
    let statistics = ExecutionStatistics::new();
    listener.start_session();
    error!("Fuzzing aborted: {}", e);
    listener.end_session(&statistics);
    statistics.print_summary();
    ExitCode::from(1)
}
