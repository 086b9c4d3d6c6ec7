//! One fuzzing run from start to summary
//!
//! Fatal problems (bad arguments, unreadable contract or support files)
//! come back as the `error` of a [`SessionOutcome`]. The listener session is
//! closed and the statistics are returned in every case.

use api_contract::Contract;
use tracing::{error, info};

use crate::caller::ServiceCaller;
use crate::config::FuzzConfig;
use crate::factory::FuzzingDataFactory;
use crate::fuzzers::{FuzzContext, FuzzerRegistry, FuzzerSettings};
use crate::listener::{ExecutionStatistics, Listener};
use crate::orchestrator::Orchestrator;
use crate::{FuzzError, Result};

#[derive(Debug)]
pub struct SessionOutcome {
    pub statistics: ExecutionStatistics,
    /// Set when the run was aborted
    pub error: Option<FuzzError>,
}

impl SessionOutcome {
    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    /// Clean run without failed test cases
    pub fn is_success(&self) -> bool {
        !self.is_aborted() && !self.statistics.has_errors()
    }
}

pub struct Session<'a> {
    config: &'a FuzzConfig,
    caller: &'a dyn ServiceCaller,
    listener: &'a mut dyn Listener,
    registry: FuzzerRegistry,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a FuzzConfig,
        caller: &'a dyn ServiceCaller,
        listener: &'a mut dyn Listener,
    ) -> Self {
        Self {
            config,
            caller,
            listener,
            registry: FuzzerRegistry::with_defaults(),
        }
    }

    pub fn with_registry(mut self, registry: FuzzerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Run the whole pass; `load_contract` is only called once the config is valid
    pub fn run<F>(mut self, load_contract: F) -> SessionOutcome
    where
        F: FnOnce() -> api_contract::Result<Contract>,
    {
        self.listener.start_session();
        let mut statistics = ExecutionStatistics::new();

        let error = match self.execute(&mut statistics, load_contract) {
            Ok(()) => None,
            Err(e) => {
                error!("Fuzzing aborted: {}", e);
                Some(e)
            }
        };

        info!("Summary: {}", statistics);
        self.listener.end_session(&statistics);
        SessionOutcome { statistics, error }
    }

    fn execute<F>(&mut self, statistics: &mut ExecutionStatistics, load_contract: F) -> Result<()>
    where
        F: FnOnce() -> api_contract::Result<Contract>,
    {
        self.config.validate()?;
        let contract = load_contract()?;
        info!(
            "Loaded contract {} {} with {} path(s)",
            contract.title.as_deref().unwrap_or("<untitled>"),
            contract.version.as_deref().unwrap_or(""),
            contract.paths.len()
        );

        let settings = FuzzerSettings::from_config(self.config)?;
        let factory = FuzzingDataFactory::new(&contract)
            .url_params(self.config.url_params.clone())
            .ref_data(self.config.load_ref_data()?)
            .headers(self.config.load_headers()?);
        let orchestrator = Orchestrator::new(
            &contract,
            &factory,
            &self.registry,
            &self.config.fuzzers,
            &self.config.paths,
        );

        let mut ctx = FuzzContext {
            server: &self.config.server,
            caller: self.caller,
            listener: &mut *self.listener,
            statistics,
            settings: &settings,
        };
        orchestrator.start_fuzzing(&mut ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzers::testing::FixedCaller;
    use crate::listener::RecordingListener;
    use api_contract::ContractError;

    #[test]
    fn test_invalid_config_aborts_before_loading() {
        let config = FuzzConfig::new("api.yml", "");
        let caller = FixedCaller::new(200);
        let mut listener = RecordingListener::new();
        let mut loaded = false;

        let outcome = Session::new(&config, &caller, &mut listener).run(|| {
            loaded = true;
            Ok(Contract::default())
        });

        assert!(matches!(outcome.error, Some(FuzzError::InvalidArgument(_))));
        assert!(!loaded);
        assert_eq!(listener.sessions_started, 1);
        assert_eq!(listener.final_statistics, Some(ExecutionStatistics::new()));
    }

    #[test]
    fn test_contract_failure_still_ends_session() {
        let config = FuzzConfig::new("api.yml", "http://localhost:8080");
        let caller = FixedCaller::new(200);
        let mut listener = RecordingListener::new();

        let outcome = Session::new(&config, &caller, &mut listener)
            .run(|| Err(ContractError::Invalid("no paths".to_string())));

        assert!(matches!(outcome.error, Some(FuzzError::Contract(_))));
        assert!(!outcome.is_success());
        assert!(listener.final_statistics.is_some());
    }
}
