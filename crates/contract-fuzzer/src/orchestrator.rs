//! Fuzz pass orchestration
//!
//! Pairs every selected path's [`FuzzingData`] with every selected fuzzer,
//! in sorted path order and sorted fuzzer order.

use api_contract::Contract;
use tracing::{debug, info, warn};

use crate::config::Selection;
use crate::factory::FuzzingDataFactory;
use crate::fuzzers::{FuzzContext, Fuzzer, FuzzerRegistry};
use crate::model::FuzzingData;

/// Contract paths in `selection`, sorted; unknown names are warned about
pub fn select_paths(contract: &Contract, selection: &Selection) -> Vec<String> {
    if let Selection::Named(names) = selection {
        for name in names {
            if !contract.paths.contains_key(name) {
                warn!("Supplied path is not part of the contract: {}", name);
            }
        }
    }
    contract
        .path_names()
        .filter(|path| selection.includes(path))
        .map(str::to_string)
        .collect()
}

/// Registered fuzzers in `selection`, in name order; unknown names are warned about
pub fn select_fuzzers<'r>(registry: &'r FuzzerRegistry, selection: &Selection) -> Vec<&'r dyn Fuzzer> {
    if let Selection::Named(names) = selection {
        for name in names {
            if registry.get(name).is_none() {
                warn!("Supplied fuzzer does not exist: {}", name);
            }
        }
    }
    registry
        .iter()
        .filter(|fuzzer| selection.includes(fuzzer.name()))
        .collect()
}

pub struct Orchestrator<'a> {
    contract: &'a Contract,
    factory: &'a FuzzingDataFactory<'a>,
    fuzzers: Vec<&'a dyn Fuzzer>,
    paths: Vec<String>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        contract: &'a Contract,
        factory: &'a FuzzingDataFactory<'a>,
        registry: &'a FuzzerRegistry,
        fuzzer_selection: &Selection,
        path_selection: &Selection,
    ) -> Self {
        Self {
            contract,
            factory,
            fuzzers: select_fuzzers(registry, fuzzer_selection),
            paths: select_paths(contract, path_selection),
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn fuzzers(&self) -> &[&'a dyn Fuzzer] {
        &self.fuzzers
    }

    /// Fuzz every selected path
    pub fn start_fuzzing(&self, ctx: &mut FuzzContext<'_>) {
        info!(
            "Fuzzing {} of {} path(s) with {} fuzzer(s)",
            self.paths.len(),
            self.contract.paths.len(),
            self.fuzzers.len()
        );
        for path in &self.paths {
            self.fuzz_path(path, ctx);
        }
    }

    pub fn fuzz_path(&self, path: &str, ctx: &mut FuzzContext<'_>) {
        let data = self.factory.create(path);
        if data.is_empty() {
            info!("Skipping path {}: no supported HTTP method", path);
            return;
        }

        for fuzzer in &self.fuzzers {
            let applicable: Vec<&FuzzingData> = data
                .iter()
                .filter(|d| {
                    let skipped = fuzzer.skip_for().contains(&d.method);
                    if skipped {
                        debug!("HTTP method {} is not supported by {}", d.method, fuzzer.name());
                    }
                    !skipped
                })
                .collect();
            if applicable.is_empty() {
                continue;
            }
            info!("Running {} on {}", fuzzer.name(), path);
            for item in applicable {
                fuzzer.fuzz(item, ctx);
            }
        }
    }
}
