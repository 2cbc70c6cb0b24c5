//! Engine wiring for the command-line host

use crate::error::{CliError, CliResult};
use compliance_engine::{
    ActivityEnv, ComplianceCatalog, EngineConfig, InMemoryNotifier, InMemoryStorage,
    MemoryCheckpointStore, SystemClock, WorkflowRuntime,
};
use compliance_types::Company;
use std::sync::Arc;

/// The catalog named in the configuration, or the built-in one
pub fn load_catalog(config: &EngineConfig) -> CliResult<ComplianceCatalog> {
    match &config.catalog_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading compliance catalog");
            Ok(ComplianceCatalog::from_path(path)?)
        }
        None => Ok(ComplianceCatalog::builtin()),
    }
}

/// Companies from a JSON array file
pub fn load_companies(path: &str) -> CliResult<Vec<Company>> {
    let raw = std::fs::read_to_string(path)?;
    let companies: Vec<Company> = serde_json::from_str(&raw)
        .map_err(|e| CliError::InvalidInput(format!("{}: {}", path, e)))?;
    Ok(companies)
}

/// In-memory collaborators behind a runtime
pub struct Host {
    pub runtime: WorkflowRuntime,
    pub notifier: InMemoryNotifier,
}

impl Host {
    pub async fn new(config: &EngineConfig, companies: Vec<Company>) -> CliResult<Self> {
        let catalog = Arc::new(load_catalog(config)?);

        let mut storage = InMemoryStorage::new();
        for company in companies {
            storage = storage.with_company(company).await;
        }
        let notifier = InMemoryNotifier::new();

        let env = ActivityEnv::new(
            catalog,
            Arc::new(storage),
            Arc::new(notifier.clone()),
            Arc::new(SystemClock),
            config.clone(),
        );
        let runtime = WorkflowRuntime::new(env, Arc::new(MemoryCheckpointStore::new()));

        Ok(Self { runtime, notifier })
    }
}
