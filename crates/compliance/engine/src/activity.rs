//! Activity contract
//!
//! An activity is a named, idempotent unit of work with a typed input and
//! output. Activities reach collaborators only through [`ActivityEnv`],
//! which bounds every call by the configured timeout.

use crate::catalog::ComplianceCatalog;
use crate::clock::Clock;
use crate::collaborators::{NotifierPublisher, Notifier, ReportPublisher, StepQuery, Storage};
use crate::config::EngineConfig;
use crate::error::{ActivityError, ActivityResult, CollaboratorError};
use crate::evidence::{EvidenceValidator, RuleBasedEvidenceValidator};
use crate::matcher::ComplianceMatcher;
use crate::priority::PriorityCalculator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use compliance_types::{
    Company, CompanyComplianceRecord, CompanyComplianceStep, CompanyId, RecordId, StepId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Everything an activity may touch
#[derive(Clone)]
pub struct ActivityEnv {
    pub catalog: Arc<ComplianceCatalog>,
    pub storage: Arc<dyn Storage>,
    pub notifier: Arc<dyn Notifier>,
    pub publisher: Arc<dyn ReportPublisher>,
    pub evidence: Arc<dyn EvidenceValidator>,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
    matcher: ComplianceMatcher,
    priority: PriorityCalculator,
}

impl ActivityEnv {
    /// Build an environment with the default publisher and evidence validator
    pub fn new(
        catalog: Arc<ComplianceCatalog>,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let publisher = Arc::new(NotifierPublisher::new(
            notifier.clone(),
            config.reporting.recipients.clone(),
        ));
        let evidence = Arc::new(RuleBasedEvidenceValidator::new(config.evidence.clone()));
        Self {
            matcher: ComplianceMatcher::new(catalog.clone()),
            priority: PriorityCalculator::default(),
            catalog,
            storage,
            notifier,
            publisher,
            evidence,
            clock,
            config,
        }
    }

    pub fn with_evidence_validator(mut self, evidence: Arc<dyn EvidenceValidator>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn matcher(&self) -> &ComplianceMatcher {
        &self.matcher
    }

    pub fn priority(&self) -> &PriorityCalculator {
        &self.priority
    }

    /// Run a collaborator call under the configured timeout
    pub async fn bounded<T, E, F>(&self, collaborator: &'static str, call: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<CollaboratorError>,
    {
        let runtime = &self.config.runtime;
        match tokio::time::timeout(runtime.collaborator_timeout(), call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(CollaboratorError::Timeout {
                collaborator,
                timeout_ms: runtime.collaborator_timeout_ms,
            }),
        }
    }

    // ── Storage helpers ──────────────────────────────────────────────

    pub async fn company(&self, id: &CompanyId) -> ActivityResult<Company> {
        self.bounded("storage", self.storage.get_company(id))
            .await?
            .ok_or_else(|| ActivityError::missing("company", id))
    }

    pub async fn record(&self, id: &RecordId) -> ActivityResult<CompanyComplianceRecord> {
        self.bounded("storage", self.storage.get_record(id))
            .await?
            .ok_or_else(|| ActivityError::missing("compliance record", id))
    }

    pub async fn step(&self, id: &StepId) -> ActivityResult<CompanyComplianceStep> {
        self.bounded("storage", self.storage.get_step(id))
            .await?
            .ok_or_else(|| ActivityError::missing("step", id))
    }

    pub async fn steps_for_record(&self, id: &RecordId) -> ActivityResult<Vec<CompanyComplianceStep>> {
        Ok(self
            .bounded("storage", self.storage.query_steps(&StepQuery::for_record(id)))
            .await?)
    }
}

impl std::fmt::Debug for ActivityEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityEnv")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A named unit of work
#[async_trait]
pub trait Activity: Send + Sync {
    type Input: Send + Sync;
    type Output: Serialize + DeserializeOwned + Send;

    /// Stable name; checkpoints are keyed on it
    fn name(&self) -> &'static str;

    async fn execute(&self, env: &ActivityEnv, input: &Self::Input) -> ActivityResult<Self::Output>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::collaborators::{InMemoryNotifier, InMemoryStorage, StorageError};
    use crate::error::ErrorKind;
    use std::time::Duration;

    fn env() -> ActivityEnv {
        ActivityEnv::new(
            Arc::new(ComplianceCatalog::builtin()),
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryNotifier::new()),
            Arc::new(SystemClock),
            EngineConfig::for_tests(),
        )
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let env = env();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), StorageError>(())
        };
        let err = env.bounded("storage", slow).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Timeout { collaborator: "storage", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_entities_are_inconsistencies() {
        let env = env();
        let err = env.company(&CompanyId::new("ghost")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInconsistency);
        assert!(err.to_string().contains("ghost"));
    }
}
