//! Error types for the engine
//!
//! Three layers:
//!
//! - [`CollaboratorError`]: a call to storage or notification failed or
//!   timed out. Retryable when transient.
//! - [`ActivityError`]: what an activity returns. Carries an [`ErrorKind`]
//!   the driver acts on.
//! - [`RunFailure`]: the serializable terminal error of a run.
//!
//! Decisions are made on the kind, never on message text.

use crate::collaborators::{NotifyError, StorageError};
use crate::run::CheckpointError;
use crate::workflows::WorkflowKind;
use compliance_types::{ComplianceError, RunId};
use serde::{Deserialize, Serialize};

/// Machine-readable failure category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Expected business outcome; runs end successfully with a gate
    ValidationGate,
    /// Storage or notification failed after retries
    CollaboratorFailure,
    /// Entities disagree with each other; fatal
    DataInconsistency,
    /// Rejected at the boundary
    InvalidInput,
    /// Cancelled by the host
    Terminated,
    /// Driver fault, e.g. checkpoint serialization
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ValidationGate => "validation_gate",
            ErrorKind::CollaboratorFailure => "collaborator_failure",
            ErrorKind::DataInconsistency => "data_inconsistency",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Terminated => "terminated",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ── Collaborator ─────────────────────────────────────────────────────

/// A failed call to an external collaborator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} did not answer within {timeout_ms}ms")]
    Timeout {
        collaborator: &'static str,
        timeout_ms: u64,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl CollaboratorError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CollaboratorError::Timeout { .. } => true,
            CollaboratorError::Storage(e) => e.is_transient(),
            CollaboratorError::Notify(e) => e.is_transient(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CollaboratorError::Storage(
                StorageError::Conflict(_) | StorageError::NotFound(_) | StorageError::InvalidData(_),
            ) => ErrorKind::DataInconsistency,
            _ => ErrorKind::CollaboratorFailure,
        }
    }
}

// ── Activity ─────────────────────────────────────────────────────────

/// Error returned by an activity
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActivityError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Data inconsistency: {0}")]
    DataInconsistency(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ActivityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActivityError::Collaborator(e) => e.kind(),
            ActivityError::DataInconsistency(_) => ErrorKind::DataInconsistency,
            ActivityError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ActivityError::Collaborator(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn missing(entity: &str, id: impl std::fmt::Display) -> Self {
        ActivityError::DataInconsistency(format!("{} {} not found", entity, id))
    }
}

impl From<StorageError> for ActivityError {
    fn from(e: StorageError) -> Self {
        ActivityError::Collaborator(CollaboratorError::Storage(e))
    }
}

impl From<NotifyError> for ActivityError {
    fn from(e: NotifyError) -> Self {
        ActivityError::Collaborator(CollaboratorError::Notify(e))
    }
}

impl From<ComplianceError> for ActivityError {
    fn from(e: ComplianceError) -> Self {
        match e {
            ComplianceError::InvalidInput(msg) => ActivityError::InvalidInput(msg),
            other => ActivityError::DataInconsistency(other.to_string()),
        }
    }
}

/// Result type for activities
pub type ActivityResult<T> = Result<T, ActivityError>;

// ── Run ──────────────────────────────────────────────────────────────

/// Terminal error of a failed run, with the context gathered so far
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub error_kind: ErrorKind,
    pub message: String,
    pub workflow: WorkflowKind,
    pub run_id: RunId,
    /// First failing activity, if the failure came from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    /// Activities that completed before the failure
    pub completed_activities: Vec<String>,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} run {} failed", self.workflow, self.run_id)?;
        if let Some(activity) = &self.activity {
            write!(f, " in {}", activity)?;
        }
        write!(f, " ({}): {}", self.error_kind, self.message)
    }
}

// ── Engine ───────────────────────────────────────────────────────────

/// Errors from the host-facing runtime
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown event '{event}' for {workflow}")]
    UnknownEvent { workflow: WorkflowKind, event: String },

    #[error("Run {0} has already finished")]
    RunFinished(RunId),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::RunNotFound(_)
            | EngineError::UnknownWorkflow(_)
            | EngineError::InvalidInput(_)
            | EngineError::UnknownEvent { .. }
            | EngineError::RunFinished(_) => ErrorKind::InvalidInput,
            EngineError::Checkpoint(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for runtime operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_retryable_collaborator_failures() {
        let err = ActivityError::from(CollaboratorError::Timeout {
            collaborator: "storage",
            timeout_ms: 200,
        });
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    }

    #[test]
    fn test_conflicts_are_fatal_inconsistencies() {
        let err = ActivityError::from(StorageError::Conflict("regression".into()));
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::DataInconsistency);

        let err = ActivityError::from(StorageError::Connection("reset".into()));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    }

    #[test]
    fn test_rejected_notifications_are_not_retried() {
        let err = ActivityError::from(NotifyError::Rejected("bad recipient".into()));
        assert!(!err.is_retryable());
        assert!(ActivityError::from(NotifyError::Unavailable("down".into())).is_retryable());
    }

    #[test]
    fn test_compliance_errors_map_by_variant() {
        let err = ActivityError::from(ComplianceError::InvalidTransition {
            entity: "cc-1".into(),
            from: "Completed".into(),
            to: "InProgress".into(),
        });
        assert_eq!(err.kind(), ErrorKind::DataInconsistency);
        let err = ActivityError::from(ComplianceError::InvalidInput("empty id".into()));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::CollaboratorFailure).unwrap();
        assert_eq!(json, "\"collaborator_failure\"");
    }

    #[test]
    fn test_failure_display_names_run_and_activity() {
        let failure = RunFailure {
            error_kind: ErrorKind::DataInconsistency,
            message: "step s-1 not found".into(),
            workflow: WorkflowKind::StepCompletion,
            run_id: RunId::new("run-1"),
            activity: Some("validate_prerequisites".into()),
            completed_activities: vec![],
        };
        let text = failure.to_string();
        assert!(text.contains("step_completion"));
        assert!(text.contains("run-1"));
        assert!(text.contains("validate_prerequisites"));
    }
}
