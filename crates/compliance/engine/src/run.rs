//! Run state and checkpoints
//!
//! A checkpoint records the input of a run and the output of every
//! activity it has completed. Replaying a run against its checkpoint
//! skips finished activities and resumes at the first unfinished one.

use crate::error::RunFailure;
use crate::provenance::ProvenanceRecord;
use crate::workflows::{WorkflowInput, WorkflowKind, WorkflowOutput};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use compliance_types::RunId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    /// Stopped at a gate; a successful early termination
    GateFailed,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "Running"),
            RunStatus::GateFailed => write!(f, "GateFailed"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Terminal result of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WorkflowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

impl RunResult {
    pub fn success(data: WorkflowOutput) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: RunFailure) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn status(&self) -> RunStatus {
        match &self.data {
            _ if !self.success => RunStatus::Failed,
            Some(WorkflowOutput::Gated(_)) => RunStatus::GateFailed,
            _ => RunStatus::Completed,
        }
    }
}

/// An external event delivered to a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Output of one completed activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub activity: String,
    pub output: serde_json::Value,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

/// Durable state of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: RunId,
    pub workflow: WorkflowKind,
    pub input: WorkflowInput,
    pub entries: Vec<CheckpointEntry>,
    #[serde(default)]
    pub events: Vec<RunEvent>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Audit trail, written when the run settles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<ProvenanceRecord>,
}

impl Checkpoint {
    pub fn new(run_id: RunId, input: WorkflowInput, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            workflow: input.kind(),
            input,
            entries: Vec::new(),
            events: Vec::new(),
            status: RunStatus::Running,
            result: None,
            created_at: now,
            updated_at: now,
            provenance: Vec::new(),
        }
    }

    pub fn completed_activities(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.activity.clone()).collect()
    }
}

/// Point-in-time view of a run for the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub workflow: WorkflowKind,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_activity: Option<String>,
    pub completed_activities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    pub events_received: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunSnapshot {
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            run_id: checkpoint.run_id.clone(),
            workflow: checkpoint.workflow,
            status: checkpoint.status,
            current_activity: None,
            completed_activities: checkpoint.completed_activities(),
            result: checkpoint.result.clone(),
            events_received: checkpoint.events.len(),
            created_at: checkpoint.created_at,
            updated_at: checkpoint.updated_at,
        }
    }
}

// ── Checkpoint Store ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckpointError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    #[error("Checkpoint corrupted: {0}")]
    Corrupted(String),
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>, CheckpointError>;
    async fn delete(&self, run_id: &RunId) -> Result<(), CheckpointError>;
}

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    data: tokio::sync::RwLock<HashMap<RunId, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.data
            .write()
            .await
            .insert(checkpoint.run_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.data.read().await.get(run_id).cloned())
    }

    async fn delete(&self, run_id: &RunId) -> Result<(), CheckpointError> {
        self.data.write().await.remove(run_id);
        Ok(())
    }
}
