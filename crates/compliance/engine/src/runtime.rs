//! Workflow runtime
//!
//! Hosts runs as independent tokio tasks. Each run owns its checkpoint,
//! mailbox and cancellation signal; runs share only the collaborators in
//! [`ActivityEnv`]. The number of runs executing at once is bounded by
//! `runtime.max_concurrent_runs`.
//!
//! A settled run is dropped from memory once its final checkpoint, which
//! carries the result and the provenance trail, has been saved.

use crate::activity::ActivityEnv;
use crate::context::{Mailbox, RunAbort, RunContext};
use crate::error::{EngineError, EngineResult, ErrorKind, RunFailure};
use crate::provenance::{ProvenanceEventType, ProvenanceRecord, ProvenanceTracker};
use crate::run::{Checkpoint, CheckpointStore, RunEvent, RunResult, RunSnapshot, RunStatus};
use crate::workflows::{self, WorkflowInput, WorkflowKind, WorkflowOutput, EVIDENCE_SUBMITTED};
use compliance_types::{EvidenceSubmission, RunId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock, Semaphore};

#[derive(Clone)]
struct RunHandle {
    kind: WorkflowKind,
    live: Arc<RwLock<RunSnapshot>>,
    mailbox: Arc<Mailbox>,
    cancel: Arc<watch::Sender<Option<String>>>,
    done: watch::Receiver<Option<RunResult>>,
}

/// Starts, observes and controls workflow runs
#[derive(Clone)]
pub struct WorkflowRuntime {
    env: Arc<ActivityEnv>,
    checkpoints: Arc<dyn CheckpointStore>,
    runs: Arc<RwLock<HashMap<RunId, RunHandle>>>,
    provenance: Arc<RwLock<ProvenanceTracker>>,
    permits: Arc<Semaphore>,
}

impl WorkflowRuntime {
    pub fn new(env: ActivityEnv, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        let permits = Arc::new(Semaphore::new(env.config.runtime.max_concurrent_runs.max(1)));
        Self {
            env: Arc::new(env),
            checkpoints,
            runs: Arc::new(RwLock::new(HashMap::new())),
            provenance: Arc::new(RwLock::new(ProvenanceTracker::new())),
            permits,
        }
    }

    pub fn env(&self) -> &ActivityEnv {
        &self.env
    }

    /// Start a run by workflow name. Unknown names and unknown input
    /// fields are rejected before anything is persisted.
    pub async fn start_named(&self, workflow: &str, input: serde_json::Value) -> EngineResult<RunId> {
        let input = WorkflowInput::from_named(workflow, input)?;
        self.start(input).await
    }

    pub async fn start(&self, input: WorkflowInput) -> EngineResult<RunId> {
        let run_id = RunId::generate();
        let now = self.env.now();
        let checkpoint = Checkpoint::new(run_id.clone(), input, now);
        self.checkpoints.save(&checkpoint).await?;

        self.provenance.write().await.record(
            &run_id,
            ProvenanceEventType::RunStarted {
                workflow: checkpoint.workflow.to_string(),
            },
            now,
        );
        tracing::info!(run_id = %run_id, workflow = %checkpoint.workflow, "Workflow run started");

        self.spawn(checkpoint).await;
        Ok(run_id)
    }

    /// Start a run and wait for its result
    pub async fn execute(&self, input: WorkflowInput) -> EngineResult<RunResult> {
        let run_id = self.start(input).await?;
        self.wait(&run_id).await
    }

    /// Current status of a run, live or from its checkpoint
    pub async fn get_status(&self, run_id: &RunId) -> EngineResult<RunSnapshot> {
        if let Some(handle) = self.handle(run_id).await {
            return Ok(handle.live.read().await.clone());
        }
        match self.checkpoints.load(run_id).await? {
            Some(checkpoint) => Ok(RunSnapshot::from_checkpoint(&checkpoint)),
            None => Err(EngineError::RunNotFound(run_id.clone())),
        }
    }

    /// Wait for a run to reach a terminal state
    pub async fn wait(&self, run_id: &RunId) -> EngineResult<RunResult> {
        if let Some(handle) = self.handle(run_id).await {
            let mut done = handle.done.clone();
            let finished = match done.wait_for(Option::is_some).await {
                Ok(result) => (*result).clone(),
                Err(_) => None,
            };
            if let Some(result) = finished {
                return Ok(result);
            }
        }
        match self.checkpoints.load(run_id).await? {
            Some(Checkpoint {
                result: Some(result), ..
            }) => Ok(result),
            Some(_) => Err(EngineError::InvalidInput(format!(
                "run {} is not active; resume it to continue",
                run_id
            ))),
            None => Err(EngineError::RunNotFound(run_id.clone())),
        }
    }

    /// Request cancellation. It takes effect before the next activity or
    /// while the run waits for an event.
    pub async fn terminate(&self, run_id: &RunId, reason: &str) -> EngineResult<()> {
        if let Some(handle) = self.handle(run_id).await {
            if handle.live.read().await.status.is_terminal() {
                return Err(EngineError::RunFinished(run_id.clone()));
            }
            handle.cancel.send_replace(Some(reason.to_string()));
            tracing::info!(run_id = %run_id, reason, "Run termination requested");
            return Ok(());
        }

        // No task owns the run; settle its checkpoint directly
        let mut checkpoint = self
            .checkpoints
            .load(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.clone()))?;
        if checkpoint.status.is_terminal() {
            return Err(EngineError::RunFinished(run_id.clone()));
        }
        let failure = RunFailure {
            error_kind: ErrorKind::Terminated,
            message: reason.to_string(),
            workflow: checkpoint.workflow,
            run_id: run_id.clone(),
            activity: None,
            completed_activities: checkpoint.completed_activities(),
        };
        let now = self.env.now();
        let record = ProvenanceRecord::after(
            &checkpoint.provenance,
            ProvenanceEventType::RunFailed {
                kind: ErrorKind::Terminated,
                reason: reason.to_string(),
            },
            now,
        );
        checkpoint.provenance.push(record);
        checkpoint.status = RunStatus::Failed;
        checkpoint.result = Some(RunResult::failure(failure));
        checkpoint.updated_at = now;
        self.checkpoints.save(&checkpoint).await?;
        tracing::info!(run_id = %run_id, reason, "Inactive run terminated");
        Ok(())
    }

    /// Deliver an external event to a running run
    pub async fn raise_event(&self, run_id: &RunId, name: &str, data: serde_json::Value) -> EngineResult<()> {
        let Some(handle) = self.handle(run_id).await else {
            return match self.checkpoints.load(run_id).await? {
                Some(checkpoint) if checkpoint.status.is_terminal() => {
                    Err(EngineError::RunFinished(run_id.clone()))
                }
                Some(_) => Err(EngineError::InvalidInput(format!(
                    "run {} is not active; resume it before raising events",
                    run_id
                ))),
                None => Err(EngineError::RunNotFound(run_id.clone())),
            };
        };
        if !handle.kind.accepted_events().contains(&name) {
            return Err(EngineError::UnknownEvent {
                workflow: handle.kind,
                event: name.to_string(),
            });
        }
        if name == EVIDENCE_SUBMITTED {
            serde_json::from_value::<EvidenceSubmission>(data.clone())
                .map_err(|e| EngineError::InvalidInput(format!("{}: {}", name, e)))?;
        }
        if handle.live.read().await.status.is_terminal() {
            return Err(EngineError::RunFinished(run_id.clone()));
        }

        handle
            .mailbox
            .push(RunEvent {
                name: name.to_string(),
                data,
                received_at: self.env.now(),
            })
            .await;
        handle.live.write().await.events_received += 1;
        tracing::debug!(run_id = %run_id, event = name, "Event raised");
        Ok(())
    }

    /// Continue a run from its checkpoint.
    ///
    /// Runs left Running by a crashed host, and runs that failed on a
    /// collaborator, replay their completed activities and carry on.
    pub async fn resume(&self, run_id: &RunId) -> EngineResult<RunId> {
        if let Some(handle) = self.handle(run_id).await {
            if !handle.live.read().await.status.is_terminal() {
                return Ok(run_id.clone());
            }
        }
        let mut checkpoint = self
            .checkpoints
            .load(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.clone()))?;

        let resumable = match (&checkpoint.status, &checkpoint.result) {
            (RunStatus::Running, _) => true,
            (RunStatus::Failed, Some(result)) => result
                .error
                .as_ref()
                .is_some_and(|e| e.error_kind == ErrorKind::CollaboratorFailure),
            _ => false,
        };
        if !resumable {
            return Err(EngineError::RunFinished(run_id.clone()));
        }

        let now = self.env.now();
        checkpoint.status = RunStatus::Running;
        checkpoint.result = None;
        checkpoint.updated_at = now;
        self.checkpoints.save(&checkpoint).await?;

        let replayable = checkpoint.entries.len();
        {
            let mut tracker = self.provenance.write().await;
            tracker.restore(run_id, std::mem::take(&mut checkpoint.provenance));
            tracker.record(run_id, ProvenanceEventType::RunResumed { replayable }, now);
        }
        tracing::info!(run_id = %run_id, workflow = %checkpoint.workflow, replayable, "Workflow run resumed");

        self.spawn(checkpoint).await;
        Ok(run_id.clone())
    }

    /// Provenance trail of a run, live or from its checkpoint
    pub async fn provenance(&self, run_id: &RunId) -> Vec<ProvenanceRecord> {
        let events = self.provenance.read().await.events_for(run_id);
        if !events.is_empty() {
            return events;
        }
        match self.checkpoints.load(run_id).await {
            Ok(Some(checkpoint)) => checkpoint.provenance,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to load provenance from checkpoint");
                Vec::new()
            }
        }
    }

    /// Runs not yet in a terminal state
    pub async fn active_runs(&self) -> Vec<RunId> {
        let runs = self.runs.read().await;
        let mut active = Vec::new();
        for (run_id, handle) in runs.iter() {
            if !handle.live.read().await.status.is_terminal() {
                active.push(run_id.clone());
            }
        }
        active
    }

    async fn handle(&self, run_id: &RunId) -> Option<RunHandle> {
        self.runs.read().await.get(run_id).cloned()
    }

    async fn spawn(&self, checkpoint: Checkpoint) {
        let run_id = checkpoint.run_id.clone();
        let kind = checkpoint.workflow;
        let input = checkpoint.input.clone();

        let live = Arc::new(RwLock::new(RunSnapshot::from_checkpoint(&checkpoint)));
        let mailbox = Arc::new(Mailbox::new());
        let (cancel_tx, cancel_rx) = watch::channel(None);
        let (done_tx, done_rx) = watch::channel(None);

        self.runs.write().await.insert(
            run_id.clone(),
            RunHandle {
                kind,
                live: live.clone(),
                mailbox: mailbox.clone(),
                cancel: Arc::new(cancel_tx),
                done: done_rx,
            },
        );

        let mut ctx = RunContext::new(
            self.env.clone(),
            self.checkpoints.clone(),
            checkpoint,
            cancel_rx,
            mailbox,
            live.clone(),
            self.provenance.clone(),
        );
        let runtime = self.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let outcome = workflows::drive(&mut ctx, &input).await;
            let result = runtime.finish(ctx.into_checkpoint(), outcome, &live).await;
            runtime.release(&run_id, &live).await;
            done_tx.send_replace(Some(result));
        });
    }

    /// Drop a settled run's handle; waiters already holding it still
    /// receive the result, later callers read the checkpoint
    async fn release(&self, run_id: &RunId, live: &Arc<RwLock<RunSnapshot>>) {
        let mut runs = self.runs.write().await;
        // a resume may already have replaced the handle
        if runs.get(run_id).is_some_and(|h| Arc::ptr_eq(&h.live, live)) {
            runs.remove(run_id);
        }
    }

    async fn finish(
        &self,
        mut checkpoint: Checkpoint,
        outcome: Result<WorkflowOutput, RunAbort>,
        live: &RwLock<RunSnapshot>,
    ) -> RunResult {
        let run_id = checkpoint.run_id.clone();
        let now = self.env.now();
        let result = match outcome {
            Ok(output) => RunResult::success(output),
            Err(abort) => RunResult::failure(run_failure(&checkpoint, abort)),
        };

        checkpoint.status = result.status();
        checkpoint.result = Some(result.clone());
        checkpoint.updated_at = now;

        let event = match &result.error {
            None => {
                tracing::info!(
                    run_id = %run_id,
                    workflow = %checkpoint.workflow,
                    status = %checkpoint.status,
                    "Workflow run finished"
                );
                ProvenanceEventType::RunCompleted
            }
            Some(failure) => {
                tracing::error!(
                    run_id = %run_id,
                    workflow = %failure.workflow,
                    activity = ?failure.activity,
                    error_kind = %failure.error_kind,
                    input = ?checkpoint.input,
                    error = %failure.message,
                    "Workflow run failed"
                );
                ProvenanceEventType::RunFailed {
                    kind: failure.error_kind,
                    reason: failure.message.clone(),
                }
            }
        };
        {
            let mut tracker = self.provenance.write().await;
            tracker.record(&run_id, event, now);
            checkpoint.provenance = tracker.events_for(&run_id);
        }

        let persisted = match self.checkpoints.save(&checkpoint).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Failed to persist final checkpoint");
                false
            }
        };

        {
            let mut live = live.write().await;
            live.status = checkpoint.status;
            live.result = Some(result.clone());
            live.current_activity = None;
            live.updated_at = now;
        }

        // Keep the trail in memory when the checkpoint could not take it
        if persisted {
            self.provenance.write().await.remove(&run_id);
        }
        result
    }
}

impl std::fmt::Debug for WorkflowRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRuntime")
            .field("env", &self.env)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

/// Failure record for an aborted run
fn run_failure(checkpoint: &Checkpoint, abort: RunAbort) -> RunFailure {
    let (error_kind, message, activity) = match abort {
        RunAbort::Activity {
            activity,
            error,
            attempts,
        } => (
            error.kind(),
            format!("{} (after {} attempt(s))", error, attempts),
            Some(activity),
        ),
        RunAbort::Terminated { reason, before } => (ErrorKind::Terminated, reason, Some(before)),
        RunAbort::Checkpoint { activity, message } => (ErrorKind::Internal, message, Some(activity)),
    };
    RunFailure {
        error_kind,
        message,
        workflow: checkpoint.workflow,
        run_id: checkpoint.run_id.clone(),
        activity,
        completed_activities: checkpoint.completed_activities(),
    }
}
