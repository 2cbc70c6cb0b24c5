//! Replaying run context
//!
//! Workflows call activities through [`RunContext::call`]. The context
//! replays outputs already recorded in the checkpoint, checks for
//! cancellation before starting new work, retries retryable failures
//! with bounded backoff, and persists the checkpoint after every activity.

use crate::activity::{Activity, ActivityEnv};
use crate::error::ActivityError;
use crate::gate::GateOutcome;
use crate::provenance::{ProvenanceEventType, ProvenanceTracker};
use crate::run::{Checkpoint, CheckpointEntry, CheckpointStore, RunEvent, RunSnapshot};
use chrono::{DateTime, Utc};
use compliance_types::RunId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify, RwLock};

/// Result of a workflow that ran to its end or stopped at a gate
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Gated(GateOutcome),
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Gated(gate) => Outcome::Gated(gate),
        }
    }
}

/// Why a run stopped before producing an outcome
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunAbort {
    #[error("activity '{activity}' failed after {attempts} attempt(s): {error}")]
    Activity {
        activity: String,
        error: ActivityError,
        attempts: u32,
    },

    #[error("terminated before '{before}': {reason}")]
    Terminated { reason: String, before: String },

    #[error("checkpoint failure at '{activity}': {message}")]
    Checkpoint { activity: String, message: String },
}

/// Events raised for a run and not yet consumed
#[derive(Debug, Default)]
pub struct Mailbox {
    events: Mutex<Vec<RunEvent>>,
    notify: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, event: RunEvent) {
        self.events.lock().await.push(event);
        self.notify.notify_one();
    }

    /// Remove the oldest event with this name
    pub async fn take(&self, name: &str) -> Option<RunEvent> {
        let mut events = self.events.lock().await;
        let position = events.iter().position(|e| e.name == name)?;
        Some(events.remove(position))
    }

    async fn notified(&self) {
        self.notify.notified().await
    }
}

/// Execution context of one run
pub struct RunContext {
    env: Arc<ActivityEnv>,
    store: Arc<dyn CheckpointStore>,
    checkpoint: Checkpoint,
    cursor: usize,
    cancel: watch::Receiver<Option<String>>,
    mailbox: Arc<Mailbox>,
    live: Arc<RwLock<RunSnapshot>>,
    provenance: Arc<RwLock<ProvenanceTracker>>,
}

impl RunContext {
    pub(crate) fn new(
        env: Arc<ActivityEnv>,
        store: Arc<dyn CheckpointStore>,
        checkpoint: Checkpoint,
        cancel: watch::Receiver<Option<String>>,
        mailbox: Arc<Mailbox>,
        live: Arc<RwLock<RunSnapshot>>,
        provenance: Arc<RwLock<ProvenanceTracker>>,
    ) -> Self {
        Self {
            env,
            store,
            checkpoint,
            cursor: 0,
            cancel,
            mailbox,
            live,
            provenance,
        }
    }

    pub fn env(&self) -> &ActivityEnv {
        &self.env
    }

    pub fn run_id(&self) -> &RunId {
        &self.checkpoint.run_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.env.now()
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub(crate) fn into_checkpoint(self) -> Checkpoint {
        self.checkpoint
    }

    /// Execute an activity, or replay its recorded output
    pub async fn call<A: Activity>(&mut self, activity: &A, input: &A::Input) -> Result<A::Output, RunAbort> {
        let name = activity.name();
        if let Some(output) = self.replay::<A::Output>(name).await? {
            return Ok(output);
        }
        self.check_cancelled(name)?;
        self.live.write().await.current_activity = Some(name.to_string());

        let env = self.env.clone();
        let retry = env.config.runtime.retry.clone();
        let mut attempt = 1;
        let output = loop {
            match activity.execute(&env, input).await {
                Ok(output) => break output,
                Err(error) if error.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.backoff_for(attempt);
                    tracing::warn!(
                        run_id = %self.checkpoint.run_id,
                        activity = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Activity failed, retrying"
                    );
                    self.provenance.write().await.record(
                        &self.checkpoint.run_id,
                        ProvenanceEventType::ActivityRetried {
                            activity: name.to_string(),
                            attempt,
                            reason: error.to_string(),
                        },
                        env.now(),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RunAbort::Activity {
                        activity: name.to_string(),
                        error,
                        attempts: attempt,
                    })
                }
            }
        };

        self.commit(name, &output, attempt).await?;
        tracing::debug!(
            run_id = %self.checkpoint.run_id,
            activity = name,
            attempts = attempt,
            "Activity completed"
        );
        Ok(output)
    }

    /// Consume a raised event. With `wait`, blocks until it arrives or
    /// the run is terminated; otherwise returns what is already there.
    pub async fn receive_event(&mut self, name: &str, wait: bool) -> Result<Option<RunEvent>, RunAbort> {
        let key = format!("event:{}", name);
        if let Some(event) = self.replay::<Option<RunEvent>>(&key).await? {
            return Ok(event);
        }
        self.check_cancelled(&key)?;

        let event = if wait {
            self.live.write().await.current_activity = Some(key.clone());
            Some(self.wait_for(name, &key).await?)
        } else {
            self.mailbox.take(name).await
        };

        if let Some(event) = &event {
            self.checkpoint.events.push(event.clone());
        }
        self.commit(&key, &event, 1).await?;
        Ok(event)
    }

    async fn wait_for(&mut self, name: &str, key: &str) -> Result<RunEvent, RunAbort> {
        let mailbox = self.mailbox.clone();
        loop {
            if let Some(event) = mailbox.take(name).await {
                return Ok(event);
            }
            let cancel_signal = tokio::select! {
                _ = mailbox.notified() => None,
                changed = self.cancel.changed() => Some(changed.is_ok()),
            };
            match cancel_signal {
                None => continue,
                Some(true) => self.check_cancelled(key)?,
                Some(false) => {
                    return Err(RunAbort::Terminated {
                        reason: "runtime shut down".to_string(),
                        before: key.to_string(),
                    })
                }
            }
        }
    }

    /// Record that the run stopped at a gate
    pub async fn gate_closed(&self, outcome: &GateOutcome) {
        tracing::info!(
            run_id = %self.checkpoint.run_id,
            workflow = %outcome.workflow,
            action_required = %outcome.action_required,
            "Gate closed"
        );
        self.provenance.write().await.record(
            &self.checkpoint.run_id,
            ProvenanceEventType::GateClosed {
                reason: outcome.message.clone(),
            },
            self.env.now(),
        );
    }

    fn check_cancelled(&self, before: &str) -> Result<(), RunAbort> {
        match self.cancel.borrow().clone() {
            Some(reason) => Err(RunAbort::Terminated {
                reason,
                before: before.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn replay<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>, RunAbort> {
        let Some(entry) = self.checkpoint.entries.get(self.cursor) else {
            return Ok(None);
        };
        if entry.activity != name {
            return Err(RunAbort::Checkpoint {
                activity: name.to_string(),
                message: format!(
                    "checkpoint has '{}' at position {}",
                    entry.activity, self.cursor
                ),
            });
        }
        let output = serde_json::from_value(entry.output.clone()).map_err(|e| RunAbort::Checkpoint {
            activity: name.to_string(),
            message: e.to_string(),
        })?;
        self.cursor += 1;
        self.provenance.write().await.record(
            &self.checkpoint.run_id,
            ProvenanceEventType::ActivityReplayed {
                activity: name.to_string(),
            },
            self.env.now(),
        );
        Ok(Some(output))
    }

    async fn commit<T: Serialize>(&mut self, name: &str, output: &T, attempts: u32) -> Result<(), RunAbort> {
        let now = self.env.now();
        let value = serde_json::to_value(output).map_err(|e| RunAbort::Checkpoint {
            activity: name.to_string(),
            message: e.to_string(),
        })?;
        self.checkpoint.entries.push(CheckpointEntry {
            activity: name.to_string(),
            output: value,
            attempts,
            completed_at: now,
        });
        self.checkpoint.updated_at = now;
        self.cursor += 1;

        self.store
            .save(&self.checkpoint)
            .await
            .map_err(|e| RunAbort::Checkpoint {
                activity: name.to_string(),
                message: e.to_string(),
            })?;

        {
            let mut live = self.live.write().await;
            live.completed_activities.push(name.to_string());
            live.current_activity = None;
            live.updated_at = now;
        }

        let event = if let Some(event_name) = name.strip_prefix("event:") {
            ProvenanceEventType::EventReceived {
                name: event_name.to_string(),
            }
        } else {
            ProvenanceEventType::ActivityCompleted {
                activity: name.to_string(),
                attempts,
            }
        };
        self.provenance
            .write()
            .await
            .record(&self.checkpoint.run_id, event, now);
        Ok(())
    }
}
