//! Provenance tracker: an ordered audit trail per run
//!
//! Every lifecycle change of a run is recorded so the sequence of
//! activities, retries, gates and events can be reconstructed afterwards.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use compliance_types::RunId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tracks provenance events for all runs
#[derive(Clone, Debug, Default)]
pub struct ProvenanceTracker {
    events: HashMap<RunId, Vec<ProvenanceRecord>>,
}

impl ProvenanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, assigning the next sequence number for the run
    pub fn record(&mut self, run_id: &RunId, event_type: ProvenanceEventType, at: DateTime<Utc>) {
        let events = self.events.entry(run_id.clone()).or_default();
        let record = ProvenanceRecord::after(events, event_type, at);
        tracing::trace!(
            run_id = %run_id,
            sequence = record.sequence,
            event = %record.event_type,
            "Provenance recorded"
        );
        events.push(record);
    }

    pub fn events_for(&self, run_id: &RunId) -> Vec<ProvenanceRecord> {
        self.events.get(run_id).cloned().unwrap_or_default()
    }

    /// Seed a run's trail from a persisted one so new records continue
    /// its sequence
    pub fn restore(&mut self, run_id: &RunId, records: Vec<ProvenanceRecord>) {
        if records.is_empty() {
            return;
        }
        self.events.insert(run_id.clone(), records);
    }

    /// Stop tracking a run, returning its trail
    pub fn remove(&mut self, run_id: &RunId) -> Vec<ProvenanceRecord> {
        self.events.remove(run_id).unwrap_or_default()
    }
}

/// One event in a run's provenance chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub sequence: u64,
    pub event_type: ProvenanceEventType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Types of provenance events
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProvenanceEventType {
    RunStarted { workflow: String },
    RunResumed { replayable: usize },
    ActivityCompleted { activity: String, attempts: u32 },
    ActivityReplayed { activity: String },
    ActivityRetried { activity: String, attempt: u32, reason: String },
    EventReceived { name: String },
    GateClosed { reason: String },
    RunCompleted,
    RunFailed { kind: ErrorKind, reason: String },
}

impl ProvenanceRecord {
    /// A record following `previous` in a trail
    pub fn after(previous: &[ProvenanceRecord], event_type: ProvenanceEventType, at: DateTime<Utc>) -> Self {
        Self {
            sequence: previous.len() as u64 + 1,
            description: event_type.describe(),
            event_type,
            timestamp: at,
        }
    }
}

impl ProvenanceEventType {
    fn describe(&self) -> String {
        match self {
            Self::RunStarted { workflow } => format!("Run of {} started", workflow),
            Self::RunResumed { replayable } => {
                format!("Run resumed with {} completed activities", replayable)
            }
            Self::ActivityCompleted { activity, attempts } => {
                format!("Activity '{}' completed after {} attempt(s)", activity, attempts)
            }
            Self::ActivityReplayed { activity } => {
                format!("Activity '{}' replayed from checkpoint", activity)
            }
            Self::ActivityRetried {
                activity,
                attempt,
                reason,
            } => format!("Activity '{}' attempt {} failed: {}", activity, attempt, reason),
            Self::EventReceived { name } => format!("Event '{}' received", name),
            Self::GateClosed { reason } => format!("Gate closed: {}", reason),
            Self::RunCompleted => "Run completed successfully".to_string(),
            Self::RunFailed { kind, reason } => format!("Run failed ({}): {}", kind, reason),
        }
    }
}

impl std::fmt::Display for ProvenanceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunStarted { .. } => write!(f, "run_started"),
            Self::RunResumed { .. } => write!(f, "run_resumed"),
            Self::ActivityCompleted { activity, .. } => write!(f, "activity_completed:{}", activity),
            Self::ActivityReplayed { activity } => write!(f, "activity_replayed:{}", activity),
            Self::ActivityRetried { activity, .. } => write!(f, "activity_retried:{}", activity),
            Self::EventReceived { name } => write!(f, "event_received:{}", name),
            Self::GateClosed { .. } => write!(f, "gate_closed"),
            Self::RunCompleted => write!(f, "run_completed"),
            Self::RunFailed { .. } => write!(f, "run_failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_provenance() {
        let mut tracker = ProvenanceTracker::new();
        let run = RunId::new("run-1");
        let now = Utc::now();

        tracker.record(&run, ProvenanceEventType::RunStarted { workflow: "company_onboarding".into() }, now);
        tracker.record(
            &run,
            ProvenanceEventType::ActivityCompleted { activity: "analyze_company".into(), attempts: 1 },
            now,
        );
        tracker.record(&run, ProvenanceEventType::RunCompleted, now);

        let events = tracker.events_for(&run);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].sequence, 3);
        assert_eq!(events[1].description, "Activity 'analyze_company' completed after 1 attempt(s)");
    }

    #[test]
    fn test_runs_are_tracked_separately() {
        let mut tracker = ProvenanceTracker::new();
        let a = RunId::new("a");
        let b = RunId::new("b");
        tracker.record(&a, ProvenanceEventType::RunCompleted, Utc::now());
        tracker.record(&b, ProvenanceEventType::RunCompleted, Utc::now());
        assert_eq!(tracker.events_for(&b)[0].sequence, 1);

        assert_eq!(tracker.remove(&a).len(), 1);
        assert!(tracker.events_for(&a).is_empty());
        assert_eq!(tracker.events_for(&b).len(), 1);
        assert!(tracker.remove(&a).is_empty());
    }

    #[test]
    fn test_restored_trail_continues_sequence() {
        let mut tracker = ProvenanceTracker::new();
        let run = RunId::new("run-1");
        let now = Utc::now();
        tracker.record(&run, ProvenanceEventType::RunStarted { workflow: "step_generation".into() }, now);
        let persisted = tracker.remove(&run);

        let mut other = ProvenanceTracker::new();
        other.restore(&run, persisted);
        other.record(&run, ProvenanceEventType::RunResumed { replayable: 0 }, now);
        let sequences: Vec<u64> = other.events_for(&run).iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);

        let next = ProvenanceRecord::after(&other.events_for(&run), ProvenanceEventType::RunCompleted, now);
        assert_eq!(next.sequence, 3);
    }
}
