//! Step completion
//!
//! Prerequisites are checked first; a step whose lower-numbered siblings
//! are not all Completed stops at a gate. Evidence, when there is any,
//! must pass validation before the step is marked complete.

use crate::activity::{Activity, ActivityEnv};
use crate::collaborators::StorageError;
use crate::context::{Outcome, RunAbort, RunContext};
use crate::error::{ActivityError, ActivityResult, CollaboratorError};
use crate::gate::{GateEvaluator, GateResult};
use crate::report::{CompletionReport, NextAction};
use crate::workflows::{WorkflowKind, EVIDENCE_SUBMITTED};
use async_trait::async_trait;
use compliance_types::{
    completion_percentage, CompanyComplianceRecord, CompanyComplianceStep, EvidenceSubmission, EvidenceValidationResult, Priority, RecordId,
    RecordStatus, StepId, StepStatus,
};
use serde::{Deserialize, Serialize};

/// Completion percentage at which a record is ready for final review
pub const FINAL_REVIEW_THRESHOLD: f64 = 90.0;

const PROGRESS_WRITE_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepCompletionInput {
    pub step_id: StepId,
    pub record_id: RecordId,
    pub completed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<EvidenceSubmission>,
    /// Block until an `evidence_submitted` event arrives when no evidence
    /// is supplied in the input
    #[serde(default)]
    pub await_evidence: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepCompletionOutput {
    pub step_id: StepId,
    pub record_id: RecordId,
    pub step: CompanyComplianceStep,
    /// False when the step was already Completed before this run
    pub newly_completed: bool,
    pub guidance: ExecutionGuidance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_validation: Option<EvidenceValidationResult>,
    pub progress: ProgressUpdate,
    pub completion_check: CompletionCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_report: Option<CompletionReport>,
}

// ── Activities ───────────────────────────────────────────────────────

pub struct PrerequisiteInput {
    pub step_id: StepId,
    pub record_id: RecordId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteState {
    pub step: CompanyComplianceStep,
    pub siblings: Vec<CompanyComplianceStep>,
}

/// Loads the step and its siblings. A step that does not belong to the
/// given record is an inconsistency, not a gate.
pub struct ValidatePrerequisites;

#[async_trait]
impl Activity for ValidatePrerequisites {
    type Input = PrerequisiteInput;
    type Output = PrerequisiteState;

    fn name(&self) -> &'static str {
        "validate_prerequisites"
    }

    async fn execute(&self, env: &ActivityEnv, input: &PrerequisiteInput) -> ActivityResult<PrerequisiteState> {
        let step = env.step(&input.step_id).await?;
        if step.record_id != input.record_id {
            return Err(ActivityError::DataInconsistency(format!(
                "step {} belongs to record {}, not {}",
                step.id, step.record_id, input.record_id
            )));
        }
        let siblings = env.steps_for_record(&input.record_id).await?;
        Ok(PrerequisiteState { step, siblings })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    pub overview: String,
    pub key_activities: Vec<String>,
    pub resources: Vec<String>,
    pub checkpoints: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGuidance {
    pub step_id: StepId,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub guidance: Guidance,
    pub support_contacts: Vec<String>,
}

/// Moves the step to InProgress and hands out execution guidance
pub struct ExecuteStep;

#[async_trait]
impl Activity for ExecuteStep {
    type Input = StepId;
    type Output = ExecutionGuidance;

    fn name(&self) -> &'static str {
        "execute_step"
    }

    async fn execute(&self, env: &ActivityEnv, step_id: &StepId) -> ActivityResult<ExecutionGuidance> {
        let mut step = env.step(step_id).await?;
        if step.start(env.now()) {
            env.bounded("storage", env.storage.put_step(step.clone())).await?;
            tracing::info!(step_id = %step.id, assigned_to = ?step.assigned_to, "Step started");
        }

        let mut key_activities = vec![
            "Review step requirements and documentation".to_string(),
            "Gather necessary resources and stakeholders".to_string(),
            "Execute the step activities".to_string(),
            "Document findings and outcomes".to_string(),
        ];
        key_activities.extend(step.deliverables.iter().map(|d| format!("Produce {}", d)));
        key_activities.push("Collect required evidence".to_string());

        Ok(ExecutionGuidance {
            step_id: step.id.clone(),
            status: step.status,
            assigned_to: step.assigned_to.clone(),
            guidance: Guidance {
                overview: format!("Execute {} according to the {} requirements", step.title, step.framework),
                key_activities,
                resources: vec![
                    "Step documentation template".to_string(),
                    format!("{} framework guidelines", step.framework),
                    "Internal procedures and policies".to_string(),
                    "External regulatory guidance".to_string(),
                ],
                checkpoints: vec![
                    "25% - Initial planning completed".to_string(),
                    "50% - Core activities in progress".to_string(),
                    "75% - Activities completed, documentation in progress".to_string(),
                    "100% - All activities completed with evidence".to_string(),
                ],
            },
            support_contacts: vec![
                format!("Compliance team: {}", env.catalog.compliance_team),
                format!("Accountable role: {}", step.responsible_role),
            ],
        })
    }
}

pub struct EvidenceInput {
    pub step_id: StepId,
    pub evidence: EvidenceSubmission,
}

pub struct ValidateEvidence;

#[async_trait]
impl Activity for ValidateEvidence {
    type Input = EvidenceInput;
    type Output = EvidenceValidationResult;

    fn name(&self) -> &'static str {
        "validate_evidence"
    }

    async fn execute(&self, env: &ActivityEnv, input: &EvidenceInput) -> ActivityResult<EvidenceValidationResult> {
        let step = env.step(&input.step_id).await?;
        let result = env.evidence.validate(&step, &input.evidence);
        tracing::info!(
            step_id = %step.id,
            file = %input.evidence.file_path,
            score = result.score,
            acceptable = result.is_acceptable,
            "Evidence validated"
        );
        Ok(result)
    }
}

pub struct CompleteInput {
    pub step_id: StepId,
    pub completed_by: String,
    pub evidence_file_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepCompleted {
    pub step: CompanyComplianceStep,
    pub newly_completed: bool,
}

/// Marks the step Completed. An already completed step is returned as
/// stored, keeping its original completion metadata.
pub struct MarkStepComplete;

#[async_trait]
impl Activity for MarkStepComplete {
    type Input = CompleteInput;
    type Output = StepCompleted;

    fn name(&self) -> &'static str {
        "mark_step_complete"
    }

    async fn execute(&self, env: &ActivityEnv, input: &CompleteInput) -> ActivityResult<StepCompleted> {
        let mut step = env.step(&input.step_id).await?;
        let newly_completed = step.complete(
            input.completed_by.clone(),
            env.now(),
            input.evidence_file_path.clone(),
        );
        if newly_completed {
            env.bounded("storage", env.storage.put_step(step.clone())).await?;
        } else {
            tracing::debug!(
                step_id = %step.id,
                completed_by = ?step.completed_by,
                "Step already completed"
            );
        }
        Ok(StepCompleted { step, newly_completed })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub record_id: RecordId,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub completion_percentage: f64,
    pub status: RecordStatus,
}

impl ProgressUpdate {
    pub fn from_record(record: &CompanyComplianceRecord) -> Self {
        Self {
            record_id: record.id.clone(),
            total_steps: record.total_steps,
            completed_steps: record.completed_steps,
            completion_percentage: record.completion_percentage,
            status: record.status,
        }
    }
}

/// Recomputes the record's aggregate progress from its steps.
///
/// Concurrent completions of sibling steps race on the record; a write
/// that conflicts is recomputed from fresh reads, and a stored record
/// that is already further along is returned as is.
pub struct UpdateProgress;

#[async_trait]
impl Activity for UpdateProgress {
    type Input = RecordId;
    type Output = ProgressUpdate;

    fn name(&self) -> &'static str {
        "update_compliance_progress"
    }

    async fn execute(&self, env: &ActivityEnv, record_id: &RecordId) -> ActivityResult<ProgressUpdate> {
        let mut attempt = 1;
        loop {
            let mut record = env.record(record_id).await?;
            let steps = env.steps_for_record(record_id).await?;
            let total = steps.len() as u32;
            let completed = steps.iter().filter(|s| s.status.is_completed()).count() as u32;

            // Another run may have stored a later view than the steps we read
            let target = RecordStatus::from_completion(completion_percentage(completed, total));
            let stored_ahead = !record.status.can_transition_to(target)
                || (record.total_steps == total && record.completed_steps > completed);
            if stored_ahead {
                tracing::debug!(
                    record_id = %record.id,
                    stored = record.completed_steps,
                    computed = completed,
                    "Stored progress is ahead, keeping it"
                );
                return Ok(ProgressUpdate::from_record(&record));
            }

            record.apply_progress(completed, total, env.now())?;
            match env.bounded("storage", env.storage.put_record(record.clone())).await {
                Ok(()) => {
                    tracing::info!(
                        record_id = %record.id,
                        completed = record.completed_steps,
                        total = record.total_steps,
                        percentage = record.completion_percentage,
                        "Compliance progress updated"
                    );
                    return Ok(ProgressUpdate::from_record(&record));
                }
                Err(CollaboratorError::Storage(StorageError::Conflict(reason)))
                    if attempt < PROGRESS_WRITE_ATTEMPTS =>
                {
                    tracing::warn!(
                        record_id = %record.id,
                        attempt,
                        reason = %reason,
                        "Progress write conflicted, recomputing"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionCheck {
    pub all_steps_complete: bool,
    pub completion_percentage: f64,
    pub ready_for_final_review: bool,
    pub next_steps: Vec<NextAction>,
}

impl CompletionCheck {
    pub fn from_progress(progress: &ProgressUpdate) -> Self {
        let percentage = progress.completion_percentage;
        let all_steps_complete = progress.total_steps > 0 && progress.completed_steps == progress.total_steps;
        let ready_for_final_review = percentage >= FINAL_REVIEW_THRESHOLD;
        let next = if all_steps_complete {
            NextAction::new("final_compliance_review", "Conduct final compliance review and certification")
                .with_priority(Priority::High)
        } else if ready_for_final_review {
            NextAction::new("prepare_final_review", "Prepare for final compliance review")
                .with_priority(Priority::Medium)
        } else {
            NextAction::new("continue_execution", "Continue executing remaining compliance steps")
                .with_priority(Priority::Medium)
        };
        Self {
            all_steps_complete,
            completion_percentage: percentage,
            ready_for_final_review,
            next_steps: vec![next],
        }
    }
}

pub struct CheckCompletion;

#[async_trait]
impl Activity for CheckCompletion {
    type Input = ProgressUpdate;
    type Output = CompletionCheck;

    fn name(&self) -> &'static str {
        "check_completion"
    }

    async fn execute(&self, _env: &ActivityEnv, progress: &ProgressUpdate) -> ActivityResult<CompletionCheck> {
        Ok(CompletionCheck::from_progress(progress))
    }
}

pub struct GenerateCompletionReport;

#[async_trait]
impl Activity for GenerateCompletionReport {
    type Input = RecordId;
    type Output = CompletionReport;

    fn name(&self) -> &'static str {
        "generate_completion_report"
    }

    async fn execute(&self, env: &ActivityEnv, record_id: &RecordId) -> ActivityResult<CompletionReport> {
        let record = env.record(record_id).await?;
        let steps = env.steps_for_record(record_id).await?;
        let report = CompletionReport::build(&record, &steps, env.now());
        tracing::info!(
            record_id = %record.id,
            report_id = %report.report_id,
            "Completion report generated"
        );
        Ok(report)
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

pub(crate) async fn run(
    ctx: &mut RunContext,
    input: &StepCompletionInput,
) -> Result<Outcome<StepCompletionOutput>, RunAbort> {
    let gates = GateEvaluator::new();
    let state = ctx
        .call(
            &ValidatePrerequisites,
            &PrerequisiteInput {
                step_id: input.step_id.clone(),
                record_id: input.record_id.clone(),
            },
        )
        .await?;
    if let GateResult::Closed(gate) = gates.prerequisites(&state.step, &state.siblings) {
        return Ok(Outcome::Gated(gate.outcome(WorkflowKind::StepCompletion)));
    }

    let guidance = ctx.call(&ExecuteStep, &input.step_id).await?;

    let evidence = match &input.evidence {
        Some(evidence) => Some(evidence.clone()),
        None => match ctx.receive_event(EVIDENCE_SUBMITTED, input.await_evidence).await? {
            Some(event) => Some(serde_json::from_value::<EvidenceSubmission>(event.data).map_err(|e| {
                RunAbort::Activity {
                    activity: format!("event:{}", EVIDENCE_SUBMITTED),
                    error: ActivityError::InvalidInput(format!("malformed evidence: {}", e)),
                    attempts: 1,
                }
            })?),
            None => None,
        },
    };

    let evidence_validation = match &evidence {
        Some(evidence) => {
            let validation = ctx
                .call(
                    &ValidateEvidence,
                    &EvidenceInput {
                        step_id: input.step_id.clone(),
                        evidence: evidence.clone(),
                    },
                )
                .await?;
            if let GateResult::Closed(gate) = gates.evidence(&input.step_id, &validation) {
                return Ok(Outcome::Gated(gate.outcome(WorkflowKind::StepCompletion)));
            }
            Some(validation)
        }
        None => None,
    };

    let completed = ctx
        .call(
            &MarkStepComplete,
            &CompleteInput {
                step_id: input.step_id.clone(),
                completed_by: input.completed_by.clone(),
                evidence_file_path: evidence.map(|e| e.file_path),
            },
        )
        .await?;
    let progress = ctx.call(&UpdateProgress, &input.record_id).await?;
    let completion_check = ctx.call(&CheckCompletion, &progress).await?;
    let completion_report = if completion_check.all_steps_complete {
        Some(ctx.call(&GenerateCompletionReport, &input.record_id).await?)
    } else {
        None
    };

    tracing::info!(
        run_id = %ctx.run_id(),
        step_id = %input.step_id,
        progress = progress.completion_percentage,
        all_complete = completion_check.all_steps_complete,
        "Step completion finished"
    );

    Ok(Outcome::Completed(StepCompletionOutput {
        step_id: input.step_id.clone(),
        record_id: input.record_id.clone(),
        step: completed.step,
        newly_completed: completed.newly_completed,
        guidance,
        evidence_validation,
        progress,
        completion_check,
        completion_report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(completed: u32, total: u32, percentage: f64) -> ProgressUpdate {
        ProgressUpdate {
            record_id: RecordId::new("cc-acme-gdpr"),
            total_steps: total,
            completed_steps: completed,
            completion_percentage: percentage,
            status: RecordStatus::from_completion(percentage),
        }
    }

    #[test]
    fn test_completion_check_thresholds() {
        let done = CompletionCheck::from_progress(&progress(4, 4, 100.0));
        assert!(done.all_steps_complete);
        assert!(done.ready_for_final_review);
        assert_eq!(done.next_steps[0].action, "final_compliance_review");

        let close = CompletionCheck::from_progress(&progress(9, 10, 90.0));
        assert!(!close.all_steps_complete);
        assert!(close.ready_for_final_review);
        assert_eq!(close.next_steps[0].action, "prepare_final_review");

        let early = CompletionCheck::from_progress(&progress(1, 4, 25.0));
        assert!(!early.ready_for_final_review);
        assert_eq!(early.next_steps[0].action, "continue_execution");
    }

    #[test]
    fn test_no_steps_is_not_complete() {
        let empty = CompletionCheck::from_progress(&progress(0, 0, 0.0));
        assert!(!empty.all_steps_complete);
    }

    #[test]
    fn test_input_rejects_unknown_fields() {
        let err = serde_json::from_value::<StepCompletionInput>(serde_json::json!({
            "step_id": "s", "record_id": "r", "completed_by": "me", "skip_checks": true
        }));
        assert!(err.is_err());

        let input: StepCompletionInput = serde_json::from_value(serde_json::json!({
            "step_id": "s", "record_id": "r", "completed_by": "me"
        }))
        .unwrap();
        assert!(input.evidence.is_none());
        assert!(!input.await_evidence);
    }
}
