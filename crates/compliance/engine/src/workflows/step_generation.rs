//! Step generation
//!
//! Turns a compliance record into a prioritized, assigned and scheduled
//! list of steps. Regenerating keeps the progress of steps that already
//! exist; only their plan (hours, priority, assignment, schedule) moves.

use crate::activity::{Activity, ActivityEnv};
use crate::assignment::assign_step;
use crate::context::{Outcome, RunAbort, RunContext};
use crate::error::ActivityResult;
use crate::gate::{GateEvaluator, GateResult};
use crate::scheduler::backward_schedule;
use crate::workflows::WorkflowKind;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use compliance_types::{
    Company, CompanyComplianceRecord, CompanyComplianceStep, ComplianceStepTemplate, Framework,
    Priority, RecordId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepGenerationInput {
    pub record_id: RecordId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepGenerationOutput {
    pub record_id: RecordId,
    pub framework: Framework,
    pub steps: Vec<CompanyComplianceStep>,
    pub total_estimated_hours: u32,
    pub counts_by_priority: BTreeMap<Priority, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_end: Option<DateTime<Utc>>,
    pub steps_created: u32,
    pub steps_preserved: u32,
}

// ── Activities ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    pub record: CompanyComplianceRecord,
    pub company: Company,
    pub templates: Vec<ComplianceStepTemplate>,
}

pub struct FetchStepTemplates;

#[async_trait]
impl Activity for FetchStepTemplates {
    type Input = RecordId;
    type Output = TemplateSet;

    fn name(&self) -> &'static str {
        "fetch_step_templates"
    }

    async fn execute(&self, env: &ActivityEnv, record_id: &RecordId) -> ActivityResult<TemplateSet> {
        let record = env.record(record_id).await?;
        let company = env.company(&record.company_id).await?;
        let templates = env.catalog.steps_for(&record.framework).unwrap_or_default();
        tracing::debug!(
            record_id = %record.id,
            framework = %record.framework,
            templates = templates.len(),
            "Step templates fetched"
        );
        Ok(TemplateSet {
            record,
            company,
            templates,
        })
    }
}

/// Instantiates templates with size-adjusted hours
pub struct InstantiateSteps;

#[async_trait]
impl Activity for InstantiateSteps {
    type Input = TemplateSet;
    type Output = Vec<CompanyComplianceStep>;

    fn name(&self) -> &'static str {
        "instantiate_steps"
    }

    async fn execute(&self, env: &ActivityEnv, set: &TemplateSet) -> ActivityResult<Vec<CompanyComplianceStep>> {
        let now = env.now();
        Ok(set
            .templates
            .iter()
            .map(|template| {
                CompanyComplianceStep::from_template(
                    &set.record.id,
                    &set.record.company_id,
                    &set.record.framework,
                    template,
                    set.company.size,
                    now,
                )
            })
            .collect())
    }
}

pub struct PrioritizeSteps;

#[async_trait]
impl Activity for PrioritizeSteps {
    type Input = Vec<CompanyComplianceStep>;
    type Output = Vec<CompanyComplianceStep>;

    fn name(&self) -> &'static str {
        "calculate_priorities"
    }

    async fn execute(
        &self,
        env: &ActivityEnv,
        steps: &Vec<CompanyComplianceStep>,
    ) -> ActivityResult<Vec<CompanyComplianceStep>> {
        let mut steps = steps.clone();
        env.priority().prioritize(&mut steps);
        Ok(steps)
    }
}

pub struct AssignSteps;

#[async_trait]
impl Activity for AssignSteps {
    type Input = Vec<CompanyComplianceStep>;
    type Output = Vec<CompanyComplianceStep>;

    fn name(&self) -> &'static str {
        "assign_responsibilities"
    }

    async fn execute(
        &self,
        env: &ActivityEnv,
        steps: &Vec<CompanyComplianceStep>,
    ) -> ActivityResult<Vec<CompanyComplianceStep>> {
        let mut steps = steps.clone();
        for step in steps.iter_mut() {
            assign_step(&env.catalog, step);
        }
        Ok(steps)
    }
}

pub struct ScheduleInput {
    pub steps: Vec<CompanyComplianceStep>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Backward schedule against the record due date, or the default horizon
pub struct ScheduleSteps;

#[async_trait]
impl Activity for ScheduleSteps {
    type Input = ScheduleInput;
    type Output = Vec<CompanyComplianceStep>;

    fn name(&self) -> &'static str {
        "calculate_timeline"
    }

    async fn execute(&self, env: &ActivityEnv, input: &ScheduleInput) -> ActivityResult<Vec<CompanyComplianceStep>> {
        let due = input
            .due_date
            .unwrap_or_else(|| env.now() + Duration::days(env.config.scheduling.default_due_days));
        Ok(backward_schedule(input.steps.clone(), due))
    }
}

pub struct PersistInput {
    pub record_id: RecordId,
    pub steps: Vec<CompanyComplianceStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedSteps {
    pub steps: Vec<CompanyComplianceStep>,
    pub created: u32,
    pub preserved: u32,
}

/// Writes the planned steps and the record's step totals
pub struct PersistSteps;

#[async_trait]
impl Activity for PersistSteps {
    type Input = PersistInput;
    type Output = PersistedSteps;

    fn name(&self) -> &'static str {
        "persist_steps"
    }

    async fn execute(&self, env: &ActivityEnv, input: &PersistInput) -> ActivityResult<PersistedSteps> {
        let existing: BTreeMap<u32, CompanyComplianceStep> = env
            .steps_for_record(&input.record_id)
            .await?
            .into_iter()
            .map(|s| (s.step_number, s))
            .collect();

        let mut persisted = PersistedSteps {
            steps: Vec::with_capacity(input.steps.len()),
            created: 0,
            preserved: 0,
        };
        for planned in &input.steps {
            let step = match existing.get(&planned.step_number) {
                Some(current) => {
                    persisted.preserved += 1;
                    keep_progress(planned.clone(), current)
                }
                None => {
                    persisted.created += 1;
                    planned.clone()
                }
            };
            env.bounded("storage", env.storage.put_step(step.clone())).await?;
            persisted.steps.push(step);
        }

        let completed = persisted.steps.iter().filter(|s| s.status.is_completed()).count() as u32;
        let mut record = env.record(&input.record_id).await?;
        record.apply_progress(completed, persisted.steps.len() as u32, env.now())?;
        env.bounded("storage", env.storage.put_record(record)).await?;

        Ok(persisted)
    }
}

/// Carry status and completion data of a stored step into its new plan
fn keep_progress(mut planned: CompanyComplianceStep, current: &CompanyComplianceStep) -> CompanyComplianceStep {
    planned.status = current.status;
    planned.started_at = current.started_at;
    planned.completed_by = current.completed_by.clone();
    planned.completed_at = current.completed_at;
    planned.evidence_file_path = current.evidence_file_path.clone();
    planned.created_at = current.created_at;
    planned
}

// ── Workflow ─────────────────────────────────────────────────────────

pub(crate) async fn run(
    ctx: &mut RunContext,
    input: &StepGenerationInput,
) -> Result<Outcome<StepGenerationOutput>, RunAbort> {
    let set = ctx.call(&FetchStepTemplates, &input.record_id).await?;
    let framework = set.record.framework.clone();
    if let GateResult::Closed(gate) = GateEvaluator::new().step_templates(&framework, set.templates.len()) {
        return Ok(Outcome::Gated(gate.outcome(WorkflowKind::StepGeneration)));
    }
    let due_date = set.record.due_date;

    let steps = ctx.call(&InstantiateSteps, &set).await?;
    let steps = ctx.call(&PrioritizeSteps, &steps).await?;
    let steps = ctx.call(&AssignSteps, &steps).await?;
    let steps = ctx.call(&ScheduleSteps, &ScheduleInput { steps, due_date }).await?;
    let persisted = ctx
        .call(
            &PersistSteps,
            &PersistInput {
                record_id: input.record_id.clone(),
                steps,
            },
        )
        .await?;

    let steps = persisted.steps;
    let mut counts_by_priority: BTreeMap<Priority, u32> = BTreeMap::new();
    for step in &steps {
        *counts_by_priority.entry(step.effective_priority()).or_insert(0) += 1;
    }
    let schedule_start = steps.iter().filter_map(|s| s.schedule.as_ref()).map(|s| s.start_date).min();
    let schedule_end = steps.iter().filter_map(|s| s.schedule.as_ref()).map(|s| s.due_date).max();

    tracing::info!(
        run_id = %ctx.run_id(),
        record_id = %input.record_id,
        framework = %framework,
        steps = steps.len(),
        created = persisted.created,
        "Compliance steps generated"
    );

    Ok(Outcome::Completed(StepGenerationOutput {
        record_id: input.record_id.clone(),
        framework,
        total_estimated_hours: steps.iter().map(|s| s.estimated_hours).sum(),
        counts_by_priority,
        schedule_start,
        schedule_end,
        steps_created: persisted.created,
        steps_preserved: persisted.preserved,
        steps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_types::{
        CompanyId, Complexity, SizeClass, StepCategory, StepStatus,
    };

    #[test]
    fn test_keep_progress_preserves_completion() {
        let template = ComplianceStepTemplate::new(1, "Data Mapping", StepCategory::Assessment, Complexity::Medium, 16)
            .with_accountable_role("Data Protection Officer (DPO)");
        let record_id = RecordId::new("cc-acme-gdpr");
        let company_id = CompanyId::new("acme");
        let framework = Framework::new("GDPR");
        let created = Utc::now() - Duration::days(10);
        let mut current =
            CompanyComplianceStep::from_template(&record_id, &company_id, &framework, &template, SizeClass::Small, created);
        current.complete("dpo@acme.test", created + Duration::days(1), Some("map.pdf".into()));

        let planned =
            CompanyComplianceStep::from_template(&record_id, &company_id, &framework, &template, SizeClass::Large, Utc::now());
        let merged = keep_progress(planned.clone(), &current);

        assert_eq!(merged.status, StepStatus::Completed);
        assert_eq!(merged.completed_by.as_deref(), Some("dpo@acme.test"));
        assert_eq!(merged.evidence_file_path.as_deref(), Some("map.pdf"));
        assert_eq!(merged.created_at, created);
        assert_eq!(merged.estimated_hours, planned.estimated_hours);
    }
}
