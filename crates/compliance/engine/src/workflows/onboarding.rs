//! Company onboarding
//!
//! analyze → find requirements → [gate] → create records → set due dates → notify

use crate::activity::{Activity, ActivityEnv};
use crate::collaborators::{Channel, DeliveryStatus, Notification};
use crate::context::{Outcome, RunAbort, RunContext};
use crate::error::ActivityResult;
use crate::gate::{GateEvaluator, GateResult};
use crate::matcher::{assess_risk, MatchResult, MatchedRequirement, RiskAssessment};
use crate::workflows::WorkflowKind;
use async_trait::async_trait;
use chrono::Duration;
use compliance_types::{
    Company, CompanyComplianceRecord, CompanyId, Framework, Priority,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanyOnboardingInput {
    pub company_id: CompanyId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyOnboardingOutput {
    pub company_id: CompanyId,
    pub match_result: MatchResult,
    pub risk_assessment: RiskAssessment,
    pub records: Vec<CompanyComplianceRecord>,
    pub counts_by_priority: BTreeMap<Priority, u32>,
    pub notifications_sent: u32,
    pub notifications_failed: u32,
}

/// Days allowed to complete a requirement
pub fn due_in_days(framework: &Framework, priority: Priority) -> i64 {
    let days = match priority {
        Priority::Critical => 30,
        Priority::High => 60,
        Priority::Medium => 90,
        Priority::Low => 120,
    };
    if framework.is("SOX") {
        days.min(45)
    } else if framework.is("GDPR") {
        days.min(60)
    } else {
        days
    }
}

// ── Activities ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyAnalysis {
    pub company: Company,
    pub match_result: MatchResult,
}

pub struct AnalyzeCompany;

#[async_trait]
impl Activity for AnalyzeCompany {
    type Input = CompanyId;
    type Output = CompanyAnalysis;

    fn name(&self) -> &'static str {
        "analyze_company"
    }

    async fn execute(&self, env: &ActivityEnv, company_id: &CompanyId) -> ActivityResult<CompanyAnalysis> {
        let company = env.company(company_id).await?;
        let match_result = env.matcher().match_company(&company);
        tracing::info!(
            company_id = %company.id,
            frameworks = match_result.frameworks.len(),
            risk_level = %match_result.risk_level,
            confidence = match_result.confidence,
            "Company analyzed"
        );
        Ok(CompanyAnalysis {
            company,
            match_result,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequirementSelection {
    pub requirements: Vec<MatchedRequirement>,
    pub risk_assessment: RiskAssessment,
}

pub struct FindRequirements;

#[async_trait]
impl Activity for FindRequirements {
    type Input = MatchResult;
    type Output = RequirementSelection;

    fn name(&self) -> &'static str {
        "find_requirements"
    }

    async fn execute(&self, env: &ActivityEnv, matched: &MatchResult) -> ActivityResult<RequirementSelection> {
        let requirements = env.matcher().find_requirements(matched);
        let risk_assessment = assess_risk(&requirements);
        Ok(RequirementSelection {
            requirements,
            risk_assessment,
        })
    }
}

pub struct CreateRecordsInput {
    pub company_id: CompanyId,
    pub requirements: Vec<MatchedRequirement>,
}

/// Creates one record per requirement. Existing records are returned as
/// stored and never overwritten.
pub struct CreateRecords;

#[async_trait]
impl Activity for CreateRecords {
    type Input = CreateRecordsInput;
    type Output = Vec<CompanyComplianceRecord>;

    fn name(&self) -> &'static str {
        "create_compliance_records"
    }

    async fn execute(
        &self,
        env: &ActivityEnv,
        input: &CreateRecordsInput,
    ) -> ActivityResult<Vec<CompanyComplianceRecord>> {
        let now = env.now();
        let mut records = Vec::with_capacity(input.requirements.len());
        for matched in &input.requirements {
            let fresh = CompanyComplianceRecord::new(input.company_id.clone(), &matched.requirement, now)
                .with_assignee(env.catalog.compliance_team.clone());
            let existing = env.bounded("storage", env.storage.get_record(&fresh.id)).await?;
            let record = match existing {
                Some(record) => {
                    tracing::debug!(record_id = %record.id, "Compliance record already exists");
                    record
                }
                None => {
                    env.bounded("storage", env.storage.put_record(fresh.clone())).await?;
                    fresh
                }
            };
            records.push(record);
        }
        Ok(records)
    }
}

pub struct SetDueDates;

#[async_trait]
impl Activity for SetDueDates {
    type Input = Vec<CompanyComplianceRecord>;
    type Output = Vec<CompanyComplianceRecord>;

    fn name(&self) -> &'static str {
        "set_due_dates"
    }

    async fn execute(
        &self,
        env: &ActivityEnv,
        records: &Vec<CompanyComplianceRecord>,
    ) -> ActivityResult<Vec<CompanyComplianceRecord>> {
        let now = env.now();
        let mut updated = Vec::with_capacity(records.len());
        for record in records {
            if record.due_date.is_some() {
                updated.push(record.clone());
                continue;
            }
            let days = due_in_days(&record.framework, record.priority);
            let mut record = record.clone();
            record.due_date = Some(now + Duration::days(days));
            record.days_to_complete = Some(days as u32);
            env.bounded("storage", env.storage.put_record(record.clone())).await?;
            updated.push(record);
        }
        Ok(updated)
    }
}

pub struct NotifyInput {
    pub company: Company,
    pub records: Vec<CompanyComplianceRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub sent: u32,
    pub failed: u32,
}

impl NotificationSummary {
    fn count(&mut self, status: DeliveryStatus) {
        if status.is_delivered() {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Team summary by email, then one alert per record on each routed channel
pub struct NotifyStakeholders;

#[async_trait]
impl Activity for NotifyStakeholders {
    type Input = NotifyInput;
    type Output = NotificationSummary;

    fn name(&self) -> &'static str {
        "notify_stakeholders"
    }

    async fn execute(&self, env: &ActivityEnv, input: &NotifyInput) -> ActivityResult<NotificationSummary> {
        let company = &input.company;
        let mut summary = NotificationSummary::default();

        let frameworks: Vec<String> = input
            .records
            .iter()
            .map(|r| r.framework.to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let team_summary = Notification::new(
            env.catalog.compliance_team.clone(),
            format!("{} onboarded with {} compliance requirement(s)", company.name, input.records.len()),
            Priority::Medium,
            format!("onboarding:{}:summary", company.id),
        )
        .with_body(format!("Frameworks: {}", frameworks.join(", ")));
        let status = env
            .bounded("notifier", env.notifier.send(Channel::Email, &team_summary))
            .await?;
        summary.count(status);

        for record in &input.records {
            let mut body = format!("{} ({}) for {}", record.requirement_name, record.framework, company.name);
            if let Some(due) = record.due_date {
                body.push_str(&format!(", due {}", due.format("%Y-%m-%d")));
            }
            let alert = Notification::new(
                record
                    .assigned_to
                    .clone()
                    .unwrap_or_else(|| env.catalog.compliance_team.clone()),
                format!("New {} compliance requirement: {}", record.priority, record.requirement_name),
                record.priority,
                format!("onboarding:{}", record.id),
            )
            .with_body(body);

            for channel in env.catalog.routing.channels_for(record.priority) {
                let status = env.bounded("notifier", env.notifier.send(channel, &alert)).await?;
                if let DeliveryStatus::Failed { reason } = &status {
                    tracing::warn!(record_id = %record.id, channel = %channel, reason = %reason, "Alert not delivered");
                }
                summary.count(status);
            }
        }

        Ok(summary)
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

pub(crate) async fn run(
    ctx: &mut RunContext,
    input: &CompanyOnboardingInput,
) -> Result<Outcome<CompanyOnboardingOutput>, RunAbort> {
    let analysis = ctx.call(&AnalyzeCompany, &input.company_id).await?;
    let selection = ctx.call(&FindRequirements, &analysis.match_result).await?;

    if let GateResult::Closed(gate) =
        GateEvaluator::new().requirements(&input.company_id, &analysis.match_result, &selection.requirements)
    {
        return Ok(Outcome::Gated(gate.outcome(WorkflowKind::CompanyOnboarding)));
    }

    let records = ctx
        .call(
            &CreateRecords,
            &CreateRecordsInput {
                company_id: input.company_id.clone(),
                requirements: selection.requirements.clone(),
            },
        )
        .await?;
    let records = ctx.call(&SetDueDates, &records).await?;
    let notifications = ctx
        .call(
            &NotifyStakeholders,
            &NotifyInput {
                company: analysis.company.clone(),
                records: records.clone(),
            },
        )
        .await?;

    let mut counts_by_priority: BTreeMap<Priority, u32> =
        Priority::ALL.iter().map(|p| (*p, 0)).collect();
    for record in &records {
        *counts_by_priority.entry(record.priority).or_insert(0) += 1;
    }

    tracing::info!(
        run_id = %ctx.run_id(),
        company_id = %input.company_id,
        records = records.len(),
        notifications = notifications.sent,
        "Company onboarded"
    );

    Ok(Outcome::Completed(CompanyOnboardingOutput {
        company_id: input.company_id.clone(),
        match_result: analysis.match_result,
        risk_assessment: selection.risk_assessment,
        records,
        counts_by_priority,
        notifications_sent: notifications.sent,
        notifications_failed: notifications.failed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_days() {
        assert_eq!(due_in_days(&Framework::new("SOX"), Priority::Critical), 30);
        assert_eq!(due_in_days(&Framework::new("SOX"), Priority::High), 45);
        assert_eq!(due_in_days(&Framework::new("GDPR"), Priority::Low), 60);
        assert_eq!(due_in_days(&Framework::new("GDPR"), Priority::Critical), 30);
        assert_eq!(due_in_days(&Framework::new("ISO27001"), Priority::High), 60);
        assert_eq!(due_in_days(&Framework::new("PCI-DSS"), Priority::Medium), 90);
    }
}
