//! Compliance reporting
//!
//! gather profile → collect status → aggregate steps → metrics → overdue
//! → insights → format → distribute

use crate::activity::{Activity, ActivityEnv};
use crate::collaborators::{Channel, DistributionRecord, DistributionStatus, RecordQuery, StepQuery};
use crate::context::{Outcome, RunAbort, RunContext};
use crate::error::ActivityResult;
use crate::progress::{
    aggregate_steps, completion_metrics, insights, overdue_items, CompletionMetrics, Insights,
    OverdueItem, RequirementStatus, StepProgress,
};
use crate::report::{ComplianceReport, ReportInputs, ReportType};
use async_trait::async_trait;
use compliance_types::{Company, CompanyComplianceStep, CompanyId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplianceReportingInput {
    pub company_id: CompanyId,
    #[serde(default)]
    pub report_type: ReportType,
    /// Distribution channels; the configured ones when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<Channel>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReportingOutput {
    pub company_id: CompanyId,
    pub report: ComplianceReport,
    pub distribution: Vec<DistributionRecord>,
    pub channels_sent: u32,
    pub channels_failed: u32,
}

// ── Activities ───────────────────────────────────────────────────────

pub struct GatherCompanyProfile;

#[async_trait]
impl Activity for GatherCompanyProfile {
    type Input = CompanyId;
    type Output = Company;

    fn name(&self) -> &'static str {
        "gather_company_profile"
    }

    async fn execute(&self, env: &ActivityEnv, company_id: &CompanyId) -> ActivityResult<Company> {
        env.company(company_id).await
    }
}

/// One status per record, with counts taken from the record's steps
pub struct CollectComplianceStatus;

#[async_trait]
impl Activity for CollectComplianceStatus {
    type Input = CompanyId;
    type Output = Vec<RequirementStatus>;

    fn name(&self) -> &'static str {
        "collect_compliance_status"
    }

    async fn execute(&self, env: &ActivityEnv, company_id: &CompanyId) -> ActivityResult<Vec<RequirementStatus>> {
        let records = env
            .bounded("storage", env.storage.query_records(&RecordQuery::for_company(company_id)))
            .await?;
        let steps = env
            .bounded("storage", env.storage.query_steps(&StepQuery::for_company(company_id)))
            .await?;

        let mut by_record: HashMap<RecordId, Vec<CompanyComplianceStep>> = HashMap::new();
        for step in steps {
            by_record.entry(step.record_id.clone()).or_default().push(step);
        }

        let statuses: Vec<RequirementStatus> = records
            .iter()
            .map(|record| {
                let steps = by_record.get(&record.id).map(Vec::as_slice).unwrap_or(&[]);
                RequirementStatus::from_record(record, steps)
            })
            .collect();
        tracing::debug!(company_id = %company_id, requirements = statuses.len(), "Compliance status collected");
        Ok(statuses)
    }
}

pub struct AggregateStepProgress;

#[async_trait]
impl Activity for AggregateStepProgress {
    type Input = Vec<RequirementStatus>;
    type Output = StepProgress;

    fn name(&self) -> &'static str {
        "aggregate_step_progress"
    }

    async fn execute(&self, _env: &ActivityEnv, statuses: &Vec<RequirementStatus>) -> ActivityResult<StepProgress> {
        Ok(aggregate_steps(statuses))
    }
}

pub struct MetricsInput {
    pub statuses: Vec<RequirementStatus>,
    pub step_progress: StepProgress,
}

pub struct CalculateCompletionMetrics;

#[async_trait]
impl Activity for CalculateCompletionMetrics {
    type Input = MetricsInput;
    type Output = CompletionMetrics;

    fn name(&self) -> &'static str {
        "calculate_completion_metrics"
    }

    async fn execute(&self, env: &ActivityEnv, input: &MetricsInput) -> ActivityResult<CompletionMetrics> {
        Ok(completion_metrics(&input.statuses, &input.step_progress, env.now()))
    }
}

pub struct IdentifyOverdueItems;

#[async_trait]
impl Activity for IdentifyOverdueItems {
    type Input = Vec<RequirementStatus>;
    type Output = Vec<OverdueItem>;

    fn name(&self) -> &'static str {
        "identify_overdue_items"
    }

    async fn execute(&self, env: &ActivityEnv, statuses: &Vec<RequirementStatus>) -> ActivityResult<Vec<OverdueItem>> {
        let overdue = overdue_items(statuses, env.now());
        if !overdue.is_empty() {
            tracing::warn!(overdue = overdue.len(), "Overdue compliance items found");
        }
        Ok(overdue)
    }
}

pub struct InsightsInput {
    pub metrics: CompletionMetrics,
    pub overdue: Vec<OverdueItem>,
}

pub struct GenerateInsights;

#[async_trait]
impl Activity for GenerateInsights {
    type Input = InsightsInput;
    type Output = Insights;

    fn name(&self) -> &'static str {
        "generate_insights"
    }

    async fn execute(&self, _env: &ActivityEnv, input: &InsightsInput) -> ActivityResult<Insights> {
        Ok(insights(&input.metrics, &input.overdue))
    }
}

pub struct FormatInput {
    pub company: Company,
    pub statuses: Vec<RequirementStatus>,
    pub step_progress: StepProgress,
    pub metrics: CompletionMetrics,
    pub overdue: Vec<OverdueItem>,
    pub insights: Insights,
    pub report_type: ReportType,
}

pub struct FormatReport;

#[async_trait]
impl Activity for FormatReport {
    type Input = FormatInput;
    type Output = ComplianceReport;

    fn name(&self) -> &'static str {
        "format_report"
    }

    async fn execute(&self, env: &ActivityEnv, input: &FormatInput) -> ActivityResult<ComplianceReport> {
        let inputs = ReportInputs {
            company: &input.company,
            statuses: &input.statuses,
            step_progress: &input.step_progress,
            metrics: &input.metrics,
            overdue: &input.overdue,
            insights: &input.insights,
        };
        Ok(ComplianceReport::build(
            inputs,
            input.report_type,
            &env.config.reporting.generated_by,
            env.now(),
        ))
    }
}

pub struct DistributeInput {
    pub report: ComplianceReport,
    pub channels: Vec<Channel>,
}

/// Publishes on every channel; a failed channel is recorded, not raised
pub struct DistributeReport;

#[async_trait]
impl Activity for DistributeReport {
    type Input = DistributeInput;
    type Output = Vec<DistributionRecord>;

    fn name(&self) -> &'static str {
        "distribute_report"
    }

    async fn execute(&self, env: &ActivityEnv, input: &DistributeInput) -> ActivityResult<Vec<DistributionRecord>> {
        let records = env
            .bounded("publisher", env.publisher.publish(&input.report, &input.channels))
            .await?;
        for record in records.iter().filter(|r| r.status == DistributionStatus::Failed) {
            tracing::warn!(
                report_id = %input.report.metadata.report_id,
                channel = %record.channel,
                error = ?record.error,
                "Report distribution failed"
            );
        }
        Ok(records)
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

pub(crate) async fn run(
    ctx: &mut RunContext,
    input: &ComplianceReportingInput,
) -> Result<Outcome<ComplianceReportingOutput>, RunAbort> {
    let company = ctx.call(&GatherCompanyProfile, &input.company_id).await?;
    let statuses = ctx.call(&CollectComplianceStatus, &input.company_id).await?;
    let step_progress = ctx.call(&AggregateStepProgress, &statuses).await?;
    let metrics = ctx
        .call(
            &CalculateCompletionMetrics,
            &MetricsInput {
                statuses: statuses.clone(),
                step_progress: step_progress.clone(),
            },
        )
        .await?;
    let overdue = ctx.call(&IdentifyOverdueItems, &statuses).await?;
    let insights = ctx
        .call(
            &GenerateInsights,
            &InsightsInput {
                metrics: metrics.clone(),
                overdue: overdue.clone(),
            },
        )
        .await?;
    let report = ctx
        .call(
            &FormatReport,
            &FormatInput {
                company,
                statuses,
                step_progress,
                metrics,
                overdue,
                insights,
                report_type: input.report_type,
            },
        )
        .await?;

    let channels = input
        .channels
        .clone()
        .unwrap_or_else(|| ctx.env().config.reporting.channels.clone());
    let distribution = ctx
        .call(
            &DistributeReport,
            &DistributeInput {
                report: report.clone(),
                channels,
            },
        )
        .await?;

    let channels_sent = distribution
        .iter()
        .filter(|r| r.status == DistributionStatus::Sent)
        .count() as u32;
    tracing::info!(
        run_id = %ctx.run_id(),
        company_id = %input.company_id,
        report_id = %report.metadata.report_id,
        channels_sent,
        "Compliance report generated"
    );

    Ok(Outcome::Completed(ComplianceReportingOutput {
        company_id: input.company_id.clone(),
        channels_failed: distribution.len() as u32 - channels_sent,
        channels_sent,
        distribution,
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_defaults() {
        let input: ComplianceReportingInput =
            serde_json::from_value(serde_json::json!({"company_id": "acme"})).unwrap();
        assert_eq!(input.report_type, ReportType::Comprehensive);
        assert!(input.channels.is_none());

        let input: ComplianceReportingInput = serde_json::from_value(serde_json::json!({
            "company_id": "acme",
            "report_type": "executive",
            "channels": ["email", "dashboard"]
        }))
        .unwrap();
        assert_eq!(input.report_type, ReportType::Executive);
        assert_eq!(input.channels, Some(vec![Channel::Email, Channel::Dashboard]));
    }
}
