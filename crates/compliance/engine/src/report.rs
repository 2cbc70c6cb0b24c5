//! Report documents
//!
//! [`ComplianceReport`] is the company-wide status report produced by the
//! reporting workflow. [`CompletionReport`] closes out a single
//! requirement once all of its steps are done.

use crate::progress::{
    CompletionMetrics, Insights, OverdueItem, RequirementStatus, StepProgress, Urgency,
};
use chrono::{DateTime, Duration, Utc};
use compliance_types::{
    Company, CompanyComplianceRecord, CompanyComplianceStep, CompanyId, Priority, RecordId,
    RecordStatus, RiskLevel,
};
use serde::{Deserialize, Serialize};

pub const REPORT_VERSION: &str = "1.0";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Every section, including per-requirement detail
    #[default]
    Comprehensive,
    /// Summary, metrics, overdue analysis and insights only
    Executive,
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportType::Comprehensive => write!(f, "comprehensive"),
            ReportType::Executive => write!(f, "executive"),
        }
    }
}

// ── Compliance Report ────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_id: String,
    pub report_type: ReportType,
    pub company_id: CompanyId,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub company_name: String,
    pub overall_completion_rate: f64,
    pub critical_completion_rate: f64,
    pub risk_level: RiskLevel,
    pub total_requirements: u32,
    pub completed_requirements: u32,
    pub overdue_count: u32,
    /// Overdue items with critical urgency
    pub immediate_actions_required: u32,
    pub key_achievements: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportSections {
    pub company_profile: Company,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compliance_status: Vec<RequirementStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_progress: Option<StepProgress>,
    pub completion_metrics: CompletionMetrics,
    pub overdue_analysis: Vec<OverdueItem>,
    pub insights: Insights,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportAppendix {
    pub methodology: String,
    pub data_sources: Vec<String>,
    pub limitations: Vec<String>,
}

impl Default for ReportAppendix {
    fn default() -> Self {
        Self {
            methodology: "Automated compliance tracking over step-level progress records".into(),
            data_sources: vec![
                "company compliance records".into(),
                "company compliance steps".into(),
                "compliance requirement catalog".into(),
            ],
            limitations: vec![
                "Data current as of report generation time".into(),
                "Manual verification recommended for critical decisions".into(),
            ],
        }
    }
}

/// Company-wide compliance status report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub metadata: ReportMetadata,
    pub executive_summary: ExecutiveSummary,
    pub sections: ReportSections,
    pub appendix: ReportAppendix,
}

/// Everything the report is assembled from
#[derive(Clone, Debug)]
pub struct ReportInputs<'a> {
    pub company: &'a Company,
    pub statuses: &'a [RequirementStatus],
    pub step_progress: &'a StepProgress,
    pub metrics: &'a CompletionMetrics,
    pub overdue: &'a [OverdueItem],
    pub insights: &'a Insights,
}

impl ComplianceReport {
    pub fn build(
        inputs: ReportInputs<'_>,
        report_type: ReportType,
        generated_by: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let metrics = inputs.metrics;
        let report_id = format!("rpt-{}-{}", inputs.company.id, now.format("%Y%m%d%H%M%S"));

        let executive_summary = ExecutiveSummary {
            company_name: inputs.company.name.clone(),
            overall_completion_rate: metrics.overall_completion_rate,
            critical_completion_rate: metrics.critical_completion_rate,
            risk_level: metrics.risk_level,
            total_requirements: metrics.requirements.total,
            completed_requirements: metrics.requirements.completed,
            overdue_count: inputs.overdue.len() as u32,
            immediate_actions_required: inputs
                .overdue
                .iter()
                .filter(|item| item.urgency == Urgency::Critical)
                .count() as u32,
            key_achievements: key_achievements(inputs.statuses),
        };

        let detailed = report_type == ReportType::Comprehensive;
        let sections = ReportSections {
            company_profile: inputs.company.clone(),
            compliance_status: if detailed {
                inputs.statuses.to_vec()
            } else {
                Vec::new()
            },
            step_progress: detailed.then(|| inputs.step_progress.clone()),
            completion_metrics: metrics.clone(),
            overdue_analysis: inputs.overdue.to_vec(),
            insights: inputs.insights.clone(),
        };

        Self {
            metadata: ReportMetadata {
                report_id,
                report_type,
                company_id: inputs.company.id.clone(),
                generated_at: now,
                generated_by: generated_by.to_string(),
                version: REPORT_VERSION.to_string(),
            },
            executive_summary,
            sections,
            appendix: ReportAppendix::default(),
        }
    }
}

fn key_achievements(statuses: &[RequirementStatus]) -> Vec<String> {
    let mut achievements: Vec<String> = statuses
        .iter()
        .filter_map(|s| match s.status {
            RecordStatus::Completed => Some(format!("{} {} completed", s.framework, s.requirement_name)),
            RecordStatus::InProgress if s.completion_percentage >= 50.0 => Some(format!(
                "{} {} {:.0}% complete",
                s.framework, s.requirement_name, s.completion_percentage
            )),
            _ => None,
        })
        .collect();
    if achievements.is_empty() && !statuses.is_empty() {
        achievements.push(format!(
            "Compliance tracking established for {} requirement(s)",
            statuses.len()
        ));
    }
    achievements
}

// ── Completion Report ────────────────────────────────────────────────

/// Follow-up action suggested to the team
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    pub action: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl NextAction {
    pub fn new(action: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            description: description.into(),
            priority: None,
            due_date: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub requirement_name: String,
    pub framework: String,
    pub total_steps: u32,
    pub completed_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
    /// Finished on or before the due date; unknown without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_time: Option<bool>,
    pub certification_ready: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDetail {
    pub step_number: u32,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_file_path: Option<String>,
}

/// Close-out report for one fully completed requirement
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub report_id: String,
    pub record_id: RecordId,
    pub company_id: CompanyId,
    pub generated_at: DateTime<Utc>,
    pub summary: CompletionSummary,
    pub step_details: Vec<StepDetail>,
    pub recommendations: Vec<String>,
    pub next_actions: Vec<NextAction>,
}

impl CompletionReport {
    pub fn build(
        record: &CompanyComplianceRecord,
        steps: &[CompanyComplianceStep],
        now: DateTime<Utc>,
    ) -> Self {
        let mut ordered: Vec<&CompanyComplianceStep> = steps.iter().collect();
        ordered.sort_by_key(|s| s.step_number);

        let completed = ordered.iter().filter(|s| s.status.is_completed()).count() as u32;
        let completion_date = record
            .completed_at
            .or_else(|| ordered.iter().filter_map(|s| s.completed_at).max());
        let on_time = match (completion_date, record.due_date) {
            (Some(done), Some(due)) => Some(done <= due),
            _ => None,
        };
        let with_evidence = ordered.iter().filter(|s| s.evidence_file_path.is_some()).count();

        let mut recommendations = vec![
            format!("Schedule periodic reviews of {} controls", record.framework),
            "Update policies and notices when processing or controls change".to_string(),
            "Run refresher training for staff involved in the completed steps".to_string(),
        ];
        if with_evidence < ordered.len() {
            recommendations.push(format!(
                "Attach evidence to the {} step(s) completed without it",
                ordered.len() - with_evidence
            ));
        }

        Self {
            report_id: format!("cr-{}-{}", record.id, now.format("%Y%m%d%H%M%S")),
            record_id: record.id.clone(),
            company_id: record.company_id.clone(),
            generated_at: now,
            summary: CompletionSummary {
                requirement_name: record.requirement_name.clone(),
                framework: record.framework.to_string(),
                total_steps: ordered.len() as u32,
                completed_steps: completed,
                completion_date,
                on_time,
                certification_ready: completed as usize == ordered.len() && !ordered.is_empty(),
            },
            step_details: ordered
                .iter()
                .map(|s| StepDetail {
                    step_number: s.step_number,
                    title: s.title.clone(),
                    completed_by: s.completed_by.clone(),
                    completed_at: s.completed_at,
                    evidence_file_path: s.evidence_file_path.clone(),
                })
                .collect(),
            recommendations,
            next_actions: vec![NextAction::new(
                "schedule_annual_review",
                "Schedule the annual compliance review",
            )
            .with_due_date(now + Duration::days(365))],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{aggregate_steps, completion_metrics, insights, overdue_items};
    use chrono::TimeZone;
    use compliance_types::{
        ComplianceRequirement, ComplianceStepTemplate, Complexity, Framework, SizeClass,
        StepCategory,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn record() -> CompanyComplianceRecord {
        let req = ComplianceRequirement::new("1", "Data Protection Assessment", "GDPR", Priority::High);
        CompanyComplianceRecord::new(CompanyId::new("acme"), &req, now() - Duration::days(30))
    }

    fn steps(record: &CompanyComplianceRecord) -> Vec<CompanyComplianceStep> {
        (1..=2)
            .map(|n| {
                let template = ComplianceStepTemplate::new(
                    n,
                    format!("Step {}", n),
                    StepCategory::Assessment,
                    Complexity::Low,
                    8,
                );
                let mut step = CompanyComplianceStep::from_template(
                    &record.id,
                    &record.company_id,
                    &Framework::new("GDPR"),
                    &template,
                    SizeClass::Small,
                    now(),
                );
                step.complete("alice", now() - Duration::days(3 - n as i64), None);
                step
            })
            .collect()
    }

    #[test]
    fn test_completion_report() {
        let mut rec = record();
        rec.due_date = Some(now());
        let steps = steps(&rec);
        let report = CompletionReport::build(&rec, &steps, now());
        assert_eq!(report.summary.total_steps, 2);
        assert!(report.summary.certification_ready);
        assert_eq!(report.summary.on_time, Some(true));
        assert_eq!(report.step_details[0].step_number, 1);
        // evidence missing on both steps
        assert_eq!(report.recommendations.len(), 4);
        assert_eq!(report.next_actions[0].action, "schedule_annual_review");
    }

    #[test]
    fn test_executive_report_omits_detail() {
        let company = Company::new("acme", "Acme Corp");
        let rec = record();
        let statuses = vec![RequirementStatus::from_record(&rec, &steps(&rec))];
        let progress = aggregate_steps(&statuses);
        let metrics = completion_metrics(&statuses, &progress, now());
        let overdue = overdue_items(&statuses, now());
        let insights = insights(&metrics, &overdue);
        let inputs = ReportInputs {
            company: &company,
            statuses: &statuses,
            step_progress: &progress,
            metrics: &metrics,
            overdue: &overdue,
            insights: &insights,
        };

        let full = ComplianceReport::build(inputs.clone(), ReportType::Comprehensive, "test", now());
        assert_eq!(full.sections.compliance_status.len(), 1);
        assert!(full.sections.step_progress.is_some());
        assert_eq!(full.executive_summary.overall_completion_rate, 100.0);
        assert_eq!(
            full.executive_summary.key_achievements,
            vec!["GDPR Data Protection Assessment completed".to_string()]
        );
        assert_eq!(full.metadata.report_id, "rpt-acme-20260601120000");

        let exec = ComplianceReport::build(inputs, ReportType::Executive, "test", now());
        assert!(exec.sections.compliance_status.is_empty());
        assert!(exec.sections.step_progress.is_none());
    }
}
