//! Progress aggregation
//!
//! Pure reducers over per-requirement status records. Everything is
//! recomputed from scratch on every call; nothing is cached between runs.

use chrono::{DateTime, Utc};
use compliance_types::{
    completion_percentage, CompanyComplianceRecord, CompanyComplianceStep, Framework, Priority,
    RecordId, RecordStatus, RiskLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Inputs ───────────────────────────────────────────────────────────

/// Current state of one requirement for a company
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequirementStatus {
    pub record_id: RecordId,
    pub requirement_name: String,
    pub framework: Framework,
    pub priority: Priority,
    pub status: RecordStatus,
    pub completion_percentage: f64,
    pub total_steps: u32,
    pub completed_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl RequirementStatus {
    /// Status of a record, with step counts taken from its steps when
    /// there are any. The status never drops below the stored one.
    pub fn from_record(record: &CompanyComplianceRecord, steps: &[CompanyComplianceStep]) -> Self {
        let (total, completed) = if steps.is_empty() {
            (record.total_steps, record.completed_steps)
        } else {
            let completed = steps.iter().filter(|s| s.status.is_completed()).count() as u32;
            (steps.len() as u32, completed)
        };
        let percentage = completion_percentage(completed, total);
        let derived = RecordStatus::from_completion(percentage);
        let status = if derived.rank() > record.status.rank() {
            derived
        } else {
            record.status
        };

        Self {
            record_id: record.id.clone(),
            requirement_name: record.requirement_name.clone(),
            framework: record.framework.clone(),
            priority: record.priority,
            status,
            completion_percentage: if status.is_completed() { 100.0 } else { percentage },
            total_steps: total,
            completed_steps: if status.is_completed() { total } else { completed },
            due_date: record.due_date,
            completed_at: record.completed_at,
            assigned_to: record.assigned_to.clone(),
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.due_date, Some(due) if due < now && !self.status.is_completed())
    }
}

// ── Step Progress ────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub total: u32,
    pub completed: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkBucket {
    pub total: u32,
    pub completed: u32,
    /// Rounded to one decimal
    pub completion_rate: f64,
}

/// Step counts across all requirements
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    pub total_steps: u32,
    pub completed_steps: u32,
    pub in_progress_steps: u32,
    pub pending_steps: u32,
    pub by_priority: BTreeMap<Priority, Bucket>,
    pub by_framework: BTreeMap<Framework, FrameworkBucket>,
}

/// Roll step counts up by priority and framework
pub fn aggregate_steps(statuses: &[RequirementStatus]) -> StepProgress {
    let mut progress = StepProgress::default();
    for priority in Priority::ALL {
        progress.by_priority.insert(priority, Bucket::default());
    }

    for status in statuses {
        progress.total_steps += status.total_steps;
        progress.completed_steps += status.completed_steps;
        match status.status {
            RecordStatus::InProgress => {
                progress.in_progress_steps += status.total_steps.saturating_sub(status.completed_steps)
            }
            RecordStatus::NotStarted => progress.pending_steps += status.total_steps,
            RecordStatus::Completed => {}
        }

        let bucket = progress.by_priority.entry(status.priority).or_default();
        bucket.total += status.total_steps;
        bucket.completed += status.completed_steps;

        let bucket = progress.by_framework.entry(status.framework.clone()).or_default();
        bucket.total += status.total_steps;
        bucket.completed += status.completed_steps;
    }

    for bucket in progress.by_framework.values_mut() {
        bucket.completion_rate = round1(rate(bucket.completed, bucket.total));
    }

    progress
}

// ── Completion Metrics ───────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementSummary {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub not_started: u32,
    pub overdue: u32,
    /// Requirements with Critical priority
    pub critical: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub pending: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceIndicators {
    pub on_track: bool,
    pub critical_compliance_met: bool,
    pub no_overdue_items: bool,
}

/// Company-level completion metrics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionMetrics {
    pub overall_completion_rate: f64,
    pub step_completion_rate: f64,
    pub critical_completion_rate: f64,
    pub requirements: RequirementSummary,
    pub steps: StepSummary,
    pub performance: PerformanceIndicators,
    pub risk_level: RiskLevel,
}

pub fn completion_metrics(
    statuses: &[RequirementStatus],
    steps: &StepProgress,
    now: DateTime<Utc>,
) -> CompletionMetrics {
    let mut summary = RequirementSummary {
        total: statuses.len() as u32,
        ..Default::default()
    };
    let mut critical_completed = 0;
    for status in statuses {
        match status.status {
            RecordStatus::Completed => summary.completed += 1,
            RecordStatus::InProgress => summary.in_progress += 1,
            RecordStatus::NotStarted => summary.not_started += 1,
        }
        if status.is_overdue(now) {
            summary.overdue += 1;
        }
        if status.priority == Priority::Critical {
            summary.critical += 1;
            if status.status.is_completed() {
                critical_completed += 1;
            }
        }
    }

    let overall = round1(rate(summary.completed, summary.total));
    let critical = round1(rate(critical_completed, summary.critical));

    let performance = PerformanceIndicators {
        on_track: overall >= 80.0,
        critical_compliance_met: summary.critical == 0 || critical >= 90.0,
        no_overdue_items: summary.overdue == 0,
    };

    CompletionMetrics {
        overall_completion_rate: overall,
        step_completion_rate: round1(rate(steps.completed_steps, steps.total_steps)),
        critical_completion_rate: critical,
        steps: StepSummary {
            total: steps.total_steps,
            completed: steps.completed_steps,
            in_progress: steps.in_progress_steps,
            pending: steps.pending_steps,
        },
        requirements: summary,
        performance,
        risk_level: risk_for_rate(overall),
    }
}

/// Risk implied by the overall completion rate
pub fn risk_for_rate(overall: f64) -> RiskLevel {
    if overall >= 90.0 {
        RiskLevel::Low
    } else if overall >= 70.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

// ── Overdue ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn for_days(days_overdue: i64) -> Self {
        if days_overdue > 30 {
            Urgency::Critical
        } else if days_overdue > 14 {
            Urgency::High
        } else {
            Urgency::Medium
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverdueItem {
    pub record_id: RecordId,
    pub requirement_name: String,
    pub framework: Framework,
    pub due_date: DateTime<Utc>,
    pub days_overdue: i64,
    pub priority: Priority,
    pub completion_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub urgency: Urgency,
}

/// Unfinished requirements past their due date, most overdue first
pub fn overdue_items(statuses: &[RequirementStatus], now: DateTime<Utc>) -> Vec<OverdueItem> {
    let mut items: Vec<OverdueItem> = statuses
        .iter()
        .filter_map(|status| {
            let due = status.due_date?;
            if !status.is_overdue(now) {
                return None;
            }
            let days_overdue = (now - due).num_days();
            Some(OverdueItem {
                record_id: status.record_id.clone(),
                requirement_name: status.requirement_name.clone(),
                framework: status.framework.clone(),
                due_date: due,
                days_overdue,
                priority: status.priority,
                completion_percentage: status.completion_percentage,
                assigned_to: status.assigned_to.clone(),
                urgency: Urgency::for_days(days_overdue),
            })
        })
        .collect();

    items.sort_by(|a, b| {
        b.days_overdue
            .cmp(&a.days_overdue)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
    items
}

// ── Insights ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    High,
    Medium,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    pub category: String,
    pub recommendation: String,
    pub action_items: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub overall_risk: RiskLevel,
    pub risk_factors: Vec<String>,
    pub mitigation_strategies: Vec<String>,
}

/// Rule-based observations over the metrics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub key_insights: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub risk: RiskSummary,
}

pub fn insights(metrics: &CompletionMetrics, overdue: &[OverdueItem]) -> Insights {
    let overall = metrics.overall_completion_rate;
    let has_critical = metrics.requirements.critical > 0;
    let critical = metrics.critical_completion_rate;

    let mut key_insights = Vec::new();
    key_insights.push(if overall >= 90.0 {
        "Excellent compliance performance, exceeding industry standards".to_string()
    } else if overall >= 75.0 {
        "Good compliance progress, on track to meet regulatory requirements".to_string()
    } else {
        "Compliance performance needs improvement, risk of regulatory issues".to_string()
    });
    if !overdue.is_empty() {
        key_insights.push(format!(
            "{} compliance items are overdue and require immediate attention",
            overdue.len()
        ));
    }
    if has_critical && critical < 90.0 {
        key_insights.push("Critical compliance requirements need prioritization".to_string());
    }

    let mut recommendations = Vec::new();
    if !overdue.is_empty() {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::High,
            category: "overdue_items".into(),
            recommendation: "Address overdue compliance items immediately".into(),
            action_items: vec![
                "Review resource allocation for overdue items".into(),
                "Escalate critical overdue requirements to management".into(),
                "Implement accelerated completion timeline".into(),
            ],
        });
    }
    if overall < 80.0 {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::Medium,
            category: "performance_improvement".into(),
            recommendation: "Improve overall compliance completion rate".into(),
            action_items: vec![
                "Increase resource allocation to compliance activities".into(),
                "Provide additional training to compliance teams".into(),
                "Implement automated compliance tracking tools".into(),
            ],
        });
    }

    let mut risk_factors = Vec::new();
    if overdue.len() > 2 {
        risk_factors.push("Multiple overdue compliance requirements".to_string());
    }
    if has_critical && critical < 80.0 {
        risk_factors.push("Critical compliance requirements not meeting targets".to_string());
    }

    Insights {
        key_insights,
        recommendations,
        risk: RiskSummary {
            overall_risk: metrics.risk_level,
            risk_factors,
            mitigation_strategies: vec![
                "Hold weekly compliance review meetings".into(),
                "Establish clear escalation procedures for overdue items".into(),
                "Invest in compliance automation tools".into(),
                "Run regular compliance training programs".into(),
            ],
        },
    }
}

fn rate(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn status(
        id: &str,
        framework: &str,
        priority: Priority,
        completed: u32,
        due_offset_days: Option<i64>,
    ) -> RequirementStatus {
        let percentage = completion_percentage(completed, 4);
        RequirementStatus {
            record_id: RecordId::new(id),
            requirement_name: format!("{} requirement", framework),
            framework: Framework::new(framework),
            priority,
            status: RecordStatus::from_completion(percentage),
            completion_percentage: percentage,
            total_steps: 4,
            completed_steps: completed,
            due_date: due_offset_days.map(|d| now() + Duration::days(d)),
            completed_at: None,
            assigned_to: None,
        }
    }

    #[test]
    fn test_aggregate_steps() {
        let statuses = vec![
            status("a", "GDPR", Priority::High, 4, None),
            status("b", "SOX", Priority::Critical, 3, None),
            status("c", "ISO27001", Priority::High, 0, None),
        ];
        let progress = aggregate_steps(&statuses);
        assert_eq!(progress.total_steps, 12);
        assert_eq!(progress.completed_steps, 7);
        assert_eq!(progress.in_progress_steps, 1);
        assert_eq!(progress.pending_steps, 4);
        assert_eq!(progress.by_priority[&Priority::High].total, 8);
        assert_eq!(progress.by_priority[&Priority::Low].total, 0);
        assert_eq!(progress.by_framework[&Framework::new("SOX")].completion_rate, 75.0);
    }

    #[test]
    fn test_metrics_with_no_requirements() {
        let progress = aggregate_steps(&[]);
        let metrics = completion_metrics(&[], &progress, now());
        assert_eq!(metrics.overall_completion_rate, 0.0);
        assert_eq!(metrics.step_completion_rate, 0.0);
        assert_eq!(metrics.critical_completion_rate, 0.0);
        assert!(metrics.performance.critical_compliance_met);
        assert_eq!(metrics.risk_level, RiskLevel::High);

        let insights = insights(&metrics, &[]);
        assert!(!insights
            .key_insights
            .iter()
            .any(|i| i.contains("need prioritization")));
    }

    #[test]
    fn test_metrics_rates_and_indicators() {
        let statuses = vec![
            status("a", "GDPR", Priority::High, 4, Some(-5)),
            status("b", "SOX", Priority::Critical, 3, Some(-20)),
            status("c", "ISO27001", Priority::High, 0, Some(10)),
        ];
        let progress = aggregate_steps(&statuses);
        let metrics = completion_metrics(&statuses, &progress, now());
        assert_eq!(metrics.overall_completion_rate, 33.3);
        assert_eq!(metrics.step_completion_rate, 58.3);
        assert_eq!(metrics.critical_completion_rate, 0.0);
        // completed record "a" is past due but not overdue
        assert_eq!(metrics.requirements.overdue, 1);
        assert!(!metrics.performance.on_track);
        assert!(!metrics.performance.critical_compliance_met);
        assert_eq!(metrics.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_overdue_ordering_and_urgency() {
        let statuses = vec![
            status("a", "GDPR", Priority::High, 1, Some(-5)),
            status("b", "SOX", Priority::Critical, 1, Some(-40)),
            status("c", "ISO27001", Priority::High, 1, Some(-20)),
            status("d", "HIPAA", Priority::High, 1, Some(-20)),
            status("e", "PCI-DSS", Priority::High, 1, Some(3)),
        ];
        let items = overdue_items(&statuses, now());
        let ids: Vec<&str> = items.iter().map(|i| i.record_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d", "a"]);
        assert_eq!(items[0].urgency, Urgency::Critical);
        assert_eq!(items[1].urgency, Urgency::High);
        assert_eq!(items[3].urgency, Urgency::Medium);
    }

    #[test]
    fn test_insights_rules() {
        let statuses = vec![
            status("a", "GDPR", Priority::High, 1, Some(-5)),
            status("b", "SOX", Priority::Critical, 1, Some(-40)),
            status("c", "ISO27001", Priority::High, 1, Some(-20)),
        ];
        let progress = aggregate_steps(&statuses);
        let metrics = completion_metrics(&statuses, &progress, now());
        let overdue = overdue_items(&statuses, now());
        let result = insights(&metrics, &overdue);

        assert!(result.key_insights[0].contains("needs improvement"));
        assert!(result.key_insights[1].starts_with("3 compliance items"));
        assert!(result.key_insights[2].contains("prioritization"));
        assert_eq!(result.recommendations.len(), 2);
        assert_eq!(result.recommendations[0].priority, RecommendationPriority::High);
        assert_eq!(result.risk.risk_factors.len(), 2);
        assert_eq!(result.risk.mitigation_strategies.len(), 4);
    }

    #[test]
    fn test_status_from_record_uses_steps() {
        let req = compliance_types::ComplianceRequirement::new("1", "Data Protection Assessment", "GDPR", Priority::High);
        let record = CompanyComplianceRecord::new(compliance_types::CompanyId::new("acme"), &req, now());
        let status = RequirementStatus::from_record(&record, &[]);
        assert_eq!(status.total_steps, 0);
        assert_eq!(status.status, RecordStatus::NotStarted);
        assert_eq!(status.completion_percentage, 0.0);
    }

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(risk_for_rate(90.0), RiskLevel::Low);
        assert_eq!(risk_for_rate(70.0), RiskLevel::Medium);
        assert_eq!(risk_for_rate(69.9), RiskLevel::High);
    }
}
