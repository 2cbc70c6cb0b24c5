//! Company compliance records: one requirement tracked for one company

use crate::{
    CompanyId, ComplianceError, ComplianceRequirement, ComplianceResult, Framework, Priority,
    RecordId, RequirementId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a compliance record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl RecordStatus {
    /// Position in the forward-only lifecycle
    pub fn rank(&self) -> u8 {
        match self {
            RecordStatus::NotStarted => 0,
            RecordStatus::InProgress => 1,
            RecordStatus::Completed => 2,
        }
    }

    /// Status implied by a completion percentage
    pub fn from_completion(percentage: f64) -> Self {
        if percentage >= 100.0 {
            RecordStatus::Completed
        } else if percentage > 0.0 {
            RecordStatus::InProgress
        } else {
            RecordStatus::NotStarted
        }
    }

    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        next.rank() >= self.rank()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RecordStatus::Completed)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::NotStarted => write!(f, "NotStarted"),
            RecordStatus::InProgress => write!(f, "InProgress"),
            RecordStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// A (company, requirement) pair with its progress
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyComplianceRecord {
    pub id: RecordId,
    pub company_id: CompanyId,
    pub requirement_id: RequirementId,
    pub requirement_name: String,
    pub framework: Framework,
    pub priority: Priority,
    pub mandatory: bool,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_to_complete: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub completion_percentage: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CompanyComplianceRecord {
    /// Create a NotStarted record for a requirement
    pub fn new(
        company_id: CompanyId,
        requirement: &ComplianceRequirement,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::for_pair(&company_id, &requirement.id),
            company_id,
            requirement_id: requirement.id.clone(),
            requirement_name: requirement.name.clone(),
            framework: requirement.framework.clone(),
            priority: requirement.severity,
            mandatory: requirement.mandatory,
            status: RecordStatus::NotStarted,
            due_date: None,
            days_to_complete: None,
            assigned_to: None,
            total_steps: 0,
            completed_steps: 0,
            completion_percentage: 0.0,
            created_at,
            completed_at: None,
        }
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to = Some(assignee.into());
        self
    }

    /// Recompute progress from step counts.
    ///
    /// Fails when the recomputed status would move the record backwards.
    pub fn apply_progress(
        &mut self,
        completed_steps: u32,
        total_steps: u32,
        now: DateTime<Utc>,
    ) -> ComplianceResult<()> {
        let percentage = completion_percentage(completed_steps, total_steps);
        let status = RecordStatus::from_completion(percentage);
        if !self.status.can_transition_to(status) {
            return Err(ComplianceError::InvalidTransition {
                entity: self.id.to_string(),
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        if status.is_completed() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.completed_steps = completed_steps;
        self.total_steps = total_steps;
        self.completion_percentage = percentage;
        self.status = status;
        Ok(())
    }

    /// Overdue relative to `now` and not yet completed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now && !self.status.is_completed(),
            None => false,
        }
    }
}

/// Percentage of completed steps, 0 when there are none
pub fn completion_percentage(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = completed as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> CompanyComplianceRecord {
        let req = ComplianceRequirement::new("gdpr-1", "Data Protection Assessment", "GDPR", Priority::High)
            .mandatory();
        CompanyComplianceRecord::new(CompanyId::new("acme"), &req, Utc::now())
    }

    #[test]
    fn test_new_record_defaults() {
        let rec = record();
        assert_eq!(rec.status, RecordStatus::NotStarted);
        assert_eq!(rec.priority, Priority::High);
        assert_eq!(rec.id.as_str(), "cc-acme-gdpr-1");
    }

    #[test]
    fn test_progress_statuses() {
        let mut rec = record();
        let now = Utc::now();
        rec.apply_progress(0, 4, now).unwrap();
        assert_eq!(rec.status, RecordStatus::NotStarted);
        rec.apply_progress(1, 4, now).unwrap();
        assert_eq!(rec.status, RecordStatus::InProgress);
        assert_eq!(rec.completion_percentage, 25.0);
        rec.apply_progress(4, 4, now).unwrap();
        assert_eq!(rec.status, RecordStatus::Completed);
        assert_eq!(rec.completion_percentage, 100.0);
        assert_eq!(rec.completed_at, Some(now));
    }

    #[test]
    fn test_progress_rejects_regression() {
        let mut rec = record();
        let now = Utc::now();
        rec.apply_progress(4, 4, now).unwrap();
        let err = rec.apply_progress(2, 4, now).unwrap_err();
        assert!(matches!(err, ComplianceError::InvalidTransition { .. }));
        assert_eq!(rec.status, RecordStatus::Completed);
    }

    #[test]
    fn test_overdue() {
        let mut rec = record();
        let now = Utc::now();
        rec.due_date = Some(now - Duration::days(3));
        assert!(rec.is_overdue(now));
        rec.apply_progress(1, 1, now).unwrap();
        assert!(!rec.is_overdue(now));
    }

    #[test]
    fn test_completion_percentage_guards_zero() {
        assert_eq!(completion_percentage(0, 0), 0.0);
        assert_eq!(completion_percentage(1, 3), 33.33);
    }
}
