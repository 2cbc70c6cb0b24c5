//! Step templates and their per-company instantiations

use crate::{CompanyId, Complexity, Framework, Priority, RecordId, SizeClass, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Category ─────────────────────────────────────────────────────────

/// Kind of work a step represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCategory {
    Assessment,
    Implementation,
    Documentation,
    Testing,
    Coordination,
    Training,
    Planning,
}

impl StepCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepCategory::Assessment => "assessment",
            StepCategory::Implementation => "implementation",
            StepCategory::Documentation => "documentation",
            StepCategory::Testing => "testing",
            StepCategory::Coordination => "coordination",
            StepCategory::Training => "training",
            StepCategory::Planning => "planning",
        }
    }
}

impl std::fmt::Display for StepCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Template ─────────────────────────────────────────────────────────

/// Static step template, keyed by framework
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplianceStepTemplate {
    pub step_number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: StepCategory,
    pub complexity: Complexity,
    pub base_hours: u32,
    /// Role accountable for the step, used for priority scoring
    pub accountable_role: String,
    /// Ordered; the first entry is the primary skill
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
}

impl ComplianceStepTemplate {
    pub fn new(
        step_number: u32,
        title: impl Into<String>,
        category: StepCategory,
        complexity: Complexity,
        base_hours: u32,
    ) -> Self {
        Self {
            step_number,
            title: title.into(),
            description: String::new(),
            category,
            complexity,
            base_hours,
            accountable_role: String::new(),
            required_skills: Vec::new(),
            deliverables: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_accountable_role(mut self, role: impl Into<String>) -> Self {
        self.accountable_role = role.into();
        self
    }

    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.required_skills = skills.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_deliverables(mut self, deliverables: &[&str]) -> Self {
        self.deliverables = deliverables.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Hours adjusted for company size and step complexity, at least one
    pub fn adjusted_hours(&self, size: SizeClass) -> u32 {
        let hours = self.base_hours as f64 * size.effort_multiplier() * self.complexity.effort_multiplier();
        (hours.floor() as u32).max(1)
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Status of a single step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

impl StepStatus {
    pub fn rank(&self) -> u8 {
        match self {
            StepStatus::Pending => 0,
            StepStatus::InProgress => 1,
            StepStatus::Completed => 2,
        }
    }

    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        next.rank() >= self.rank()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "Pending"),
            StepStatus::InProgress => write!(f, "InProgress"),
            StepStatus::Completed => write!(f, "Completed"),
        }
    }
}

// ── Schedule ─────────────────────────────────────────────────────────

/// Computed timeline for one step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepSchedule {
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub duration_days: i64,
    pub buffer_days: i64,
}

// ── Company Step ─────────────────────────────────────────────────────

/// A step template instantiated for one compliance record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyComplianceStep {
    pub id: StepId,
    pub record_id: RecordId,
    pub company_id: CompanyId,
    pub framework: Framework,
    pub step_number: u32,
    pub title: String,
    pub description: String,
    pub category: StepCategory,
    pub complexity: Complexity,
    pub base_hours: u32,
    /// Hours after size and complexity adjustment
    pub estimated_hours: u32,
    pub required_skills: Vec<String>,
    pub deliverables: Vec<String>,
    pub status: StepStatus,
    pub responsible_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting_roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_fte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<StepSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CompanyComplianceStep {
    /// Instantiate a template for a record
    pub fn from_template(
        record_id: &RecordId,
        company_id: &CompanyId,
        framework: &Framework,
        template: &ComplianceStepTemplate,
        size: SizeClass,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StepId::for_step(record_id, template.step_number),
            record_id: record_id.clone(),
            company_id: company_id.clone(),
            framework: framework.clone(),
            step_number: template.step_number,
            title: template.title.clone(),
            description: template.description.clone(),
            category: template.category,
            complexity: template.complexity,
            base_hours: template.base_hours,
            estimated_hours: template.adjusted_hours(size),
            required_skills: template.required_skills.clone(),
            deliverables: template.deliverables.clone(),
            status: StepStatus::Pending,
            responsible_role: template.accountable_role.clone(),
            assigned_role: None,
            assigned_to: None,
            supporting_roles: Vec::new(),
            estimated_fte: None,
            priority: None,
            schedule: None,
            evidence_file_path: None,
            started_at: None,
            completed_by: None,
            completed_at: None,
            created_at,
        }
    }

    /// Computed priority, Medium until scored
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::Medium)
    }

    /// Primary skill (first required skill)
    pub fn primary_skill(&self) -> Option<&str> {
        self.required_skills.first().map(String::as_str)
    }

    /// Move to InProgress. Returns false when nothing changed.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            StepStatus::Pending => {
                self.status = StepStatus::InProgress;
                self.started_at = Some(now);
                true
            }
            StepStatus::InProgress | StepStatus::Completed => false,
        }
    }

    /// Mark the step completed. Returns false when it already was.
    pub fn complete(
        &mut self,
        completed_by: impl Into<String>,
        completed_at: DateTime<Utc>,
        evidence_file_path: Option<String>,
    ) -> bool {
        if self.status.is_completed() {
            return false;
        }
        self.status = StepStatus::Completed;
        self.completed_by = Some(completed_by.into());
        self.completed_at = Some(completed_at);
        if self.started_at.is_none() {
            self.started_at = Some(completed_at);
        }
        if evidence_file_path.is_some() {
            self.evidence_file_path = evidence_file_path;
        }
        true
    }
}
