//! Compliance domain types
//!
//! Companies, frameworks, requirement and step templates, and the
//! per-company records and steps that workflows create and transition.
//!
//! Statuses only move forward:
//!
//! ```text
//! record: NotStarted -> InProgress -> Completed
//! step:   Pending    -> InProgress -> Completed
//! ```
//!
//! Identifiers of records and steps are derived from their parents, so
//! the same (company, requirement, step number) always maps to the same id.

#![deny(unsafe_code)]

mod company;
mod errors;
mod evidence;
mod framework;
mod ids;
mod priority;
mod record;
mod step;

pub use company::{Company, SizeClass};
pub use errors::{ComplianceError, ComplianceResult};
pub use evidence::{
    CheckOutcome, EvidenceCheck, EvidenceSubmission, EvidenceValidationResult, ValidationStatus,
};
pub use framework::{ComplianceRequirement, Framework};
pub use ids::{CompanyId, RecordId, RequirementId, RunId, StepId};
pub use priority::{Complexity, Priority, RiskLevel};
pub use record::{completion_percentage, CompanyComplianceRecord, RecordStatus};
pub use step::{
    CompanyComplianceStep, ComplianceStepTemplate, StepCategory, StepSchedule, StepStatus,
};
