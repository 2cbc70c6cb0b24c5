//! Compliance workflow engine
//!
//! Matches companies to regulatory frameworks, turns requirements into
//! scheduled and assigned steps, tracks their completion with evidence,
//! and reports progress. The four workflows run as durable sequences of
//! named activities:
//!
//! ```text
//! company_onboarding    analyze → requirements → [gate] → records → due dates → notify
//! step_generation       templates → [gate] → instantiate → prioritize → assign → schedule → persist
//! step_completion       prerequisites → [gate] → execute → [evidence → gate] → complete → progress → check → report?
//! compliance_reporting  profile → status → steps → metrics → overdue → insights → format → distribute
//! ```
//!
//! Every activity output is checkpointed, so a resumed run replays what
//! already happened and continues at the first unfinished activity.
//! Collaborators (storage, notification, report distribution) sit behind
//! traits and every call to them is bounded by a timeout.

#![deny(unsafe_code)]

pub mod activity;
pub mod assignment;
pub mod catalog;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod evidence;
pub mod gate;
pub mod matcher;
pub mod planner;
pub mod priority;
pub mod progress;
pub mod provenance;
pub mod report;
pub mod run;
pub mod runtime;
pub mod scheduler;
pub mod workflows;

pub use activity::{Activity, ActivityEnv};
pub use catalog::{CatalogError, ComplianceCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    Channel, DeliveryStatus, DistributionRecord, DistributionStatus, InMemoryNotifier,
    InMemoryStorage, Notification, Notifier, NotifierPublisher, NotifyError, ReportPublisher,
    Storage, StorageError,
};
pub use config::EngineConfig;
pub use error::{
    ActivityError, CollaboratorError, EngineError, EngineResult, ErrorKind, RunFailure,
};
pub use evidence::{EvidenceValidator, RuleBasedEvidenceValidator};
pub use gate::{Gate, GateEvaluator, GateOutcome, GateResult};
pub use matcher::{ComplianceMatcher, MatchResult, MatchedRequirement, RiskAssessment};
pub use planner::{PlanRequest, RequirementPlan, RequirementPlanner};
pub use priority::{PriorityCalculator, PriorityScore};
pub use progress::{CompletionMetrics, Insights, OverdueItem, RequirementStatus, StepProgress};
pub use provenance::{ProvenanceEventType, ProvenanceRecord};
pub use report::{ComplianceReport, CompletionReport, ReportType};
pub use run::{
    Checkpoint, CheckpointError, CheckpointStore, MemoryCheckpointStore, RunResult, RunSnapshot,
    RunStatus,
};
pub use runtime::WorkflowRuntime;
pub use workflows::{
    CompanyOnboardingInput, CompanyOnboardingOutput, ComplianceReportingInput,
    ComplianceReportingOutput, StepCompletionInput, StepCompletionOutput, StepGenerationInput,
    StepGenerationOutput, WorkflowInput, WorkflowKind, WorkflowOutput, EVIDENCE_SUBMITTED,
};
