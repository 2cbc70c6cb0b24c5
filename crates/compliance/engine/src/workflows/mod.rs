//! The four compliance workflows
//!
//! Each workflow is a finite sequence of named activities driven through a
//! [`RunContext`]. Inputs and outputs are tagged records; inputs reject
//! unknown fields at the boundary.

pub mod onboarding;
pub mod reporting;
pub mod step_completion;
pub mod step_generation;

pub use onboarding::{CompanyOnboardingInput, CompanyOnboardingOutput};
pub use reporting::{ComplianceReportingInput, ComplianceReportingOutput};
pub use step_completion::{StepCompletionInput, StepCompletionOutput};
pub use step_generation::{StepGenerationInput, StepGenerationOutput};

use crate::context::{Outcome, RunAbort, RunContext};
use crate::error::EngineError;
use crate::gate::GateOutcome;
use serde::{Deserialize, Serialize};

/// Name of the event that carries evidence into a step completion run
pub const EVIDENCE_SUBMITTED: &str = "evidence_submitted";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    CompanyOnboarding,
    StepGeneration,
    StepCompletion,
    ComplianceReporting,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 4] = [
        WorkflowKind::CompanyOnboarding,
        WorkflowKind::StepGeneration,
        WorkflowKind::StepCompletion,
        WorkflowKind::ComplianceReporting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::CompanyOnboarding => "company_onboarding",
            WorkflowKind::StepGeneration => "step_generation",
            WorkflowKind::StepCompletion => "step_completion",
            WorkflowKind::ComplianceReporting => "compliance_reporting",
        }
    }

    /// Resolve a workflow name; the `_workflow` suffix is accepted
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_suffix("_workflow").unwrap_or(name);
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Events a run of this workflow can receive
    pub fn accepted_events(&self) -> &'static [&'static str] {
        match self {
            WorkflowKind::StepCompletion => &[EVIDENCE_SUBMITTED],
            _ => &[],
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of a run, tagged with its workflow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "workflow", content = "input", rename_all = "snake_case")]
pub enum WorkflowInput {
    CompanyOnboarding(CompanyOnboardingInput),
    StepGeneration(StepGenerationInput),
    StepCompletion(StepCompletionInput),
    ComplianceReporting(ComplianceReportingInput),
}

impl WorkflowInput {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowInput::CompanyOnboarding(_) => WorkflowKind::CompanyOnboarding,
            WorkflowInput::StepGeneration(_) => WorkflowKind::StepGeneration,
            WorkflowInput::StepCompletion(_) => WorkflowKind::StepCompletion,
            WorkflowInput::ComplianceReporting(_) => WorkflowKind::ComplianceReporting,
        }
    }

    /// Parse the input for a workflow given by name
    pub fn from_named(name: &str, input: serde_json::Value) -> Result<Self, EngineError> {
        let kind =
            WorkflowKind::from_name(name).ok_or_else(|| EngineError::UnknownWorkflow(name.to_string()))?;
        let invalid = |e: serde_json::Error| EngineError::InvalidInput(format!("{}: {}", kind, e));
        Ok(match kind {
            WorkflowKind::CompanyOnboarding => {
                WorkflowInput::CompanyOnboarding(serde_json::from_value(input).map_err(invalid)?)
            }
            WorkflowKind::StepGeneration => {
                WorkflowInput::StepGeneration(serde_json::from_value(input).map_err(invalid)?)
            }
            WorkflowKind::StepCompletion => {
                WorkflowInput::StepCompletion(serde_json::from_value(input).map_err(invalid)?)
            }
            WorkflowKind::ComplianceReporting => {
                WorkflowInput::ComplianceReporting(serde_json::from_value(input).map_err(invalid)?)
            }
        })
    }
}

/// Successful output of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowOutput {
    CompanyOnboarding(CompanyOnboardingOutput),
    StepGeneration(StepGenerationOutput),
    StepCompletion(StepCompletionOutput),
    ComplianceReporting(ComplianceReportingOutput),
    /// Stopped at a gate
    Gated(GateOutcome),
}

impl WorkflowOutput {
    pub fn gate(&self) -> Option<&GateOutcome> {
        match self {
            WorkflowOutput::Gated(outcome) => Some(outcome),
            _ => None,
        }
    }
}

fn finish<T>(outcome: Outcome<T>, wrap: impl FnOnce(T) -> WorkflowOutput) -> WorkflowOutput {
    match outcome {
        Outcome::Completed(output) => wrap(output),
        Outcome::Gated(gate) => WorkflowOutput::Gated(gate),
    }
}

/// Run the workflow selected by the input
pub(crate) async fn drive(ctx: &mut RunContext, input: &WorkflowInput) -> Result<WorkflowOutput, RunAbort> {
    let output = match input {
        WorkflowInput::CompanyOnboarding(input) => {
            finish(onboarding::run(ctx, input).await?, WorkflowOutput::CompanyOnboarding)
        }
        WorkflowInput::StepGeneration(input) => {
            finish(step_generation::run(ctx, input).await?, WorkflowOutput::StepGeneration)
        }
        WorkflowInput::StepCompletion(input) => {
            finish(step_completion::run(ctx, input).await?, WorkflowOutput::StepCompletion)
        }
        WorkflowInput::ComplianceReporting(input) => {
            finish(reporting::run(ctx, input).await?, WorkflowOutput::ComplianceReporting)
        }
    };
    if let Some(gate) = output.gate() {
        ctx.gate_closed(gate).await;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_workflow_names() {
        assert_eq!(WorkflowKind::from_name("step_generation"), Some(WorkflowKind::StepGeneration));
        assert_eq!(
            WorkflowKind::from_name("compliance_reporting_workflow"),
            Some(WorkflowKind::ComplianceReporting)
        );
        assert_eq!(WorkflowKind::from_name("payroll"), None);
    }

    #[test]
    fn test_from_named_rejects_unknown_workflow_and_fields() {
        let err = WorkflowInput::from_named("payroll", json!({})).unwrap_err();
        assert!(matches!(err, EngineError::UnknownWorkflow(_)));

        let err = WorkflowInput::from_named(
            "company_onboarding",
            json!({"company_id": "acme", "force": true}),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let input =
            WorkflowInput::from_named("company_onboarding", json!({"company_id": "acme"})).unwrap();
        assert_eq!(input.kind(), WorkflowKind::CompanyOnboarding);
    }

    #[test]
    fn test_tagged_input_shape() {
        let input = WorkflowInput::from_named("step_generation", json!({"record_id": "cc-acme-1"})).unwrap();
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["workflow"], "step_generation");
        assert_eq!(json["input"]["record_id"], "cc-acme-1");
    }

    #[test]
    fn test_only_step_completion_accepts_evidence() {
        assert_eq!(WorkflowKind::StepCompletion.accepted_events(), &[EVIDENCE_SUBMITTED]);
        assert!(WorkflowKind::CompanyOnboarding.accepted_events().is_empty());
    }
}
