//! Gates: expected business outcomes that end a run early
//!
//! A closed gate is not an error. The run terminates successfully with a
//! machine-readable reason and an `action_required` string for the caller.
//! Evaluation is pure; the workflow decides what to do with the result.

use crate::matcher::{MatchResult, MatchedRequirement};
use crate::workflows::WorkflowKind;
use compliance_types::{
    CompanyComplianceStep, CompanyId, EvidenceValidationResult, Framework, StepId, StepStatus,
};
use serde::{Deserialize, Serialize};

/// A step that must finish before another can proceed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockingStep {
    pub step_id: StepId,
    pub step_number: u32,
    pub title: String,
    pub status: StepStatus,
}

/// Why a gate closed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Gate {
    NoRequirements {
        company_id: CompanyId,
        frameworks_matched: usize,
    },
    NoStepTemplates {
        framework: Framework,
    },
    PrerequisitesNotMet {
        step_id: StepId,
        blocking_steps: Vec<BlockingStep>,
        can_proceed: bool,
    },
    EvidenceRejected {
        step_id: StepId,
        validation: EvidenceValidationResult,
        requires_revision: bool,
    },
}

impl Gate {
    pub fn message(&self) -> String {
        match self {
            Gate::NoRequirements { frameworks_matched, .. } => format!(
                "No compliance requirements apply ({} framework(s) matched)",
                frameworks_matched
            ),
            Gate::NoStepTemplates { framework } => {
                format!("No step templates defined for {}", framework)
            }
            Gate::PrerequisitesNotMet { blocking_steps, .. } => format!(
                "{} prerequisite steps must be completed first",
                blocking_steps.len()
            ),
            Gate::EvidenceRejected { .. } => "Evidence validation failed".to_string(),
        }
    }

    pub fn action_required(&self) -> String {
        match self {
            Gate::NoRequirements { .. } => {
                "Review the company industry and location profile".to_string()
            }
            Gate::NoStepTemplates { framework } => {
                format!("Add step templates for {} to the catalog", framework)
            }
            Gate::PrerequisitesNotMet { .. } => {
                "Complete prerequisite steps before proceeding".to_string()
            }
            Gate::EvidenceRejected { .. } => "Revise and resubmit evidence".to_string(),
        }
    }

    pub fn outcome(self, workflow: WorkflowKind) -> GateOutcome {
        GateOutcome {
            workflow,
            message: self.message(),
            action_required: self.action_required(),
            gate: self,
        }
    }
}

/// Terminal result of a run that stopped at a gate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub workflow: WorkflowKind,
    pub gate: Gate,
    pub message: String,
    pub action_required: String,
}

/// Result of evaluating a gate
#[derive(Clone, Debug, PartialEq)]
pub enum GateResult {
    Open,
    Closed(Gate),
}

impl GateResult {
    pub fn is_open(&self) -> bool {
        matches!(self, GateResult::Open)
    }
}

/// Evaluates workflow gates
#[derive(Clone, Debug, Default)]
pub struct GateEvaluator;

impl GateEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Closed when no requirement applies to the company
    pub fn requirements(
        &self,
        company_id: &CompanyId,
        matched: &MatchResult,
        requirements: &[MatchedRequirement],
    ) -> GateResult {
        if requirements.is_empty() {
            GateResult::Closed(Gate::NoRequirements {
                company_id: company_id.clone(),
                frameworks_matched: matched.frameworks.len(),
            })
        } else {
            GateResult::Open
        }
    }

    /// Closed when the framework has no step templates
    pub fn step_templates(&self, framework: &Framework, template_count: usize) -> GateResult {
        if template_count == 0 {
            GateResult::Closed(Gate::NoStepTemplates {
                framework: framework.clone(),
            })
        } else {
            GateResult::Open
        }
    }

    /// Closed while any lower-numbered sibling is not Completed
    pub fn prerequisites(
        &self,
        step: &CompanyComplianceStep,
        siblings: &[CompanyComplianceStep],
    ) -> GateResult {
        let mut blocking_steps: Vec<BlockingStep> = siblings
            .iter()
            .filter(|s| s.step_number < step.step_number && !s.status.is_completed())
            .map(|s| BlockingStep {
                step_id: s.id.clone(),
                step_number: s.step_number,
                title: s.title.clone(),
                status: s.status,
            })
            .collect();
        blocking_steps.sort_by_key(|b| b.step_number);

        if blocking_steps.is_empty() {
            GateResult::Open
        } else {
            GateResult::Closed(Gate::PrerequisitesNotMet {
                step_id: step.id.clone(),
                blocking_steps,
                can_proceed: false,
            })
        }
    }

    /// Closed when evidence was rejected
    pub fn evidence(&self, step_id: &StepId, validation: &EvidenceValidationResult) -> GateResult {
        if validation.is_acceptable {
            GateResult::Open
        } else {
            GateResult::Closed(Gate::EvidenceRejected {
                step_id: step_id.clone(),
                validation: validation.clone(),
                requires_revision: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use compliance_types::{
        ComplianceStepTemplate, Complexity, RecordId, SizeClass, StepCategory,
    };

    fn steps(completed: &[u32]) -> Vec<CompanyComplianceStep> {
        (1..=4)
            .map(|n| {
                let template = ComplianceStepTemplate::new(
                    n,
                    format!("Step {}", n),
                    StepCategory::Implementation,
                    Complexity::Medium,
                    8,
                );
                let mut step = CompanyComplianceStep::from_template(
                    &RecordId::new("cc-acme-1"),
                    &CompanyId::new("acme"),
                    &Framework::new("GDPR"),
                    &template,
                    SizeClass::Medium,
                    Utc::now(),
                );
                if completed.contains(&n) {
                    step.complete("alice", Utc::now(), None);
                }
                step
            })
            .collect()
    }

    #[test]
    fn test_prerequisites_block_on_incomplete_step() {
        let all = steps(&[1]);
        let result = GateEvaluator::new().prerequisites(&all[2], &all);
        let GateResult::Closed(gate) = result else {
            panic!("expected closed gate");
        };
        match &gate {
            Gate::PrerequisitesNotMet {
                blocking_steps,
                can_proceed,
                ..
            } => {
                assert!(!can_proceed);
                assert_eq!(blocking_steps.len(), 1);
                assert_eq!(blocking_steps[0].step_number, 2);
            }
            other => panic!("unexpected gate {:?}", other),
        }
        assert_eq!(gate.message(), "1 prerequisite steps must be completed first");
        assert_eq!(
            gate.action_required(),
            "Complete prerequisite steps before proceeding"
        );
    }

    #[test]
    fn test_first_step_has_no_prerequisites() {
        let all = steps(&[]);
        assert!(GateEvaluator::new().prerequisites(&all[0], &all).is_open());
        let done = steps(&[1, 2, 3]);
        assert!(GateEvaluator::new().prerequisites(&done[3], &done).is_open());
    }

    #[test]
    fn test_gate_serializes_with_reason_tag() {
        let gate = Gate::NoStepTemplates {
            framework: Framework::new("FERPA"),
        };
        let json = serde_json::to_value(gate.outcome(WorkflowKind::StepGeneration)).unwrap();
        assert_eq!(json["gate"]["reason"], "no_step_templates");
        assert_eq!(json["workflow"], "step_generation");
        assert_eq!(json["action_required"], "Add step templates for FERPA to the catalog");
    }
}
