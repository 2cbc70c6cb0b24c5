//! Rule-based evidence validation
//!
//! Every check is a pure function of the step and the submission, so the
//! same evidence always gets the same verdict.

use crate::config::EvidenceConfig;
use compliance_types::{
    CheckOutcome, CompanyComplianceStep, EvidenceCheck, EvidenceSubmission,
    EvidenceValidationResult, ValidationStatus,
};

const WARNING_PENALTY: u8 = 15;
const FAILURE_PENALTY: u8 = 40;

/// Validates evidence submitted for a step
pub trait EvidenceValidator: Send + Sync {
    fn validate(
        &self,
        step: &CompanyComplianceStep,
        evidence: &EvidenceSubmission,
    ) -> EvidenceValidationResult;
}

/// Deterministic validator driven by [`EvidenceConfig`]
#[derive(Clone, Debug, Default)]
pub struct RuleBasedEvidenceValidator {
    config: EvidenceConfig,
}

impl RuleBasedEvidenceValidator {
    pub fn new(config: EvidenceConfig) -> Self {
        Self { config }
    }

    fn check_format(&self, evidence: &EvidenceSubmission) -> EvidenceCheck {
        match evidence.extension() {
            Some(ext) if self.config.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => {
                EvidenceCheck::new("file_format", CheckOutcome::Passed, format!("Accepted .{} file", ext))
            }
            Some(ext) => EvidenceCheck::new(
                "file_format",
                CheckOutcome::Failed,
                format!("File type .{} is not accepted", ext),
            ),
            None => EvidenceCheck::new(
                "file_format",
                CheckOutcome::Failed,
                "File has no recognizable extension",
            ),
        }
    }

    fn check_size(&self, evidence: &EvidenceSubmission) -> EvidenceCheck {
        match evidence.size_bytes {
            None => EvidenceCheck::new("file_size", CheckOutcome::Warning, "File size not reported"),
            Some(0) => EvidenceCheck::new("file_size", CheckOutcome::Failed, "File is empty"),
            Some(size) if size > self.config.max_file_size_bytes => EvidenceCheck::new(
                "file_size",
                CheckOutcome::Failed,
                format!(
                    "File is {} bytes, limit is {}",
                    size, self.config.max_file_size_bytes
                ),
            ),
            Some(size) => {
                EvidenceCheck::new("file_size", CheckOutcome::Passed, format!("{} bytes", size))
            }
        }
    }

    fn check_completeness(
        &self,
        step: &CompanyComplianceStep,
        evidence: &EvidenceSubmission,
    ) -> EvidenceCheck {
        let expected = step.deliverables.len();
        if expected == 0 {
            return EvidenceCheck::new(
                "content_completeness",
                CheckOutcome::Passed,
                "Step defines no deliverables",
            );
        }

        let covered = step
            .deliverables
            .iter()
            .filter(|d| {
                evidence
                    .covered_deliverables
                    .iter()
                    .any(|c| c.trim().eq_ignore_ascii_case(d.trim()))
            })
            .count();
        let message = format!("{} of {} deliverables covered", covered, expected);

        let outcome = if covered == expected {
            CheckOutcome::Passed
        } else if covered * 2 >= expected {
            CheckOutcome::Warning
        } else {
            CheckOutcome::Failed
        };
        EvidenceCheck::new("content_completeness", outcome, message)
    }

    fn check_alignment(
        &self,
        step: &CompanyComplianceStep,
        evidence: &EvidenceSubmission,
    ) -> EvidenceCheck {
        let framework = step.framework.as_str().to_lowercase();
        if evidence.file_path.to_lowercase().contains(&framework) {
            EvidenceCheck::new(
                "compliance_alignment",
                CheckOutcome::Passed,
                format!("Evidence is filed under {}", step.framework),
            )
        } else {
            EvidenceCheck::new(
                "compliance_alignment",
                CheckOutcome::Warning,
                format!("Evidence path does not reference {}", step.framework),
            )
        }
    }
}

impl EvidenceValidator for RuleBasedEvidenceValidator {
    fn validate(
        &self,
        step: &CompanyComplianceStep,
        evidence: &EvidenceSubmission,
    ) -> EvidenceValidationResult {
        let checks = vec![
            self.check_format(evidence),
            self.check_size(evidence),
            self.check_completeness(step, evidence),
            self.check_alignment(step, evidence),
        ];

        let score = checks.iter().fold(100u8, |score, check| match check.outcome {
            CheckOutcome::Passed => score,
            CheckOutcome::Warning => score.saturating_sub(WARNING_PENALTY),
            CheckOutcome::Failed => score.saturating_sub(FAILURE_PENALTY),
        });

        let mut rejection_reasons: Vec<String> = checks
            .iter()
            .filter(|c| c.outcome == CheckOutcome::Failed)
            .map(|c| c.message.clone())
            .collect();
        if rejection_reasons.is_empty() && score < self.config.min_score {
            rejection_reasons.push(format!(
                "Score {} is below the minimum of {}",
                score, self.config.min_score
            ));
        }

        let recommendations: Vec<String> = checks
            .iter()
            .filter(|c| c.outcome == CheckOutcome::Warning)
            .map(|c| match c.name.as_str() {
                "file_size" => "Include the file size with the submission".to_string(),
                "content_completeness" => {
                    "Cover every deliverable listed for the step".to_string()
                }
                "compliance_alignment" => {
                    format!("File evidence under a {} folder", step.framework)
                }
                _ => c.message.clone(),
            })
            .collect();

        let valid = rejection_reasons.is_empty();
        tracing::debug!(
            step_id = %step.id,
            score,
            valid,
            "Evidence validated"
        );

        EvidenceValidationResult {
            validation_status: if valid {
                ValidationStatus::Valid
            } else {
                ValidationStatus::Invalid
            },
            score,
            checks,
            is_acceptable: valid,
            requires_revision: !valid,
            rejection_reasons,
            recommendations,
        }
    }
}
