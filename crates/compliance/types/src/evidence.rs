//! Evidence submissions and their validation results

use serde::{Deserialize, Serialize};

/// Evidence supplied when completing a step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvidenceSubmission {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Step deliverables this evidence claims to cover
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covered_deliverables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl EvidenceSubmission {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            size_bytes: None,
            covered_deliverables: Vec::new(),
            notes: None,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn covering(mut self, deliverables: &[&str]) -> Self {
        self.covered_deliverables = deliverables.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Lowercased file extension, if any
    pub fn extension(&self) -> Option<String> {
        let name = self.file_path.rsplit(['/', '\\']).next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Outcome of a single named check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Passed,
    Warning,
    Failed,
}

/// One named evidence check
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCheck {
    pub name: String,
    pub outcome: CheckOutcome,
    pub message: String,
}

impl EvidenceCheck {
    pub fn new(name: impl Into<String>, outcome: CheckOutcome, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

/// Result of validating one evidence submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceValidationResult {
    pub validation_status: ValidationStatus,
    /// 0..=100
    pub score: u8,
    pub checks: Vec<EvidenceCheck>,
    pub is_acceptable: bool,
    pub requires_revision: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejection_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl EvidenceValidationResult {
    pub fn is_valid(&self) -> bool {
        self.validation_status == ValidationStatus::Valid
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &EvidenceCheck> {
        self.checks.iter().filter(|c| c.outcome == CheckOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(EvidenceSubmission::new("docs/Report.PDF").extension(), Some("pdf".into()));
        assert_eq!(EvidenceSubmission::new("C:\\evidence\\a.xlsx").extension(), Some("xlsx".into()));
        assert_eq!(EvidenceSubmission::new("noext").extension(), None);
        assert_eq!(EvidenceSubmission::new(".hidden").extension(), None);
        assert_eq!(EvidenceSubmission::new("trailing.").extension(), None);
    }

    #[test]
    fn test_submission_rejects_unknown_fields() {
        let json = r#"{"file_path":"a.pdf","approved":true}"#;
        assert!(serde_json::from_str::<EvidenceSubmission>(json).is_err());
    }
}
