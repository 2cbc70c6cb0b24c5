//! Identifiers for compliance entities
//!
//! Record and step identifiers are derived from their parents so that
//! re-running an activity addresses the same storage row.

use serde::{Deserialize, Serialize};

// ── Company Identifier ───────────────────────────────────────────────

/// Identifier of a company (created outside the engine)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompanyId(pub String);

impl CompanyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Requirement Identifier ───────────────────────────────────────────

/// Identifier of a static requirement template
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequirementId(pub String);

impl RequirementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequirementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Record Identifier ────────────────────────────────────────────────

/// Identifier of a company compliance record
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The record for a (company, requirement) pair always has the same id.
    pub fn for_pair(company_id: &CompanyId, requirement_id: &RequirementId) -> Self {
        Self(format!("cc-{}-{}", company_id, requirement_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Step Identifier ──────────────────────────────────────────────────

/// Identifier of a company compliance step
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_step(record_id: &RecordId, step_number: u32) -> Self {
        Self(format!("{}-step-{}", record_id, step_number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Run Identifier ───────────────────────────────────────────────────

/// Identifier of one workflow run
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_stable_for_pair() {
        let company = CompanyId::new("acme");
        let requirement = RequirementId::new("gdpr-1");
        assert_eq!(
            RecordId::for_pair(&company, &requirement),
            RecordId::for_pair(&company, &requirement)
        );
        assert_eq!(RecordId::for_pair(&company, &requirement).as_str(), "cc-acme-gdpr-1");
    }

    #[test]
    fn test_step_id_embeds_step_number() {
        let record = RecordId::new("cc-acme-gdpr-1");
        assert_eq!(StepId::for_step(&record, 3).as_str(), "cc-acme-gdpr-1-step-3");
    }

    #[test]
    fn test_run_id_short() {
        let id = RunId::generate();
        assert_eq!(id.short().len(), 8);
        assert_eq!(RunId::new("abc").short(), "abc");
    }
}
