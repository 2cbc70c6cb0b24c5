//! Storage contracts
//!
//! The engine reads and writes companies, records and steps only through
//! these traits. Writes are optimistic: a put that would move a status
//! backwards is rejected with [`StorageError::Conflict`].

use async_trait::async_trait;
use compliance_types::{
    CompanyComplianceRecord, CompanyComplianceStep, Company, CompanyId, RecordId, RecordStatus,
    StepId, StepStatus,
};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-specific errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected, e.g. a status regression
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Backend unreachable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

impl StorageError {
    /// Transient failures worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connection(_) | StorageError::Query(_))
    }
}

/// Filter for record queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub company_id: Option<CompanyId>,
    pub status: Option<RecordStatus>,
}

impl RecordQuery {
    pub fn for_company(company_id: &CompanyId) -> Self {
        Self {
            company_id: Some(company_id.clone()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, record: &CompanyComplianceRecord) -> bool {
        self.company_id.as_ref().map_or(true, |c| &record.company_id == c)
            && self.status.map_or(true, |s| record.status == s)
    }
}

/// Filter for step queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepQuery {
    pub record_id: Option<RecordId>,
    pub company_id: Option<CompanyId>,
    pub status: Option<StepStatus>,
}

impl StepQuery {
    pub fn for_record(record_id: &RecordId) -> Self {
        Self {
            record_id: Some(record_id.clone()),
            ..Default::default()
        }
    }

    pub fn for_company(company_id: &CompanyId) -> Self {
        Self {
            company_id: Some(company_id.clone()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, step: &CompanyComplianceStep) -> bool {
        self.record_id.as_ref().map_or(true, |r| &step.record_id == r)
            && self.company_id.as_ref().map_or(true, |c| &step.company_id == c)
            && self.status.map_or(true, |s| step.status == s)
    }
}

/// Combined storage trait
pub trait Storage: CompanyStorage + RecordStorage + StepStorage + Send + Sync {}

impl<T> Storage for T where T: CompanyStorage + RecordStorage + StepStorage + Send + Sync {}

/// Storage for company profiles
#[async_trait]
pub trait CompanyStorage: Send + Sync {
    /// Get a company by ID
    async fn get_company(&self, id: &CompanyId) -> StorageResult<Option<Company>>;

    /// Create or update a company
    async fn put_company(&self, company: Company) -> StorageResult<()>;
}

/// Storage for compliance records
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Get a record by ID
    async fn get_record(&self, id: &RecordId) -> StorageResult<Option<CompanyComplianceRecord>>;

    /// Create or update a record; rejects status regressions
    async fn put_record(&self, record: CompanyComplianceRecord) -> StorageResult<()>;

    /// Records matching a filter, ordered by id
    async fn query_records(&self, query: &RecordQuery) -> StorageResult<Vec<CompanyComplianceRecord>>;
}

/// Storage for compliance steps
#[async_trait]
pub trait StepStorage: Send + Sync {
    /// Get a step by ID
    async fn get_step(&self, id: &StepId) -> StorageResult<Option<CompanyComplianceStep>>;

    /// Create or update a step; rejects status regressions and
    /// rewrites of completion metadata
    async fn put_step(&self, step: CompanyComplianceStep) -> StorageResult<()>;

    /// Steps matching a filter, ordered by (record, step number)
    async fn query_steps(&self, query: &StepQuery) -> StorageResult<Vec<CompanyComplianceStep>>;
}

/// Check that replacing `existing` with `next` is a forward move
pub fn check_step_write(
    existing: &CompanyComplianceStep,
    next: &CompanyComplianceStep,
) -> StorageResult<()> {
    if !existing.status.can_transition_to(next.status) {
        return Err(StorageError::Conflict(format!(
            "step {} cannot move from {} to {}",
            existing.id, existing.status, next.status
        )));
    }
    if existing.status.is_completed()
        && (existing.completed_by != next.completed_by || existing.completed_at != next.completed_at)
    {
        return Err(StorageError::Conflict(format!(
            "step {} is already completed by {}",
            existing.id,
            existing.completed_by.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(())
}

/// Check that replacing `existing` with `next` is a forward move
pub fn check_record_write(
    existing: &CompanyComplianceRecord,
    next: &CompanyComplianceRecord,
) -> StorageResult<()> {
    if !existing.status.can_transition_to(next.status) {
        return Err(StorageError::Conflict(format!(
            "record {} cannot move from {} to {}",
            existing.id, existing.status, next.status
        )));
    }
    Ok(())
}
