//! In-memory storage implementation

use super::storage::*;
use async_trait::async_trait;
use compliance_types::{
    CompanyComplianceRecord, CompanyComplianceStep, Company, CompanyId, RecordId, StepId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for development and testing
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    companies: Arc<RwLock<HashMap<CompanyId, Company>>>,
    records: Arc<RwLock<HashMap<RecordId, CompanyComplianceRecord>>>,
    steps: Arc<RwLock<HashMap<StepId, CompanyComplianceStep>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self {
            companies: Arc::new(RwLock::new(HashMap::new())),
            records: Arc::new(RwLock::new(HashMap::new())),
            steps: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed a company profile
    pub async fn with_company(self, company: Company) -> Self {
        self.companies.write().await.insert(company.id.clone(), company);
        self
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn step_count(&self) -> usize {
        self.steps.read().await.len()
    }
}

#[async_trait]
impl CompanyStorage for InMemoryStorage {
    async fn get_company(&self, id: &CompanyId) -> StorageResult<Option<Company>> {
        let companies = self.companies.read().await;
        Ok(companies.get(id).cloned())
    }

    async fn put_company(&self, company: Company) -> StorageResult<()> {
        let mut companies = self.companies.write().await;
        companies.insert(company.id.clone(), company);
        Ok(())
    }
}

#[async_trait]
impl RecordStorage for InMemoryStorage {
    async fn get_record(&self, id: &RecordId) -> StorageResult<Option<CompanyComplianceRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn put_record(&self, record: CompanyComplianceRecord) -> StorageResult<()> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.id) {
            check_record_write(existing, &record)?;
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn query_records(&self, query: &RecordQuery) -> StorageResult<Vec<CompanyComplianceRecord>> {
        let records = self.records.read().await;
        let mut matched: Vec<CompanyComplianceRecord> =
            records.values().filter(|r| query.matches(r)).cloned().collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }
}

#[async_trait]
impl StepStorage for InMemoryStorage {
    async fn get_step(&self, id: &StepId) -> StorageResult<Option<CompanyComplianceStep>> {
        let steps = self.steps.read().await;
        Ok(steps.get(id).cloned())
    }

    async fn put_step(&self, step: CompanyComplianceStep) -> StorageResult<()> {
        let mut steps = self.steps.write().await;
        if let Some(existing) = steps.get(&step.id) {
            check_step_write(existing, &step)?;
        }
        steps.insert(step.id.clone(), step);
        Ok(())
    }

    async fn query_steps(&self, query: &StepQuery) -> StorageResult<Vec<CompanyComplianceStep>> {
        let steps = self.steps.read().await;
        let mut matched: Vec<CompanyComplianceStep> =
            steps.values().filter(|s| query.matches(s)).cloned().collect();
        matched.sort_by(|a, b| {
            a.record_id
                .cmp(&b.record_id)
                .then(a.step_number.cmp(&b.step_number))
        });
        Ok(matched)
    }
}
