//! Compliance matching: company profile to applicable frameworks
//!
//! Matching is a pure function of the company and the injected catalog.
//! An unrecognized profile yields an empty result rather than an error.

use crate::catalog::ComplianceCatalog;
use compliance_types::{Company, ComplianceRequirement, Framework, Priority, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of matching one company
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub frameworks: BTreeSet<Framework>,
    pub mandatory: Vec<Framework>,
    pub recommended: Vec<Framework>,
    /// Industry table key that matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_key: Option<String>,
    /// Location table key that matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_key: Option<String>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub confidence: f64,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
    }
}

/// A requirement template selected for a company, adjusted for its risk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedRequirement {
    pub requirement: ComplianceRequirement,
    pub priority_boost: u8,
    pub adjusted_duration_days: u32,
}

/// Risk assessment over a set of matched requirements
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub severity_score: u32,
    pub total_effort_days: u32,
    pub risk_factors: Vec<String>,
    pub mitigation_recommendations: Vec<String>,
}

/// Maps companies onto frameworks and requirements
#[derive(Clone, Debug)]
pub struct ComplianceMatcher {
    catalog: Arc<ComplianceCatalog>,
}

impl ComplianceMatcher {
    pub fn new(catalog: Arc<ComplianceCatalog>) -> Self {
        Self { catalog }
    }

    /// Match a company against the industry and location tables
    pub fn match_company(&self, company: &Company) -> MatchResult {
        let industry = company.normalized_industry();
        let location = company.normalized_location();

        let industry_entry = self.catalog.lookup_industry(&industry);
        let location_entry = self.catalog.lookup_location(&location);

        let frameworks: BTreeSet<Framework> = industry_entry
            .into_iter()
            .chain(location_entry)
            .flat_map(|entry| entry.frameworks.iter().cloned())
            .collect();

        let (mandatory, recommended): (Vec<Framework>, Vec<Framework>) = frameworks
            .iter()
            .cloned()
            .partition(|f| self.catalog.is_mandatory(f));

        let mut risk_score = if industry_entry.is_some() {
            self.catalog.industry_risk_score(&industry)
        } else {
            0
        };
        if mandatory.len() > 2 {
            risk_score += 2;
        }

        let mut confidence = 0.5;
        if industry_entry.is_some() {
            confidence += 0.3;
        }
        if location_entry.is_some() {
            confidence += 0.2;
        }

        tracing::debug!(
            company_id = %company.id,
            frameworks = frameworks.len(),
            mandatory = mandatory.len(),
            risk_score,
            "Company matched"
        );

        MatchResult {
            frameworks,
            mandatory,
            recommended,
            industry_key: industry_entry.map(|e| e.key.clone()),
            location_key: location_entry.map(|e| e.key.clone()),
            risk_score,
            risk_level: risk_level_for_score(risk_score),
            confidence: round2(confidence),
        }
    }

    /// Requirement templates applicable to a match, in catalog order
    pub fn find_requirements(&self, matched: &MatchResult) -> Vec<MatchedRequirement> {
        let (boost, factor) = match matched.risk_level {
            RiskLevel::Critical => (2, 0.8),
            RiskLevel::High => (1, 0.9),
            RiskLevel::Medium | RiskLevel::Low => (0, 1.0),
        };

        self.catalog
            .requirements
            .iter()
            .filter(|req| matched.frameworks.iter().any(|f| req.framework.is(f.as_str())))
            .map(|req| {
                let adjusted = (req.estimated_duration_days as f64 * factor).floor() as u32;
                MatchedRequirement {
                    requirement: req.clone(),
                    priority_boost: boost,
                    adjusted_duration_days: adjusted.max(1),
                }
            })
            .collect()
    }
}

/// Assess the combined risk of a requirement set
pub fn assess_risk(requirements: &[MatchedRequirement]) -> RiskAssessment {
    let severity_score: u32 = requirements
        .iter()
        .map(|r| r.requirement.severity.severity_weight())
        .sum();
    let total_effort_days: u32 = requirements.iter().map(|r| r.adjusted_duration_days).sum();
    let critical_count = requirements
        .iter()
        .filter(|r| r.requirement.severity == Priority::Critical)
        .count();

    let risk_level = match severity_score {
        s if s >= 12 => RiskLevel::Critical,
        s if s >= 8 => RiskLevel::High,
        s if s >= 4 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    };

    let mut risk_factors = Vec::new();
    if requirements.len() > 3 {
        risk_factors.push(format!(
            "High number of compliance requirements ({})",
            requirements.len()
        ));
    }
    if total_effort_days > 180 {
        risk_factors.push(format!(
            "Significant implementation effort required ({} days)",
            total_effort_days
        ));
    }
    if critical_count > 1 {
        risk_factors.push(format!(
            "Multiple critical requirements ({})",
            critical_count
        ));
    }

    let mut mitigation_recommendations = Vec::new();
    if matches!(risk_level, RiskLevel::High | RiskLevel::Critical) {
        mitigation_recommendations.push("Assign a dedicated compliance lead".to_string());
        mitigation_recommendations.push("Prioritize critical requirements first".to_string());
        mitigation_recommendations.push("Engage external compliance advisors".to_string());
    }
    if total_effort_days > 120 {
        mitigation_recommendations.push("Adopt a phased implementation plan".to_string());
    }

    RiskAssessment {
        risk_level,
        severity_score,
        total_effort_days,
        risk_factors,
        mitigation_recommendations,
    }
}

fn risk_level_for_score(score: u32) -> RiskLevel {
    match score {
        s if s >= 5 => RiskLevel::Critical,
        s if s >= 3 => RiskLevel::High,
        s if s >= 1 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
