//! Resource assignment: skills to roles to people

use crate::catalog::ComplianceCatalog;
use compliance_types::CompanyComplianceStep;
use serde::{Deserialize, Serialize};

/// Hours in a working week, used for FTE estimates
const WEEK_HOURS: f64 = 40.0;
/// Weeks a step's effort is spread over
const SPREAD_WEEKS: f64 = 4.0;

/// Who does a step and who helps
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub assigned_role: String,
    pub assigned_to: String,
    pub supporting_roles: Vec<String>,
    pub estimated_fte: f64,
}

/// Resolve the assignment for a step.
///
/// The primary skill picks the role (default role when unmapped or when
/// the step lists no skills). Remaining skills contribute their mapped
/// roles as supporting roles, deduplicated and excluding the primary.
pub fn assign(catalog: &ComplianceCatalog, required_skills: &[String], hours: u32) -> Assignment {
    let assigned_role = required_skills
        .first()
        .map(|skill| catalog.role_for_skill(skill))
        .unwrap_or(catalog.default_role.as_str())
        .to_string();

    let mut supporting_roles: Vec<String> = Vec::new();
    for skill in required_skills.iter().skip(1) {
        if let Some(role) = catalog.mapped_role(skill) {
            if role != assigned_role && !supporting_roles.iter().any(|r| r == role) {
                supporting_roles.push(role.to_string());
            }
        }
    }

    Assignment {
        assigned_to: catalog.person_for_role(&assigned_role).to_string(),
        assigned_role,
        supporting_roles,
        estimated_fte: estimated_fte(hours),
    }
}

/// Apply [`assign`] to a step in place
pub fn assign_step(catalog: &ComplianceCatalog, step: &mut CompanyComplianceStep) {
    let assignment = assign(catalog, &step.required_skills, step.estimated_hours);
    step.assigned_role = Some(assignment.assigned_role);
    step.assigned_to = Some(assignment.assigned_to);
    step.supporting_roles = assignment.supporting_roles;
    step.estimated_fte = Some(assignment.estimated_fte);
}

/// FTE needed to finish `hours` over four weeks, rounded to 2 decimals
pub fn estimated_fte(hours: u32) -> f64 {
    let fte = hours as f64 / WEEK_HOURS / SPREAD_WEEKS;
    (fte * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_primary_skill_picks_role_and_person() {
        let catalog = ComplianceCatalog::builtin();
        let a = assign(&catalog, &skills(&["security_analysis", "risk_assessment"]), 32);
        assert_eq!(a.assigned_role, "Security Analyst");
        assert_eq!(a.assigned_to, "security.analyst@company.com");
        assert_eq!(a.supporting_roles, vec!["Risk Manager".to_string()]);
        assert_eq!(a.estimated_fte, 0.2);
    }

    #[test]
    fn test_unmapped_skills_fall_back() {
        let catalog = ComplianceCatalog::builtin();
        let a = assign(&catalog, &skills(&["basket_weaving", "juggling"]), 10);
        assert_eq!(a.assigned_role, "Project Manager");
        assert_eq!(a.assigned_to, "project.manager@company.com");
        assert!(a.supporting_roles.is_empty());

        let none = assign(&catalog, &[], 10);
        assert_eq!(none.assigned_role, "Project Manager");
    }

    #[test]
    fn test_supporting_roles_exclude_primary() {
        let catalog = ComplianceCatalog::builtin();
        // both map to Legal Counsel
        let a = assign(&catalog, &skills(&["legal_analysis", "legal_writing"]), 8);
        assert!(a.supporting_roles.is_empty());
    }

    #[test]
    fn test_fte_rounding() {
        assert_eq!(estimated_fte(0), 0.0);
        assert_eq!(estimated_fte(80), 0.5);
        assert_eq!(estimated_fte(43), 0.27);
    }
}
