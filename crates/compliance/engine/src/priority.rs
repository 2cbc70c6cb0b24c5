//! Step priority scoring
//!
//! The score depends only on step number, base hours and the accountable
//! role, so the same template always lands on the same priority.

use compliance_types::{CompanyComplianceStep, Priority};
use serde::{Deserialize, Serialize};

/// Role keywords that raise a step's priority
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityRules {
    /// +2 when the role contains any of these
    pub critical_role_keywords: Vec<String>,
    /// +1 when the role contains any of these (and no critical keyword)
    pub important_role_keywords: Vec<String>,
}

impl Default for PriorityRules {
    fn default() -> Self {
        Self {
            critical_role_keywords: vec!["ciso".into(), "cfo".into(), "dpo".into()],
            important_role_keywords: vec!["audit".into(), "legal".into()],
        }
    }
}

/// Additive score and the priority it maps to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub score: u32,
    pub priority: Priority,
}

/// Computes step priorities
#[derive(Clone, Debug, Default)]
pub struct PriorityCalculator {
    rules: PriorityRules,
}

impl PriorityCalculator {
    pub fn new(rules: PriorityRules) -> Self {
        Self { rules }
    }

    /// Score a step from its static attributes
    pub fn score(&self, step: &CompanyComplianceStep) -> PriorityScore {
        self.score_parts(step.step_number, step.base_hours, &step.responsible_role)
    }

    pub fn score_parts(&self, step_number: u32, base_hours: u32, role: &str) -> PriorityScore {
        let mut score = match step_number {
            1 => 3,
            2 => 2,
            _ => 1,
        };

        if base_hours > 40 {
            score += 2;
        } else if base_hours > 20 {
            score += 1;
        }

        let role = role.to_lowercase();
        if contains_any(&role, &self.rules.critical_role_keywords) {
            score += 2;
        } else if contains_any(&role, &self.rules.important_role_keywords) {
            score += 1;
        }

        PriorityScore {
            score,
            priority: Priority::from_score(score),
        }
    }

    /// Score every step in place
    pub fn prioritize(&self, steps: &mut [CompanyComplianceStep]) {
        for step in steps.iter_mut() {
            step.priority = Some(self.score(step).priority);
        }
    }
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_with_ciso_is_critical() {
        let calc = PriorityCalculator::default();
        // 3 (step 1) + 1 (32h) + 2 (ciso)
        let s = calc.score_parts(1, 32, "CISO");
        assert_eq!(s.score, 6);
        assert_eq!(s.priority, Priority::Critical);
    }

    #[test]
    fn test_hours_thresholds_are_exclusive() {
        let calc = PriorityCalculator::default();
        assert_eq!(calc.score_parts(3, 20, "").score, 1);
        assert_eq!(calc.score_parts(3, 21, "").score, 2);
        assert_eq!(calc.score_parts(3, 40, "").score, 2);
        assert_eq!(calc.score_parts(3, 41, "").score, 3);
    }

    #[test]
    fn test_critical_keyword_takes_precedence() {
        let calc = PriorityCalculator::default();
        // contains both "cfo" and "audit"; only +2 applies
        assert_eq!(calc.score_parts(4, 0, "CFO Audit Liaison").score, 3);
        assert_eq!(calc.score_parts(4, 0, "Legal Team").score, 2);
        assert_eq!(calc.score_parts(4, 0, "HR Team").score, 1);
    }

    #[test]
    fn test_dpo_matches_case_insensitively() {
        let calc = PriorityCalculator::default();
        assert_eq!(
            calc.score_parts(2, 24, "Data Protection Officer (DPO)").priority,
            Priority::High
        );
    }
}
