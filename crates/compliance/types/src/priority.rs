//! Priority, risk and complexity scales

use serde::{Deserialize, Serialize};

// ── Priority ─────────────────────────────────────────────────────────

/// Priority of a requirement or step. Also used as requirement severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// All priorities, most urgent first
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Sort rank where Critical sorts first
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    /// Map an additive priority score onto the scale
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 6 => Priority::Critical,
            s if s >= 4 => Priority::High,
            s if s >= 2 => Priority::Medium,
            _ => Priority::Low,
        }
    }

    /// Weight used when summing requirement severities
    pub fn severity_weight(&self) -> u32 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Risk Level ───────────────────────────────────────────────────────

/// Coarse risk classification used by matching, assessment and reporting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Complexity ───────────────────────────────────────────────────────

/// Step complexity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn effort_multiplier(&self) -> f64 {
        match self {
            Complexity::Low => 0.8,
            Complexity::Medium => 1.0,
            Complexity::High => 1.4,
        }
    }

    /// Forward-scheduling tie-break rank where High sorts first
    pub fn schedule_rank(&self) -> u8 {
        match self {
            Complexity::High => 0,
            Complexity::Medium => 1,
            Complexity::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_thresholds() {
        assert_eq!(Priority::from_score(0), Priority::Low);
        assert_eq!(Priority::from_score(1), Priority::Low);
        assert_eq!(Priority::from_score(2), Priority::Medium);
        assert_eq!(Priority::from_score(4), Priority::High);
        assert_eq!(Priority::from_score(5), Priority::High);
        assert_eq!(Priority::from_score(6), Priority::Critical);
        assert_eq!(Priority::from_score(7), Priority::Critical);
    }

    #[test]
    fn test_rank_orders_critical_first() {
        let mut all = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        all.sort_by_key(|p| p.rank());
        assert_eq!(all, Priority::ALL.to_vec());
    }

    #[test]
    fn test_serde_shapes() {
        assert_eq!(serde_json::to_string(&Priority::Critical).unwrap(), "\"Critical\"");
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"high\"");
        assert_eq!(serde_json::to_string(&Complexity::Medium).unwrap(), "\"medium\"");
    }
}
