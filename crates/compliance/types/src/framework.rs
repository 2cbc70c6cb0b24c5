//! Frameworks and requirement templates

use crate::{Priority, RequirementId};
use serde::{Deserialize, Serialize};

/// A named regulatory or compliance standard, e.g. "GDPR"
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Framework(pub String);

impl Framework {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive name comparison
    pub fn is(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Framework {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Static requirement template keyed by framework
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplianceRequirement {
    pub id: RequirementId,
    pub name: String,
    pub framework: Framework,
    pub severity: Priority,
    pub mandatory: bool,
    /// Base duration in days
    pub estimated_duration_days: u32,
}

impl ComplianceRequirement {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        framework: impl Into<Framework>,
        severity: Priority,
    ) -> Self {
        Self {
            id: RequirementId::new(id),
            name: name.into(),
            framework: framework.into(),
            severity,
            mandatory: false,
            estimated_duration_days: 60,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.estimated_duration_days = days;
        self
    }
}
