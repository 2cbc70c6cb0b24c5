//! Company profile as seen by the compliance engine

use crate::CompanyId;
use serde::{Deserialize, Serialize};

/// Company size class, drives effort multipliers for step hours
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    #[default]
    Medium,
    Large,
    Enterprise,
}

impl SizeClass {
    /// Effort multiplier applied to template base hours
    pub fn effort_multiplier(&self) -> f64 {
        match self {
            SizeClass::Small => 0.7,
            SizeClass::Medium => 1.0,
            SizeClass::Large => 1.3,
            SizeClass::Enterprise => 1.6,
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeClass::Small => write!(f, "small"),
            SizeClass::Medium => write!(f, "medium"),
            SizeClass::Large => write!(f, "large"),
            SizeClass::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// A company profile. Read-only to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// Free text, e.g. "Finance & Banking"
    #[serde(default)]
    pub industry: String,
    /// Free text, e.g. "Sydney, Australia"
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub size: SizeClass,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: CompanyId::new(id),
            name: name.into(),
            industry: String::new(),
            location: String::new(),
            size: SizeClass::default(),
        }
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = industry.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_size(mut self, size: SizeClass) -> Self {
        self.size = size;
        self
    }

    /// Industry, trimmed and lowercased
    pub fn normalized_industry(&self) -> String {
        self.industry.trim().to_lowercase()
    }

    /// Location, trimmed and lowercased
    pub fn normalized_location(&self) -> String {
        self.location.trim().to_lowercase()
    }
}
