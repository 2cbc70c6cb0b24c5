//! Compliance catalog: the static lookup data the engine runs against
//!
//! Industry and location maps, the mandatory allow-list, requirement and
//! step templates, skill/role/person directories and the notification
//! routing table. A catalog is immutable once built and shared behind an
//! `Arc`; workflows never mutate it.

use crate::collaborators::Channel;
use compliance_types::{
    ComplianceRequirement, ComplianceStepTemplate, Complexity, Framework, Priority,
    StepCategory,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One row of an industry or location lookup table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupEntry {
    /// Matched as a substring of the normalized input
    pub key: String,
    pub frameworks: Vec<Framework>,
}

impl LookupEntry {
    pub fn new(key: impl Into<String>, frameworks: &[&str]) -> Self {
        Self {
            key: key.into(),
            frameworks: frameworks.iter().map(|f| Framework::new(*f)).collect(),
        }
    }
}

/// Additive risk weight for an industry keyword
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndustryRiskWeight {
    pub keyword: String,
    pub weight: u32,
}

/// Which priorities a channel receives
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    pub channel: Channel,
    pub priorities: Vec<Priority>,
}

/// Priority-to-channel routing table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationRouting {
    pub rules: Vec<RouteRule>,
}

impl NotificationRouting {
    /// Channels a notification of the given priority is routed to, in table order
    pub fn channels_for(&self, priority: Priority) -> Vec<Channel> {
        self.rules
            .iter()
            .filter(|rule| rule.priorities.contains(&priority))
            .map(|rule| rule.channel)
            .collect()
    }
}

impl Default for NotificationRouting {
    fn default() -> Self {
        Self {
            rules: vec![
                RouteRule {
                    channel: Channel::Email,
                    priorities: vec![Priority::Critical, Priority::High],
                },
                RouteRule {
                    channel: Channel::Chat,
                    priorities: vec![Priority::Critical, Priority::High, Priority::Medium],
                },
                RouteRule {
                    channel: Channel::Dashboard,
                    priorities: Priority::ALL.to_vec(),
                },
            ],
        }
    }
}

/// Immutable lookup data injected into the engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplianceCatalog {
    pub industries: Vec<LookupEntry>,
    pub locations: Vec<LookupEntry>,
    pub mandatory_frameworks: Vec<Framework>,
    pub industry_risk: Vec<IndustryRiskWeight>,
    pub requirements: Vec<ComplianceRequirement>,
    pub step_templates: BTreeMap<Framework, Vec<ComplianceStepTemplate>>,
    pub skill_roles: BTreeMap<String, String>,
    pub role_people: BTreeMap<String, String>,
    pub default_role: String,
    pub default_assignee: String,
    /// Who receives onboarding summaries
    pub compliance_team: String,
    #[serde(default)]
    pub routing: NotificationRouting,
}

impl ComplianceCatalog {
    /// Load a catalog from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CatalogError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| CatalogError::Parse(e.to_string()))
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// First industry entry whose key is contained in `normalized`
    pub fn lookup_industry(&self, normalized: &str) -> Option<&LookupEntry> {
        first_match(&self.industries, normalized)
    }

    /// First location entry whose key is contained in `normalized`
    pub fn lookup_location(&self, normalized: &str) -> Option<&LookupEntry> {
        first_match(&self.locations, normalized)
    }

    pub fn is_mandatory(&self, framework: &Framework) -> bool {
        self.mandatory_frameworks.iter().any(|m| m.is(framework.as_str()))
    }

    /// Sum of risk weights whose keyword appears in the normalized industry
    pub fn industry_risk_score(&self, normalized: &str) -> u32 {
        if normalized.is_empty() {
            return 0;
        }
        self.industry_risk
            .iter()
            .filter(|w| normalized.contains(w.keyword.as_str()))
            .map(|w| w.weight)
            .sum()
    }

    /// Requirement templates for a framework
    pub fn requirements_for<'a>(
        &'a self,
        framework: &'a Framework,
    ) -> impl Iterator<Item = &'a ComplianceRequirement> + 'a {
        self.requirements
            .iter()
            .filter(move |r| r.framework.is(framework.as_str()))
    }

    /// Step templates for a framework, sorted by step number
    pub fn steps_for(&self, framework: &Framework) -> Option<Vec<ComplianceStepTemplate>> {
        let (_, templates) = self
            .step_templates
            .iter()
            .find(|(key, _)| key.is(framework.as_str()))?;
        if templates.is_empty() {
            return None;
        }
        let mut sorted = templates.clone();
        sorted.sort_by_key(|t| t.step_number);
        Some(sorted)
    }

    /// Role for a skill, or the default role when unmapped
    pub fn role_for_skill(&self, skill: &str) -> &str {
        self.skill_roles
            .get(skill)
            .map(String::as_str)
            .unwrap_or(self.default_role.as_str())
    }

    /// Mapped role for a skill, `None` when unmapped
    pub fn mapped_role(&self, skill: &str) -> Option<&str> {
        self.skill_roles.get(skill).map(String::as_str)
    }

    /// Person for a role, or the default assignee when unmapped
    pub fn person_for_role(&self, role: &str) -> &str {
        self.role_people
            .get(role)
            .map(String::as_str)
            .unwrap_or(self.default_assignee.as_str())
    }

    // ── Built-in Data ────────────────────────────────────────────────

    /// The catalog shipped with the engine
    pub fn builtin() -> Self {
        Self {
            industries: vec![
                LookupEntry::new("technology", &["GDPR", "ISO27001", "SOC2"]),
                LookupEntry::new("finance", &["GDPR", "SOX", "ISO27001", "PCI-DSS", "Basel III"]),
                LookupEntry::new("healthcare", &["GDPR", "HIPAA", "ISO27001", "FDA"]),
                LookupEntry::new("retail", &["GDPR", "PCI-DSS", "ISO27001"]),
                LookupEntry::new("manufacturing", &["ISO27001", "ISO9001", "OSHA"]),
                LookupEntry::new("education", &["GDPR", "FERPA", "ISO27001"]),
                LookupEntry::new("government", &["FISMA", "ISO27001", "NIST"]),
            ],
            locations: vec![
                LookupEntry::new("australia", &["Privacy Act", "ACSC", "APRA"]),
                LookupEntry::new("eu", &["GDPR", "NIS2", "DORA"]),
                LookupEntry::new("us", &["SOX", "HIPAA", "CCPA", "NIST"]),
                LookupEntry::new("uk", &["UK GDPR", "Data Protection Act", "FCA"]),
                LookupEntry::new("canada", &["PIPEDA", "CPPA"]),
                LookupEntry::new("singapore", &["PDPA", "MAS"]),
            ],
            mandatory_frameworks: ["GDPR", "SOX", "HIPAA", "PCI-DSS"]
                .iter()
                .map(|f| Framework::new(*f))
                .collect(),
            industry_risk: vec![
                IndustryRiskWeight { keyword: "finance".into(), weight: 3 },
                IndustryRiskWeight { keyword: "healthcare".into(), weight: 3 },
                IndustryRiskWeight { keyword: "technology".into(), weight: 2 },
            ],
            requirements: builtin_requirements(),
            step_templates: builtin_step_templates(),
            skill_roles: builtin_skill_roles(),
            role_people: builtin_role_people(),
            default_role: "Project Manager".into(),
            default_assignee: "team@company.com".into(),
            compliance_team: "compliance-team@company.com".into(),
            routing: NotificationRouting::default(),
        }
    }
}

impl Default for ComplianceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Errors loading a catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog read failed: {0}")]
    Io(String),

    #[error("Catalog parse failed: {0}")]
    Parse(String),
}

fn first_match<'a>(table: &'a [LookupEntry], normalized: &str) -> Option<&'a LookupEntry> {
    if normalized.is_empty() {
        return None;
    }
    table.iter().find(|entry| normalized.contains(entry.key.as_str()))
}

fn builtin_requirements() -> Vec<ComplianceRequirement> {
    vec![
        ComplianceRequirement::new("1", "Data Protection Assessment", "GDPR", Priority::High)
            .mandatory()
            .with_duration_days(60),
        ComplianceRequirement::new("2", "Financial Controls Review", "SOX", Priority::Critical)
            .mandatory()
            .with_duration_days(90),
        ComplianceRequirement::new("3", "Security Audit", "ISO27001", Priority::High)
            .with_duration_days(75),
        ComplianceRequirement::new("4", "Healthcare Privacy Assessment", "HIPAA", Priority::Critical)
            .mandatory()
            .with_duration_days(45),
        ComplianceRequirement::new("5", "Payment Card Security Assessment", "PCI-DSS", Priority::High)
            .mandatory()
            .with_duration_days(30),
    ]
}

fn builtin_step_templates() -> BTreeMap<Framework, Vec<ComplianceStepTemplate>> {
    use Complexity::{High, Medium};
    use StepCategory::*;

    let mut templates = BTreeMap::new();
    templates.insert(
        Framework::new("GDPR"),
        vec![
            ComplianceStepTemplate::new(1, "Data Inventory and Mapping", Assessment, Medium, 16)
                .with_description("Identify and document all personal data processing activities")
                .with_accountable_role("Data Protection Officer (DPO)")
                .with_skills(&["data_analysis", "process_mapping"])
                .with_deliverables(&["Data flow diagrams", "Processing records", "Data inventory"]),
            ComplianceStepTemplate::new(2, "Privacy Impact Assessment", Assessment, High, 24)
                .with_description("Conduct privacy impact assessment for high-risk processing")
                .with_accountable_role("Legal Team")
                .with_skills(&["legal_analysis", "risk_assessment"])
                .with_deliverables(&["PIA report", "Risk assessment", "Mitigation measures"]),
            ComplianceStepTemplate::new(3, "Consent Management Review", Implementation, Medium, 12)
                .with_description("Review and update consent mechanisms and privacy notices")
                .with_accountable_role("Legal Team")
                .with_skills(&["legal_writing", "ux_design"])
                .with_deliverables(&["Updated privacy policy", "Consent forms", "Opt-out mechanisms"]),
            ComplianceStepTemplate::new(4, "Data Subject Rights Implementation", Implementation, High, 20)
                .with_description("Implement processes for handling data subject requests")
                .with_accountable_role("Data Protection Officer (DPO)")
                .with_skills(&["process_design", "system_integration"])
                .with_deliverables(&["Request procedures", "Response templates", "Tracking system"]),
        ],
    );
    templates.insert(
        Framework::new("SOX"),
        vec![
            ComplianceStepTemplate::new(1, "Internal Controls Documentation", Documentation, High, 40)
                .with_description("Document all financial reporting internal controls")
                .with_accountable_role("Internal Audit")
                .with_skills(&["financial_analysis", "process_documentation"])
                .with_deliverables(&["Control matrices", "Process flowcharts", "Control descriptions"]),
            ComplianceStepTemplate::new(2, "Control Testing and Evaluation", Testing, High, 60)
                .with_description("Test effectiveness of internal controls over financial reporting")
                .with_accountable_role("Internal Audit")
                .with_skills(&["audit_testing", "financial_controls"])
                .with_deliverables(&["Testing procedures", "Test results", "Deficiency reports"]),
            ComplianceStepTemplate::new(3, "Management Assessment", Assessment, Medium, 20)
                .with_description("Management assessment of internal control effectiveness")
                .with_accountable_role("CFO")
                .with_skills(&["management_review", "financial_reporting"])
                .with_deliverables(&["Assessment report", "Certification letters"]),
            ComplianceStepTemplate::new(4, "External Auditor Coordination", Coordination, Medium, 16)
                .with_description("Coordinate with external auditors for SOX compliance review")
                .with_accountable_role("Finance Team")
                .with_skills(&["audit_coordination", "communication"])
                .with_deliverables(&["Auditor communications", "Management responses"]),
        ],
    );
    templates.insert(
        Framework::new("ISO27001"),
        vec![
            ComplianceStepTemplate::new(1, "Information Security Risk Assessment", Assessment, High, 32)
                .with_description("Conduct comprehensive information security risk assessment")
                .with_accountable_role("CISO")
                .with_skills(&["security_analysis", "risk_assessment"])
                .with_deliverables(&["Risk register", "Threat analysis", "Vulnerability assessment"]),
            ComplianceStepTemplate::new(2, "Security Controls Implementation", Implementation, High, 80)
                .with_description("Implement required security controls based on risk assessment")
                .with_accountable_role("IT Security Team")
                .with_skills(&["security_implementation", "system_configuration"])
                .with_deliverables(&["Control implementation plan", "Configuration docs", "Test results"]),
            ComplianceStepTemplate::new(3, "Security Awareness Training", Training, Medium, 24)
                .with_description("Conduct security awareness training for all employees")
                .with_accountable_role("HR Team")
                .with_skills(&["training_design", "security_awareness"])
                .with_deliverables(&["Training materials", "Attendance records", "Assessment results"]),
            ComplianceStepTemplate::new(4, "Incident Response Plan", Planning, Medium, 16)
                .with_description("Develop and test incident response procedures")
                .with_accountable_role("IT Security Team")
                .with_skills(&["incident_response", "crisis_management"])
                .with_deliverables(&["Response plan", "Contact lists", "Test scenarios"]),
        ],
    );
    templates
}

fn builtin_skill_roles() -> BTreeMap<String, String> {
    [
        ("data_analysis", "Data Analyst"),
        ("process_mapping", "Business Analyst"),
        ("legal_analysis", "Legal Counsel"),
        ("risk_assessment", "Risk Manager"),
        ("legal_writing", "Legal Counsel"),
        ("ux_design", "UX Designer"),
        ("process_design", "Business Analyst"),
        ("system_integration", "IT Architect"),
        ("financial_analysis", "Financial Analyst"),
        ("process_documentation", "Business Analyst"),
        ("audit_testing", "Internal Auditor"),
        ("financial_controls", "Finance Manager"),
        ("management_review", "Senior Management"),
        ("financial_reporting", "Finance Manager"),
        ("audit_coordination", "Audit Manager"),
        ("communication", "Project Manager"),
        ("security_analysis", "Security Analyst"),
        ("security_implementation", "Security Engineer"),
        ("system_configuration", "System Administrator"),
        ("training_design", "Training Specialist"),
        ("security_awareness", "Security Officer"),
        ("incident_response", "Security Manager"),
        ("crisis_management", "Operations Manager"),
    ]
    .into_iter()
    .map(|(skill, role)| (skill.to_string(), role.to_string()))
    .collect()
}

fn builtin_role_people() -> BTreeMap<String, String> {
    [
        ("Data Analyst", "data.analyst@company.com"),
        ("Business Analyst", "business.analyst@company.com"),
        ("Legal Counsel", "legal@company.com"),
        ("Risk Manager", "risk.manager@company.com"),
        ("UX Designer", "ux.designer@company.com"),
        ("IT Architect", "it.architect@company.com"),
        ("Financial Analyst", "financial.analyst@company.com"),
        ("Internal Auditor", "internal.auditor@company.com"),
        ("Finance Manager", "finance.manager@company.com"),
        ("Senior Management", "management@company.com"),
        ("Audit Manager", "audit.manager@company.com"),
        ("Project Manager", "project.manager@company.com"),
        ("Security Analyst", "security.analyst@company.com"),
        ("Security Engineer", "security.engineer@company.com"),
        ("System Administrator", "sysadmin@company.com"),
        ("Training Specialist", "training@company.com"),
        ("Security Officer", "security.officer@company.com"),
        ("Security Manager", "security.manager@company.com"),
        ("Operations Manager", "operations.manager@company.com"),
    ]
    .into_iter()
    .map(|(role, person)| (role.to_string(), person.to_string()))
    .collect()
}
