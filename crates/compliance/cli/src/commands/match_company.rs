//! Company matching

use crate::error::CliResult;
use crate::host::load_catalog;
use crate::output::{print_json, print_success};
use clap::Args;
use compliance_engine::matcher::assess_risk;
use compliance_engine::{ComplianceMatcher, EngineConfig, MatchResult, MatchedRequirement, RiskAssessment};
use compliance_types::{Company, SizeClass};
use serde::Serialize;
use std::sync::Arc;

#[derive(Args)]
pub struct MatchArgs {
    /// Industry, free text
    #[arg(short, long)]
    industry: String,

    /// Location, free text
    #[arg(short, long)]
    location: String,

    /// Company name
    #[arg(long, default_value = "Unnamed company")]
    name: String,

    /// Company size class
    #[arg(long, default_value = "medium", value_parser = parse_size)]
    size: SizeClass,
}

#[derive(Serialize)]
struct MatchReport {
    company: Company,
    match_result: MatchResult,
    requirements: Vec<MatchedRequirement>,
    risk_assessment: RiskAssessment,
}

pub fn execute(args: MatchArgs, config: &EngineConfig) -> CliResult<()> {
    let matcher = ComplianceMatcher::new(Arc::new(load_catalog(config)?));
    let company = Company::new("cli", args.name)
        .with_industry(args.industry)
        .with_location(args.location)
        .with_size(args.size);

    let match_result = matcher.match_company(&company);
    let requirements = matcher.find_requirements(&match_result);
    let risk_assessment = assess_risk(&requirements);

    print_success(&format!(
        "{} framework(s), {} requirement(s), risk {:?}",
        match_result.frameworks.len(),
        requirements.len(),
        risk_assessment.risk_level
    ));
    print_json(&MatchReport {
        company,
        match_result,
        requirements,
        risk_assessment,
    })
}

pub(crate) fn parse_size(raw: &str) -> Result<SizeClass, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .map_err(|_| format!("unknown size class '{}' (small, medium, large, enterprise)", raw))
}
