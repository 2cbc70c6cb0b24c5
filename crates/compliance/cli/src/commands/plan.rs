//! Requirement planning

use super::match_company::parse_size;
use crate::error::{CliError, CliResult};
use crate::host::load_catalog;
use crate::output::{print_json, print_success, print_warning};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use compliance_engine::{EngineConfig, PlanRequest, RequirementPlanner};
use compliance_types::{Framework, SizeClass};
use std::sync::Arc;

#[derive(Args)]
pub struct PlanArgs {
    /// Framework to plan, e.g. GDPR
    framework: String,

    /// Company size class
    #[arg(long, default_value = "medium", value_parser = parse_size)]
    size: SizeClass,

    /// Due date (RFC 3339); defaults to the configured number of days from now
    #[arg(long, conflicts_with = "days")]
    due_date: Option<DateTime<Utc>>,

    /// Days from now until the due date
    #[arg(long)]
    days: Option<i64>,
}

pub fn execute(args: PlanArgs, config: &EngineConfig) -> CliResult<()> {
    let planner = RequirementPlanner::new(Arc::new(load_catalog(config)?), config.scheduling.clone());
    let now = Utc::now();
    let due_date = match (args.due_date, args.days) {
        (Some(due), _) => due,
        (None, Some(days)) => now + Duration::days(days),
        (None, None) => now + Duration::days(config.scheduling.default_due_days),
    };

    let request = PlanRequest {
        framework: Framework::new(&args.framework),
        size: args.size,
        due_date,
    };
    let plan = planner.plan(&request, now).ok_or_else(|| {
        CliError::InvalidInput(format!("no step templates for framework {}", args.framework))
    })?;

    if plan.summary.at_risk_steps > 0 {
        print_warning(&format!(
            "{} step(s) overrun the due date {}",
            plan.summary.at_risk_steps,
            due_date.format("%Y-%m-%d")
        ));
    } else {
        print_success(&format!(
            "{} steps, {} hours, {} role(s)",
            plan.summary.total_steps, plan.summary.total_hours, plan.summary.unique_roles
        ));
    }
    print_json(&plan)
}
