//! End-to-end walkthrough for a sample company

use super::match_company::parse_size;
use crate::error::{CliError, CliResult};
use crate::host::Host;
use crate::output::{print_header, print_json, print_run_status, print_success};
use anyhow::Context;
use clap::Args;
use compliance_engine::{
    ComplianceReportingInput, CompanyOnboardingInput, EngineConfig, ReportType, RunResult,
    StepCompletionInput, StepGenerationInput, WorkflowInput, WorkflowOutput, WorkflowRuntime,
};
use compliance_types::{Company, CompanyComplianceStep, EvidenceSubmission, SizeClass};

#[derive(Args)]
pub struct DemoArgs {
    /// Industry of the sample company
    #[arg(long, default_value = "Finance")]
    industry: String,

    /// Location of the sample company
    #[arg(long, default_value = "Australia")]
    location: String,

    /// Size class of the sample company
    #[arg(long, default_value = "large", value_parser = parse_size)]
    size: SizeClass,

    /// Print the final report as JSON
    #[arg(long)]
    full_report: bool,
}

pub async fn execute(args: DemoArgs, config: &EngineConfig) -> CliResult<()> {
    let company = Company::new("demo-co", "Demo Company")
        .with_industry(&args.industry)
        .with_location(&args.location)
        .with_size(args.size);
    let company_id = company.id.clone();
    let host = Host::new(config, vec![company]).await?;
    let runtime = &host.runtime;

    print_header("Onboarding");
    let result = run(
        runtime,
        "company_onboarding",
        WorkflowInput::CompanyOnboarding(CompanyOnboardingInput {
            company_id: company_id.clone(),
        }),
    )
    .await?;
    let onboarding = match result.data {
        Some(WorkflowOutput::CompanyOnboarding(output)) => output,
        _ => return Ok(()),
    };
    for record in &onboarding.records {
        println!(
            "  {} {:<10} {:?} due {}",
            record.id,
            record.framework,
            record.priority,
            record
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    print_header("Step generation");
    let mut first_plan: Option<Vec<CompanyComplianceStep>> = None;
    for record in &onboarding.records {
        let result = run(
            runtime,
            "step_generation",
            WorkflowInput::StepGeneration(StepGenerationInput {
                record_id: record.id.clone(),
            }),
        )
        .await?;
        if let Some(WorkflowOutput::StepGeneration(output)) = result.data {
            println!(
                "  {} {} steps, {} hours",
                output.framework,
                output.steps.len(),
                output.total_estimated_hours
            );
            if first_plan.is_none() {
                first_plan = Some(output.steps);
            }
        }
    }

    if let Some(mut steps) = first_plan {
        print_header("Step completion");
        steps.sort_by_key(|s| s.step_number);
        for step in &steps {
            let deliverables: Vec<&str> = step.deliverables.iter().map(String::as_str).collect();
            let evidence = EvidenceSubmission::new(format!("evidence/{}.pdf", step.id))
                .with_size(256 * 1024)
                .covering(&deliverables);
            let result = run(
                runtime,
                "step_completion",
                WorkflowInput::StepCompletion(StepCompletionInput {
                    step_id: step.id.clone(),
                    record_id: step.record_id.clone(),
                    completed_by: "demo.user@company.com".to_string(),
                    evidence: Some(evidence),
                    await_evidence: false,
                }),
            )
            .await?;
            if let Some(WorkflowOutput::StepCompletion(output)) = result.data {
                println!(
                    "  step {} done, record at {:.1}%",
                    step.step_number, output.progress.completion_percentage
                );
            }
        }
    }

    print_header("Reporting");
    let result = run(
        runtime,
        "compliance_reporting",
        WorkflowInput::ComplianceReporting(ComplianceReportingInput {
            company_id,
            report_type: ReportType::Comprehensive,
            channels: None,
        }),
    )
    .await?;
    if let Some(WorkflowOutput::ComplianceReporting(output)) = result.data {
        let summary = &output.report.executive_summary;
        println!(
            "  {:.1}% complete, {} of {} requirements, {} overdue",
            summary.overall_completion_rate,
            summary.completed_requirements,
            summary.total_requirements,
            summary.overdue_count
        );
        if args.full_report {
            print_json(&output.report)?;
        }
    }

    print_success(&format!(
        "{} notification(s) delivered",
        host.notifier.sent().await.len()
    ));
    Ok(())
}

async fn run(runtime: &WorkflowRuntime, name: &str, input: WorkflowInput) -> CliResult<RunResult> {
    let result = runtime
        .execute(input)
        .await
        .with_context(|| format!("running {}", name))?;
    print_run_status(name, &result);
    if !result.success {
        let run_id = result
            .error
            .as_ref()
            .map(|e| e.run_id.to_string())
            .unwrap_or_default();
        return Err(CliError::RunFailed(run_id));
    }
    Ok(result)
}
