//! Run a workflow by name

use crate::error::{CliError, CliResult};
use crate::host::{load_companies, Host};
use crate::output::{print_json, print_run_status};
use clap::Args;
use compliance_engine::EngineConfig;

#[derive(Args)]
pub struct RunArgs {
    /// Workflow name: company_onboarding, step_generation, step_completion
    /// or compliance_reporting
    workflow: String,

    /// Input as a JSON object
    #[arg(short, long, conflicts_with = "input_file")]
    input: Option<String>,

    /// Read the input from a JSON file
    #[arg(long)]
    input_file: Option<String>,

    /// Event to raise once the run has started
    #[arg(long, requires = "event_data")]
    event: Option<String>,

    /// Event payload as a JSON object
    #[arg(long)]
    event_data: Option<String>,

    /// Print the provenance trail after the result
    #[arg(long)]
    trail: bool,
}

pub async fn execute(args: RunArgs, config: &EngineConfig, companies: Option<&str>) -> CliResult<()> {
    let raw = match (&args.input, &args.input_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(CliError::InvalidInput(
                "either --input or --input-file is required".to_string(),
            ))
        }
    };
    let input: serde_json::Value = serde_json::from_str(&raw)?;

    let companies = match companies {
        Some(path) => load_companies(path)?,
        None => Vec::new(),
    };
    let host = Host::new(config, companies).await?;

    let run_id = host.runtime.start_named(&args.workflow, input).await?;
    tracing::info!(run_id = %run_id, workflow = %args.workflow, "Run started");

    if let (Some(name), Some(data)) = (&args.event, &args.event_data) {
        let data: serde_json::Value = serde_json::from_str(data)?;
        host.runtime.raise_event(&run_id, name, data).await?;
    }

    let result = host.runtime.wait(&run_id).await?;
    print_run_status(&args.workflow, &result);
    print_json(&result)?;

    if args.trail {
        print_json(&host.runtime.provenance(&run_id).await)?;
    }

    if result.success {
        Ok(())
    } else {
        Err(CliError::RunFailed(run_id.to_string()))
    }
}
