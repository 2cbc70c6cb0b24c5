//! Sentinel - compliance workflow host
//!
//! Loads engine configuration, installs logging and drives the compliance
//! workflows against in-memory collaborators:
//! - `match`: frameworks and requirements for a company profile
//! - `plan`: a forward-scheduled plan for one framework
//! - `run`: any workflow by name with a JSON input
//! - `demo`: onboarding through reporting for a sample company

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod host;
mod output;

use commands::{demo, match_company, plan, run};
use compliance_engine::EngineConfig;
use error::{CliError, CliResult};

/// Sentinel CLI
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Sentinel - Compliance workflow engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SENTINEL_CONFIG")]
    config: Option<String>,

    /// Log level, overrides the configured one
    #[arg(long, env = "SENTINEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SENTINEL_LOG_JSON")]
    json: bool,

    /// JSON file with companies to seed into storage
    #[arg(long, env = "SENTINEL_COMPANIES")]
    companies: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Match a company profile to frameworks and requirements
    Match(match_company::MatchArgs),

    /// Build a requirement plan for one framework
    Plan(plan::PlanArgs),

    /// Run a workflow by name and print its result
    Run(run::RunArgs),

    /// Walk a sample company through every workflow
    Demo(demo::DemoArgs),

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref())
        .map_err(|e| CliError::Config(e.to_string()))?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!(config = ?cli.config, "Configuration loaded");

    match cli.command {
        Commands::Match(args) => match_company::execute(args, &config),
        Commands::Plan(args) => plan::execute(args, &config),
        Commands::Run(args) => run::execute(args, &config, cli.companies.as_deref()).await,
        Commands::Demo(args) => demo::execute(args, &config).await,
        Commands::Config => output::print_json(&config),
    }
}
