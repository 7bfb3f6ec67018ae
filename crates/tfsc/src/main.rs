//! tfsc - Terraform provisioning engine for Service Catalog external products
//!
//! Main entry point. Each Lambda function runs one subcommand.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tfsc_config::{LogConfig, LogFormat};

mod commands;

use commands::{
    config, failed_operation, parameter_parser, render, start_operation, succeeded_operation,
};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// tfsc - Terraform provisioning engine for Service Catalog external products
#[derive(Parser)]
#[command(name = "tfsc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the operation-start handler (queue batches)
    StartOperation(start_operation::StartOperationArgs),

    /// Run the handler for successful executions
    SucceededOperation(succeeded_operation::SucceededOperationArgs),

    /// Run the handler for failed executions
    FailedOperation(failed_operation::FailedOperationArgs),

    /// Run the artifact parameter parser
    ParameterParser(parameter_parser::ParameterParserArgs),

    /// Print the execution a request would start, without calling AWS
    Render(render::RenderArgs),

    /// Show resolved configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = LogConfig::from_env()?;
    init_tracing(&log, cli.verbose);

    let ctx = commands::Context {
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::StartOperation(args) => start_operation::run(args, &ctx).await,
        Commands::SucceededOperation(args) => succeeded_operation::run(args, &ctx).await,
        Commands::FailedOperation(args) => failed_operation::run(args, &ctx).await,
        Commands::ParameterParser(args) => parameter_parser::run(args, &ctx).await,
        Commands::Render(args) => render::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

fn init_tracing(log: &LogConfig, verbose: bool) {
    use tracing_subscriber::prelude::*;

    let default_filter = if verbose {
        "tfsc=debug,tfsc_engine=debug,tfsc_aws=debug,info"
    } else {
        "tfsc=info,tfsc_engine=info,tfsc_aws=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::new(log.filter.as_deref().unwrap_or(default_filter));

    // Logs go to stderr so `render` and `config` output stays parseable.
    let (json, text) = match log.format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}
