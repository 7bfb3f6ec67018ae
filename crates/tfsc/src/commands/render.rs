//! Render command - shows the execution a request would start.
//!
//! Runs the same normalization and environment derivation as the
//! start-operation handler, without any AWS call.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use tfsc_engine::{ExecutionInput, OperationRequest, PlannedExecution, StateLayout};

use super::Context;

/// Arguments for the render command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Terraform state bucket
    #[arg(long, env = "TFSTATE_BUCKET_NAME")]
    pub bucket: String,

    /// Request file (JSON message body), or `-` for stdin
    pub request: PathBuf,
}

#[derive(Debug, Serialize)]
struct RenderOutput {
    name: String,
    input: ExecutionInput,
}

/// Run the render command.
pub async fn run(args: RenderArgs, _ctx: &Context) -> Result<()> {
    let body = if args.request.as_os_str() == "-" {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        body
    } else {
        tokio::fs::read_to_string(&args.request)
            .await
            .with_context(|| format!("failed to read {}", args.request.display()))?
    };

    let request = OperationRequest::parse(&body)?;
    let plan = PlannedExecution::plan(request, &StateLayout::new(args.bucket))?;
    let output = RenderOutput {
        input: plan.input(),
        name: plan.name,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
