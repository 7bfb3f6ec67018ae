//! Config command - shows the configuration each handler would resolve.

use anyhow::Result;
use clap::Args;
use serde_json::{Value, json};
use tfsc_config::{CoordinatorConfig, LogConfig, ParserConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Exit with an error if any section fails to resolve
    #[arg(long)]
    pub strict: bool,
}

fn section<T: serde::Serialize>(resolved: tfsc_config::Result<T>, failures: &mut usize) -> Value {
    match resolved {
        Ok(section) => serde_json::to_value(section).unwrap_or(Value::Null),
        Err(e) => {
            *failures += 1;
            json!({"error": e.to_string()})
        }
    }
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let mut failures = 0;
    let mut output = json!({
        "coordinator": section(CoordinatorConfig::from_env(), &mut failures),
        "parameters": section(ParserConfig::from_env(), &mut failures),
        "logging": section(LogConfig::from_env(), &mut failures),
    });
    if ctx.verbose {
        output["version"] = json!(env!("CARGO_PKG_VERSION"));
    }
    println!("{}", serde_json::to_string_pretty(&output)?);

    if args.strict && failures > 0 {
        anyhow::bail!("{failures} configuration section(s) failed to resolve");
    }
    Ok(())
}
