//! Parameter-parser command - answers catalog parameter discovery calls.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Args;
use lambda_runtime::{LambdaEvent, service_fn};
use tfsc_aws::StsRoleAssumer;
use tfsc_config::ParserConfig;
use tfsc_engine::{ParameterExtractor, ParameterRequest, ParameterResponse};
use tracing::info;

use super::Context;

/// Arguments for the parameter-parser command.
#[derive(Args, Debug)]
pub struct ParameterParserArgs {}

/// Run the parameter-parser handler loop.
pub async fn run(_args: ParameterParserArgs, _ctx: &Context) -> Result<()> {
    let config = ParserConfig::from_env()?;
    let sdk = tfsc_aws::load_sdk_config().await;
    info!(
        variables_filename = %config.variables_filename,
        session_name = %config.session_name,
        "parameter-parser handler ready"
    );
    let extractor = ParameterExtractor::new(Arc::new(StsRoleAssumer::new(&sdk)), config);

    let extractor = &extractor;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<ParameterRequest>| async move {
        info!(
            request_id = %event.context.request_id,
            artifact = %event.payload.artifact.path,
            "discovering artifact parameters"
        );
        let response = extractor
            .extract(&event.payload, &event.context.request_id)
            .await?;
        info!(count = response.parameters.len(), "returning parameters");
        Ok::<ParameterResponse, lambda_runtime::Error>(response)
    }))
    .await
    .map_err(|e| anyhow!("lambda runtime: {e}"))
}
