//! Start-operation command - starts provisioning executions for queued requests.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use aws_lambda_events::event::sqs::SqsEvent;
use clap::Args;
use lambda_runtime::{LambdaEvent, service_fn};
use tfsc_aws::{ServiceCatalogNotifier, StepFunctionsBackend};
use tfsc_config::CoordinatorConfig;
use tfsc_engine::Coordinator;
use tracing::info;

use super::Context;

/// Arguments for the start-operation command.
#[derive(Args, Debug)]
pub struct StartOperationArgs {}

/// Run the start-operation handler loop.
pub async fn run(_args: StartOperationArgs, _ctx: &Context) -> Result<()> {
    let config = CoordinatorConfig::from_env()?;
    let sdk = tfsc_aws::load_sdk_config().await;

    let coordinator = Coordinator::new(
        config.state_bucket.as_str(),
        Arc::new(StepFunctionsBackend::new(&sdk, config.state_machine_arn.as_str())),
        Arc::new(ServiceCatalogNotifier::new(&sdk)),
    );
    info!(
        state_bucket = %config.state_bucket,
        state_machine_arn = %config.state_machine_arn,
        "start-operation handler ready"
    );

    let coordinator = &coordinator;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<SqsEvent>| async move {
        handle(coordinator, event).await
    }))
    .await
    .map_err(|e| anyhow!("lambda runtime: {e}"))
}

async fn handle(coordinator: &Coordinator, event: LambdaEvent<SqsEvent>) -> Result<(), lambda_runtime::Error> {
    let invoker = event.context.invoked_function_arn.as_str();
    info!(
        request_id = %event.context.request_id,
        records = event.payload.records.len(),
        "processing queue batch"
    );
    let bodies = event.payload.records.iter().map(|r| r.body.as_deref());
    coordinator.handle_batch(bodies, invoker).await?;
    Ok(())
}
