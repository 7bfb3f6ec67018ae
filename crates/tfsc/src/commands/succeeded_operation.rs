//! Succeeded-operation command - reports successful executions to the catalog.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Args;
use lambda_runtime::{LambdaEvent, service_fn};
use tfsc_aws::{S3Store, ServiceCatalogNotifier};
use tfsc_engine::{OutcomeReporter, SuccessEvent};
use tracing::info;

use super::Context;

/// Arguments for the succeeded-operation command.
#[derive(Args, Debug)]
pub struct SucceededOperationArgs {}

/// Run the succeeded-operation handler loop.
pub async fn run(_args: SucceededOperationArgs, _ctx: &Context) -> Result<()> {
    let sdk = tfsc_aws::load_sdk_config().await;
    let reporter = OutcomeReporter::new(
        Arc::new(S3Store::new(&sdk)),
        Arc::new(ServiceCatalogNotifier::new(&sdk)),
    );

    let reporter = &reporter;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<SuccessEvent>| async move {
        info!(request_id = %event.context.request_id, "reporting successful execution");
        reporter.report_success(event.payload).await?;
        Ok::<(), lambda_runtime::Error>(())
    }))
    .await
    .map_err(|e| anyhow!("lambda runtime: {e}"))
}
