//! Service Catalog engine workflow notifications.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_servicecatalog::Client;
use aws_sdk_servicecatalog::error::DisplayErrorContext;
use aws_sdk_servicecatalog::types::{
    EngineWorkflowResourceIdentifier, EngineWorkflowStatus, RecordOutput,
    UniqueTagResourceIdentifier,
};
use tfsc_engine::{
    CatalogNotifier, EngineError, Notification, NotificationStatus, OperationKind, Result,
};
use tracing::debug;

/// Reports terminal results through the three `Notify*EngineWorkflowResult` calls.
#[derive(Debug, Clone)]
pub struct ServiceCatalogNotifier {
    client: Client,
}

impl ServiceCatalogNotifier {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn status(status: NotificationStatus) -> EngineWorkflowStatus {
    match status {
        NotificationStatus::Succeeded => EngineWorkflowStatus::Succeeded,
        NotificationStatus::Failed => EngineWorkflowStatus::Failed,
    }
}

fn outputs(notification: &Notification) -> Option<Vec<RecordOutput>> {
    if notification.outputs.is_empty() {
        return None;
    }
    Some(
        notification
            .outputs
            .iter()
            .map(|o| {
                RecordOutput::builder()
                    .output_key(&o.output_key)
                    .output_value(&o.output_value)
                    .description(&o.description)
                    .build()
            })
            .collect(),
    )
}

fn resource_identifier(notification: &Notification) -> Option<EngineWorkflowResourceIdentifier> {
    notification.resource_identifier.as_ref().map(|id| {
        EngineWorkflowResourceIdentifier::builder()
            .unique_tag(
                UniqueTagResourceIdentifier::builder()
                    .key(&id.unique_tag.key)
                    .value(&id.unique_tag.value)
                    .build(),
            )
            .build()
    })
}

fn notify_error(err: impl std::error::Error) -> EngineError {
    EngineError::Notify(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl CatalogNotifier for ServiceCatalogNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        let token = n.idempotency_token();
        debug!(
            operation = %n.kind,
            record_id = %n.record_id,
            status = n.status.as_str(),
            "sending engine workflow result"
        );

        match n.kind {
            OperationKind::Provision => {
                self.client
                    .notify_provision_product_engine_workflow_result()
                    .workflow_token(&n.workflow_token)
                    .record_id(&n.record_id)
                    .status(status(n.status))
                    .set_failure_reason(n.failure_reason.clone())
                    .set_outputs(outputs(n))
                    .set_resource_identifier(resource_identifier(n))
                    .idempotency_token(token)
                    .send()
                    .await
                    .map_err(notify_error)?;
            }
            OperationKind::Update => {
                self.client
                    .notify_update_provisioned_product_engine_workflow_result()
                    .workflow_token(&n.workflow_token)
                    .record_id(&n.record_id)
                    .status(status(n.status))
                    .set_failure_reason(n.failure_reason.clone())
                    .set_outputs(outputs(n))
                    .idempotency_token(token)
                    .send()
                    .await
                    .map_err(notify_error)?;
            }
            OperationKind::Terminate => {
                self.client
                    .notify_terminate_provisioned_product_engine_workflow_result()
                    .workflow_token(&n.workflow_token)
                    .record_id(&n.record_id)
                    .status(status(n.status))
                    .set_failure_reason(n.failure_reason.clone())
                    .idempotency_token(token)
                    .send()
                    .await
                    .map_err(notify_error)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfsc_engine::notify::RecordOutput as EngineOutput;
    use tfsc_engine::{Correlation, PLACEHOLDER_RESOURCE_ARN};

    #[test]
    fn test_outputs_conversion() {
        let n = Notification::succeeded(OperationKind::Update, Correlation::new("t", "r"))
            .with_outputs(vec![EngineOutput {
                output_key: "bucket".into(),
                output_value: "demo".into(),
                description: "Bucket name".into(),
            }]);
        let converted = outputs(&n).unwrap();
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].output_key(), Some("bucket"));
        assert_eq!(converted[0].output_value(), Some("demo"));
        assert_eq!(converted[0].description(), Some("Bucket name"));
    }

    #[test]
    fn test_empty_outputs_are_omitted() {
        let n = Notification::failed(OperationKind::Terminate, Correlation::new("t", "r"), "boom");
        assert!(outputs(&n).is_none());
        assert!(resource_identifier(&n).is_none());
        assert_eq!(status(n.status), EngineWorkflowStatus::Failed);
    }

    #[test]
    fn test_resource_identifier_conversion() {
        let n = Notification::succeeded(OperationKind::Provision, Correlation::new("t", "r"))
            .with_resource_identifier("Arn", PLACEHOLDER_RESOURCE_ARN);
        let id = resource_identifier(&n).unwrap();
        let tag = id.unique_tag().unwrap();
        assert_eq!(tag.key(), Some("Arn"));
        assert_eq!(tag.value(), Some(PLACEHOLDER_RESOURCE_ARN));
    }
}
