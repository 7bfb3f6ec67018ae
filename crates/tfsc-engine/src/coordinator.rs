//! Operation-start coordinator.
//!
//! Consumes queued product operation requests, derives the build environment
//! and starts exactly one state machine execution per request. Any error
//! after the request's correlation pair is known is reported to the catalog
//! as FAILED before it is returned, so the requester is never left without a
//! terminal status while the queue still redelivers the message.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::environment::{BuildEnvironment, StateLayout, derive_environment};
use crate::error::{EngineError, Result};
use crate::notify::{Notification, SharedNotifier};
use crate::protocol::ExecutionInput;
use crate::request::{OperationHeader, OperationRequest};
use crate::workflow::{SharedWorkflow, execution_name};

/// Everything needed to start one execution, derived without side effects.
#[derive(Debug, Clone)]
pub struct PlannedExecution {
    pub request: OperationRequest,
    pub environment: BuildEnvironment,
    pub name: String,
}

impl PlannedExecution {
    pub fn plan(request: OperationRequest, layout: &StateLayout) -> Result<Self> {
        let environment = derive_environment(&request, layout)?;
        let name = execution_name(request.kind, &request.instance_id, &request.record_id);
        Ok(Self {
            request,
            environment,
            name,
        })
    }

    /// The execution input document.
    pub fn input(&self) -> ExecutionInput {
        ExecutionInput::new(self.request.document().clone(), self.environment.clone())
    }

    /// The execution input as the JSON string passed to the backend.
    pub fn input_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.input())?)
    }
}

/// What happened to a request that was handled without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new execution was started.
    Started { name: String, execution_id: String },
    /// An execution with the derived name already existed; nothing was started.
    AlreadyStarted { name: String },
}

impl TriggerOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Started { name, .. } | Self::AlreadyStarted { name } => name,
        }
    }
}

/// Starts provisioning executions for queued requests.
pub struct Coordinator {
    layout: StateLayout,
    workflow: SharedWorkflow,
    notifier: SharedNotifier,
}

impl Coordinator {
    pub fn new(
        state_bucket: impl Into<String>,
        workflow: SharedWorkflow,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            layout: StateLayout::new(state_bucket),
            workflow,
            notifier,
        }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Handle a delivery batch in order.
    ///
    /// Stops at the first failing message and returns its error; the whole
    /// batch is then redelivered and already-started messages resolve to
    /// [`TriggerOutcome::AlreadyStarted`].
    pub async fn handle_batch<'a, I>(&self, bodies: I, invoker: &str) -> Result<Vec<TriggerOutcome>>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut outcomes = Vec::new();
        for (index, body) in bodies.into_iter().enumerate() {
            let body = body.ok_or_else(|| {
                EngineError::InvalidRequest(format!("queue record {index} has no body"))
            })?;
            outcomes.push(self.handle_message(body, invoker).await?);
        }
        Ok(outcomes)
    }

    /// Handle one queued message body.
    ///
    /// `invoker` identifies the running function in failure reasons.
    pub async fn handle_message(&self, body: &str, invoker: &str) -> Result<TriggerOutcome> {
        let document: Value = serde_json::from_str(body).map_err(|e| {
            EngineError::InvalidRequest(format!("message body is not valid JSON: {e}"))
        })?;
        debug!(request = %document, "operation request received");

        let header = OperationHeader::from_document(&document);
        match self.start(document).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(error = %err, "failed to start terraform provisioning");
                match header {
                    Ok(header) => self.notify_start_failure(header, invoker, &err).await,
                    Err(e) => error!(error = %e, "request cannot be correlated; no notification sent"),
                }
                Err(err)
            }
        }
    }

    async fn start(&self, document: Value) -> Result<TriggerOutcome> {
        let request = OperationRequest::from_document(document)?;
        let plan = PlannedExecution::plan(request, &self.layout)?;
        self.trigger(&plan).await
    }

    async fn trigger(&self, plan: &PlannedExecution) -> Result<TriggerOutcome> {
        let name = plan.name.as_str();

        match self.workflow.execution_exists(name).await {
            Ok(true) => {
                warn!(execution_name = name, "execution already exists, not starting again");
                return Ok(TriggerOutcome::AlreadyStarted {
                    name: name.to_string(),
                });
            }
            Ok(false) => {}
            Err(e) => warn!(execution_name = name, error = %e, "could not check for existing execution"),
        }

        let input = plan.input_json()?;
        info!(
            execution_name = name,
            token = %plan.request.token,
            record_id = %plan.request.record_id,
            operation = %plan.request.kind,
            input = %input,
            "starting state machine execution"
        );

        match self.workflow.start_execution(name, &input).await {
            Ok(execution_id) => {
                info!(execution_name = name, execution_id = %execution_id, "execution started");
                Ok(TriggerOutcome::Started {
                    name: name.to_string(),
                    execution_id,
                })
            }
            Err(EngineError::ExecutionExists(_)) => {
                warn!(execution_name = name, "execution name already used, treating as started");
                Ok(TriggerOutcome::AlreadyStarted {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort FAILED notification for a request that could not be started.
    async fn notify_start_failure(&self, header: OperationHeader, invoker: &str, err: &EngineError) {
        let (kind, correlation) = match header.correlate() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "no notification variant for operation; not notifying");
                return;
            }
        };

        let reason = format!(
            "Error encountered in Lambda function {invoker} starting Terraform provisioning: {err}"
        );
        let notification = Notification::failed(kind, correlation, &reason);
        info!(
            operation = %kind,
            notification = ?notification,
            "notifying catalog of product operation result"
        );

        if let Err(e) = self.notifier.notify(&notification).await {
            error!(error = %e, "failed to notify catalog of start failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::workflow::MockWorkflow;
    use serde_json::json;

    fn provision_body() -> String {
        json!({
            "token": "t1",
            "operation": "PROVISION_PRODUCT",
            "provisionedProductId": "pp-abc",
            "recordId": "r1",
            "launchRoleArn": "arn:aws:iam::111111111111:role/Launch",
            "artifact": {"path": "s3://bucket/key", "type": "AWS_S3"},
            "identity": {"awsAccountId": "111111111111"},
            "parameters": [{"key": "size", "value": "10"}]
        })
        .to_string()
    }

    fn coordinator() -> (Coordinator, Arc<MockWorkflow>, Arc<RecordingNotifier>) {
        let workflow = Arc::new(MockWorkflow::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = Coordinator::new("tf-state", workflow.clone(), notifier.clone());
        (coordinator, workflow, notifier)
    }

    #[test]
    fn test_plan_is_pure() {
        let request = OperationRequest::parse(&provision_body()).unwrap();
        let plan = PlannedExecution::plan(request, &StateLayout::new("tf-state")).unwrap();
        assert_eq!(plan.name, "provision-pp-abc-r1");
        assert_eq!(plan.environment.get("TF_VAR_size"), Some("10"));
        let input: Value = serde_json::from_str(&plan.input_json().unwrap()).unwrap();
        assert_eq!(input["productOperationRequest"]["token"], "t1");
    }

    #[tokio::test]
    async fn test_start_sends_no_notification() {
        let (coordinator, workflow, notifier) = coordinator();
        let outcome = coordinator
            .handle_message(&provision_body(), "arn:fn")
            .await
            .unwrap();
        assert!(matches!(outcome, TriggerOutcome::Started { .. }));
        assert_eq!(workflow.started().len(), 1);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_is_not_notified() {
        let (coordinator, workflow, notifier) = coordinator();
        assert!(coordinator.handle_message("{", "arn:fn").await.is_err());
        assert!(workflow.started().is_empty());
        assert_eq!(notifier.count(), 0);
    }
}
