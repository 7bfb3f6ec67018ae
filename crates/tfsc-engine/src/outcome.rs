//! Outcome reporting.
//!
//! Converts the terminal event of an execution into exactly one catalog
//! notification. On success the Terraform outputs are read back from the
//! state bucket. On failure the captured stderr is recovered when possible;
//! every recovery step there is best-effort and never prevents the FAILED
//! notification.

use serde_json::Value;
use tracing::{info, warn};

use crate::environment::{BuildEnvironment, OUTPUTS_S3_URI, STDERR_S3_URI};
use crate::error::{EngineError, Result};
use crate::notify::{Notification, RecordOutput, SharedNotifier, bounded_reason};
use crate::protocol::{BuildOverrides, ExecutionError, FailureEvent, SuccessEvent};
use crate::request::OperationKind;
use crate::storage::SharedStore;
use crate::uri::ObjectUri;

/// Description used when a Terraform output or variable has none.
pub const NO_DESCRIPTION: &str = "No description provided";

/// Unique-tag key of the resource identifier attached to provision results.
pub const RESOURCE_IDENTIFIER_KEY: &str = "Arn";

/// Value of the resource identifier attached to provision results.
///
/// The catalog rejects a SUCCEEDED provision result without a resource
/// identifier, and Terraform outputs follow no convention that would yield a
/// real one.
pub const PLACEHOLDER_RESOURCE_ARN: &str = "arn:placeholder:not:a:real:arn";

/// Reports execution outcomes to the catalog.
pub struct OutcomeReporter {
    store: SharedStore,
    notifier: SharedNotifier,
}

impl OutcomeReporter {
    pub fn new(store: SharedStore, notifier: SharedNotifier) -> Self {
        Self { store, notifier }
    }

    /// Report a successful build. Returns the notification that was sent.
    ///
    /// For provision and update the outputs document must be readable; an
    /// error here is returned without notifying.
    pub async fn report_success(&self, event: SuccessEvent) -> Result<Notification> {
        let (kind, correlation) = event.product_operation_request.correlate()?;
        let mut notification = Notification::succeeded(kind, correlation);

        if matches!(kind, OperationKind::Provision | OperationKind::Update) {
            let env = event.codebuild.unwrap_or_default().environment_variables_override;
            let uri = env_uri(&env, OUTPUTS_S3_URI)?;
            info!(%uri, "loading terraform outputs");
            let document = self.store.get_text(&uri).await?;
            info!(outputs = %document, "terraform outputs loaded");
            notification = notification.with_outputs(record_outputs(&document)?);
        }

        if kind == OperationKind::Provision {
            notification = notification
                .with_resource_identifier(RESOURCE_IDENTIFIER_KEY, PLACEHOLDER_RESOURCE_ARN);
        }

        self.send(notification).await
    }

    /// Report a failed execution. Returns the notification that was sent.
    pub async fn report_failure(&self, event: FailureEvent) -> Result<Notification> {
        let FailureEvent { state, context } = event;
        let (kind, correlation) = state.product_operation_request.correlate()?;

        if let Some(cause) = error_cause(state.error.as_ref()) {
            info!(cause = %cause, "execution error cause");
        }

        let stderr = match build_environment(state.codebuild) {
            Some(env) => self.recover_stderr(&env).await,
            None => None,
        };

        let prefix = format!(
            "Terraform provisioning Step Functions State Machine failed: {} ",
            context.execution.id
        );
        let reason = bounded_reason(&prefix, stderr.as_deref().unwrap_or_default());
        self.send(Notification::failed(kind, correlation, &reason)).await
    }

    /// Fetch the captured Terraform stderr, if any.
    async fn recover_stderr(&self, env: &BuildEnvironment) -> Option<String> {
        let uri = match env_uri(env, STDERR_S3_URI) {
            Ok(uri) => uri,
            Err(e) => {
                warn!(error = %e, "could not locate terraform stderr");
                return None;
            }
        };
        info!(%uri, "loading terraform stderr");
        match self.store.get_text(&uri).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(%uri, error = %e, "could not load terraform stderr");
                None
            }
        }
    }

    async fn send(&self, notification: Notification) -> Result<Notification> {
        info!(
            operation = %notification.kind,
            status = notification.status.as_str(),
            notification = ?notification,
            "notifying catalog of product operation result"
        );
        self.notifier.notify(&notification).await?;
        Ok(notification)
    }
}

/// Parse the structured cause of an execution error, if present.
///
/// A string cause is decoded as JSON; a cause that already arrived as a
/// structured value is returned as is.
pub fn error_cause(error: Option<&Value>) -> Option<Value> {
    let error: ExecutionError = match error.cloned().map(serde_json::from_value) {
        Some(Ok(error)) => error,
        Some(Err(e)) => {
            warn!(error = %e, "could not decode execution error");
            return None;
        }
        None => ExecutionError::default(),
    };
    match error.cause {
        Some(Value::String(cause)) => match serde_json::from_str(&cause) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, cause, "could not parse error cause");
                None
            }
        },
        Some(Value::Null) | None => {
            warn!("failure event carries no error cause");
            None
        }
        Some(other) => Some(other),
    }
}

/// Decode the build overrides of a failure event, if usable.
fn build_environment(codebuild: Option<Value>) -> Option<BuildEnvironment> {
    let Some(raw) = codebuild else {
        warn!("no build environment on failure event, cannot locate terraform stderr");
        return None;
    };
    match serde_json::from_value::<BuildOverrides>(raw) {
        Ok(overrides) => Some(overrides.environment_variables_override),
        Err(e) => {
            warn!(error = %e, "could not decode build environment on failure event");
            None
        }
    }
}

/// Convert a `terraform output -json` document into catalog outputs.
///
/// Entries keep document order. Non-string values are JSON encoded.
pub fn record_outputs(document: &str) -> Result<Vec<RecordOutput>> {
    let outputs: serde_json::Map<String, Value> =
        serde_json::from_str(document).map_err(|e| EngineError::Outputs(e.to_string()))?;

    outputs
        .into_iter()
        .map(|(key, output)| {
            let value = output
                .get("value")
                .ok_or_else(|| EngineError::Outputs(format!("output '{key}' has no value")))?;
            Ok(RecordOutput {
                output_value: stringify(value)?,
                description: output
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or(NO_DESCRIPTION)
                    .to_string(),
                output_key: key,
            })
        })
        .collect()
}

/// Strings pass through unchanged; anything else is JSON encoded.
pub(crate) fn stringify(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn env_uri(env: &BuildEnvironment, name: &str) -> Result<ObjectUri> {
    let raw = env.get(name).ok_or_else(|| {
        EngineError::InvalidRequest(format!("build environment has no {name}"))
    })?;
    ObjectUri::parse(raw)
}
