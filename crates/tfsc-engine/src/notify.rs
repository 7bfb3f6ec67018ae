//! Completion notifications sent back to the catalog.
//!
//! Every request is identified by a workflow token plus a record id. A
//! [`Correlation`] holds that pair and is consumed when a [`Notification`] is
//! built from it, so a single handling path cannot address two notifications
//! to the same request.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::request::OperationKind;

/// Maximum length of a failure reason accepted by the catalog.
pub const MAX_FAILURE_REASON_CHARS: usize = 2048;

/// Workflow token and record id of one request.
#[derive(Debug, PartialEq, Eq)]
pub struct Correlation {
    token: String,
    record_id: String,
}

impl Correlation {
    pub fn new(token: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            record_id: record_id.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }
}

/// Terminal status reported for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Succeeded,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

/// One output value reported on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordOutput {
    pub output_key: String,
    pub output_value: String,
    pub description: String,
}

/// A `{Key, Value}` tag that identifies the provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UniqueTag {
    pub key: String,
    pub value: String,
}

/// Resource identifier claimed on a provision result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceIdentifier {
    pub unique_tag: UniqueTag,
}

/// A terminal notification for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    /// Selects the notification call variant.
    #[serde(skip)]
    pub kind: OperationKind,
    pub workflow_token: String,
    pub record_id: String,
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<RecordOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_identifier: Option<ResourceIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Notification {
    /// A SUCCEEDED notification with no outputs.
    pub fn succeeded(kind: OperationKind, correlation: Correlation) -> Self {
        Self {
            kind,
            workflow_token: correlation.token,
            record_id: correlation.record_id,
            status: NotificationStatus::Succeeded,
            outputs: Vec::new(),
            resource_identifier: None,
            failure_reason: None,
        }
    }

    /// A FAILED notification. The reason is cut to [`MAX_FAILURE_REASON_CHARS`].
    pub fn failed(kind: OperationKind, correlation: Correlation, reason: &str) -> Self {
        Self {
            kind,
            workflow_token: correlation.token,
            record_id: correlation.record_id,
            status: NotificationStatus::Failed,
            outputs: Vec::new(),
            resource_identifier: None,
            failure_reason: Some(truncate_chars(reason, MAX_FAILURE_REASON_CHARS)),
        }
    }

    pub fn with_outputs(mut self, outputs: Vec<RecordOutput>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_resource_identifier(mut self, key: &str, value: &str) -> Self {
        self.resource_identifier = Some(ResourceIdentifier {
            unique_tag: UniqueTag {
                key: key.to_string(),
                value: value.to_string(),
            },
        });
        self
    }

    /// Deterministic idempotency token for the notification call.
    ///
    /// Retries of the same terminal result reuse the token; a different
    /// status for the same request does not.
    pub fn idempotency_token(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.workflow_token.as_bytes());
        hasher.update([0]);
        hasher.update(self.record_id.as_bytes());
        hasher.update([0]);
        hasher.update(self.status.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Join a fixed prefix and free-form detail into a bounded failure reason.
///
/// The head is kept and the tail is cut, so the prefix survives unless it is
/// itself longer than the limit.
pub fn bounded_reason(prefix: &str, detail: &str) -> String {
    let mut reason = String::with_capacity(prefix.len() + detail.len());
    reason.push_str(prefix);
    reason.push_str(detail);
    truncate_chars(&reason, MAX_FAILURE_REASON_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifier Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Sends notifications to the catalog.
///
/// Implementations select the provision, update or terminate call from
/// `notification.kind`.
#[async_trait]
pub trait CatalogNotifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// A notifier that can be shared across tasks.
pub type SharedNotifier = Arc<dyn CatalogNotifier>;

// ─────────────────────────────────────────────────────────────────────────────
// Recording Notifier
// ─────────────────────────────────────────────────────────────────────────────

/// Notifier that records every notification instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail after recording the attempt.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failing.lock() = Some(message.into());
    }

    /// Notifications attempted so far, in order.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl CatalogNotifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        match self.failing.lock().clone() {
            Some(message) => Err(EngineError::Notify(message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_consumes_correlation() {
        let n = Notification::succeeded(OperationKind::Update, Correlation::new("t", "r"));
        assert_eq!(n.workflow_token, "t");
        assert_eq!(n.record_id, "r");
        assert_eq!(n.status, NotificationStatus::Succeeded);
        assert!(n.failure_reason.is_none());
    }

    #[test]
    fn test_failed_reason_is_bounded() {
        let long = "x".repeat(5000);
        let n = Notification::failed(OperationKind::Provision, Correlation::new("t", "r"), &long);
        assert_eq!(n.failure_reason.unwrap().chars().count(), MAX_FAILURE_REASON_CHARS);
    }

    #[test]
    fn test_bounded_reason_keeps_prefix() {
        let prefix = "State machine failed: arn:aws:states:exec ";
        let reason = bounded_reason(prefix, &"e".repeat(4096));
        assert!(reason.starts_with(prefix));
        assert_eq!(reason.chars().count(), MAX_FAILURE_REASON_CHARS);

        let short = bounded_reason(prefix, "boom");
        assert_eq!(short, format!("{prefix}boom"));
    }

    #[test]
    fn test_bounded_reason_counts_characters_not_bytes() {
        let reason = bounded_reason("p ", &"é".repeat(3000));
        assert_eq!(reason.chars().count(), MAX_FAILURE_REASON_CHARS);
        assert!(reason.len() > MAX_FAILURE_REASON_CHARS);
    }

    #[test]
    fn test_idempotency_token_is_stable_per_status() {
        let a = Notification::succeeded(OperationKind::Provision, Correlation::new("t", "r"));
        let b = Notification::succeeded(OperationKind::Provision, Correlation::new("t", "r"));
        let c = Notification::failed(OperationKind::Provision, Correlation::new("t", "r"), "x");
        assert_eq!(a.idempotency_token(), b.idempotency_token());
        assert_ne!(a.idempotency_token(), c.idempotency_token());
        assert_eq!(a.idempotency_token().len(), 64);
    }

    #[test]
    fn test_serialized_shape() {
        let n = Notification::succeeded(OperationKind::Provision, Correlation::new("t", "r"))
            .with_resource_identifier("Arn", "arn:x")
            .with_outputs(vec![RecordOutput {
                output_key: "bucket".into(),
                output_value: "b".into(),
                description: "d".into(),
            }]);
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["WorkflowToken"], "t");
        assert_eq!(value["Status"], "SUCCEEDED");
        assert_eq!(
            value["ResourceIdentifier"],
            serde_json::json!({"UniqueTag": {"Key": "Arn", "Value": "arn:x"}})
        );
        assert_eq!(value["Outputs"][0]["OutputKey"], "bucket");
        assert!(value.get("FailureReason").is_none());
        assert!(value.get("Kind").is_none());
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        let n = Notification::failed(OperationKind::Terminate, Correlation::new("t", "r"), "x");
        notifier.notify(&n).await.unwrap();
        notifier.fail_with("throttled");
        assert!(notifier.notify(&n).await.is_err());
        assert_eq!(notifier.count(), 2);
        assert_eq!(notifier.sent()[0], n);
    }
}
