//! Workflow backend seam.
//!
//! The Terraform build runs inside an external state machine. The engine only
//! sees it as a two-phase interface: start a named execution here, and
//! receive a success or failure event later (see [`crate::outcome`]).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::request::OperationKind;

/// Deterministic execution name for a request.
///
/// The name alone identifies the request in execution history and is the key
/// for duplicate detection.
pub fn execution_name(kind: OperationKind, instance_id: &str, record_id: &str) -> String {
    format!("{}-{instance_id}-{record_id}", kind.short_name())
}

/// Starts executions of the provisioning state machine.
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// Whether an execution with this name has already been started.
    async fn execution_exists(&self, name: &str) -> Result<bool>;

    /// Start a named execution and return its identifier.
    ///
    /// Returns `EngineError::ExecutionExists` when the backend rejects the
    /// name as already used.
    async fn start_execution(&self, name: &str, input: &str) -> Result<String>;
}

/// A workflow backend that can be shared across tasks.
pub type SharedWorkflow = Arc<dyn WorkflowBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Workflow
// ─────────────────────────────────────────────────────────────────────────────

/// A started execution recorded by [`MockWorkflow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedExecution {
    pub name: String,
    pub input: String,
}

/// In-memory workflow backend.
///
/// Rejects reused names the way a real state machine does.
#[derive(Debug, Default)]
pub struct MockWorkflow {
    started: Mutex<Vec<StartedExecution>>,
    names: Mutex<HashSet<String>>,
    failing: Mutex<Option<String>>,
    hide_existing: Mutex<bool>,
}

impl MockWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent start call fail.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failing.lock() = Some(message.into());
    }

    /// Report existing executions as absent, so that only the start call
    /// detects duplicates.
    pub fn hide_existing(&self) {
        *self.hide_existing.lock() = true;
    }

    /// Executions started so far, in order.
    pub fn started(&self) -> Vec<StartedExecution> {
        self.started.lock().clone()
    }
}

#[async_trait]
impl WorkflowBackend for MockWorkflow {
    async fn execution_exists(&self, name: &str) -> Result<bool> {
        if *self.hide_existing.lock() {
            return Ok(false);
        }
        Ok(self.names.lock().contains(name))
    }

    async fn start_execution(&self, name: &str, input: &str) -> Result<String> {
        if let Some(message) = self.failing.lock().clone() {
            return Err(EngineError::Trigger {
                name: name.to_string(),
                message,
            });
        }
        if !self.names.lock().insert(name.to_string()) {
            return Err(EngineError::ExecutionExists(name.to_string()));
        }
        self.started.lock().push(StartedExecution {
            name: name.to_string(),
            input: input.to_string(),
        });
        Ok(format!("arn:mock:states:execution:{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_name() {
        assert_eq!(
            execution_name(OperationKind::Provision, "pp-abc", "r1"),
            "provision-pp-abc-r1"
        );
        assert_eq!(
            execution_name(OperationKind::Terminate, "pp-abc", "rec-9"),
            "terminate-pp-abc-rec-9"
        );
    }

    #[test]
    fn test_execution_name_distinguishes_records() {
        let a = execution_name(OperationKind::Update, "pp-abc", "rec-1");
        let b = execution_name(OperationKind::Update, "pp-abc", "rec-2");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_mock_rejects_reused_name() {
        let wf = MockWorkflow::new();
        wf.start_execution("n", "{}").await.unwrap();
        assert!(wf.execution_exists("n").await.unwrap());
        assert!(matches!(
            wf.start_execution("n", "{}").await,
            Err(EngineError::ExecutionExists(_))
        ));
        assert_eq!(wf.started().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let wf = MockWorkflow::new();
        wf.fail_with("AccessDenied");
        let err = wf.start_execution("n", "{}").await.unwrap_err();
        assert!(err.to_string().contains("AccessDenied"));
        assert!(wf.started().is_empty());
    }
}
