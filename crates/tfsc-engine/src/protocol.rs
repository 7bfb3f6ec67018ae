//! Wire shapes exchanged with the provisioning state machine.
//!
//! The coordinator starts an execution with an [`ExecutionInput`]. The state
//! machine passes the same document to the success handler, and wraps it
//! under `State` together with the caught error for the failure handler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::environment::BuildEnvironment;
use crate::request::OperationHeader;

/// Environment overrides handed to the build project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOverrides {
    #[serde(rename = "environmentVariablesOverride", default)]
    pub environment_variables_override: BuildEnvironment,
}

/// Input document of one execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionInput {
    /// The request exactly as received from the queue.
    #[serde(rename = "productOperationRequest")]
    pub product_operation_request: Value,
    pub codebuild: BuildOverrides,
}

impl ExecutionInput {
    pub fn new(request: Value, environment: BuildEnvironment) -> Self {
        Self {
            product_operation_request: request,
            codebuild: BuildOverrides {
                environment_variables_override: environment,
            },
        }
    }
}

/// Event delivered when the build finished successfully.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessEvent {
    #[serde(rename = "productOperationRequest")]
    pub product_operation_request: OperationHeader,
    #[serde(default)]
    pub codebuild: Option<BuildOverrides>,
}

/// Error caught by the state machine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionError {
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
    /// Usually a JSON document describing the failed state, encoded as a
    /// string; some integrations pass it as an object.
    #[serde(rename = "Cause", default)]
    pub cause: Option<Value>,
}

/// State carried into the failure handler.
///
/// Only the request header is required. `codebuild` and `Error` are kept
/// undecoded here and read best-effort by the reporter, so a malformed
/// diagnostic field cannot block the FAILED notification.
#[derive(Debug, Clone, Deserialize)]
pub struct FailureState {
    #[serde(rename = "productOperationRequest")]
    pub product_operation_request: OperationHeader,
    #[serde(default)]
    pub codebuild: Option<Value>,
    #[serde(rename = "Error", default)]
    pub error: Option<Value>,
}

/// Identity of the failed execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionRef {
    #[serde(rename = "Id")]
    pub id: String,
}

/// State machine context object (only the fields the engine reads).
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionContext {
    #[serde(rename = "Execution")]
    pub execution: ExecutionRef,
}

/// Event delivered when the execution itself failed.
#[derive(Debug, Clone, Deserialize)]
pub struct FailureEvent {
    #[serde(rename = "State")]
    pub state: FailureState,
    #[serde(rename = "Context")]
    pub context: ExecutionContext,
}
