//! Step Functions workflow backend.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sfn::Client;
use aws_sdk_sfn::error::DisplayErrorContext;
use aws_sdk_sfn::operation::describe_execution::DescribeExecutionError;
use aws_sdk_sfn::operation::start_execution::StartExecutionError;
use tfsc_engine::{EngineError, Result, WorkflowBackend};
use tracing::debug;

/// Starts executions of one state machine.
#[derive(Debug, Clone)]
pub struct StepFunctionsBackend {
    client: Client,
    state_machine_arn: String,
}

impl StepFunctionsBackend {
    pub fn new(config: &SdkConfig, state_machine_arn: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            state_machine_arn: state_machine_arn.into(),
        }
    }

    pub fn state_machine_arn(&self) -> &str {
        &self.state_machine_arn
    }
}

/// ARN of the execution `name` of a standard state machine.
pub fn execution_arn(state_machine_arn: &str, name: &str) -> String {
    format!(
        "{}:{name}",
        state_machine_arn.replacen(":stateMachine:", ":execution:", 1)
    )
}

#[async_trait]
impl WorkflowBackend for StepFunctionsBackend {
    async fn execution_exists(&self, name: &str) -> Result<bool> {
        let arn = execution_arn(&self.state_machine_arn, name);
        debug!(execution_arn = %arn, "describing execution");
        match self.client.describe_execution().execution_arn(&arn).send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(DescribeExecutionError::is_execution_does_not_exist) =>
            {
                Ok(false)
            }
            Err(e) => Err(EngineError::Trigger {
                name: name.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            }),
        }
    }

    async fn start_execution(&self, name: &str, input: &str) -> Result<String> {
        let output = self
            .client
            .start_execution()
            .state_machine_arn(&self.state_machine_arn)
            .name(name)
            .input(input)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(StartExecutionError::is_execution_already_exists)
                {
                    EngineError::ExecutionExists(name.to_string())
                } else {
                    EngineError::Trigger {
                        name: name.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;
        Ok(output.execution_arn().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_arn() {
        assert_eq!(
            execution_arn(
                "arn:aws:states:us-east-1:111111111111:stateMachine:terraform-engine",
                "provision-pp-abc-r1"
            ),
            "arn:aws:states:us-east-1:111111111111:execution:terraform-engine:provision-pp-abc-r1"
        );
    }

    #[test]
    fn test_execution_arn_gov_partition() {
        assert_eq!(
            execution_arn(
                "arn:aws-us-gov:states:us-gov-west-1:1:stateMachine:sm",
                "update-pp-r2"
            ),
            "arn:aws-us-gov:states:us-gov-west-1:1:execution:sm:update-pp-r2"
        );
    }
}
