//! Cross-account role assumption through STS.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::error::DisplayErrorContext;
use tfsc_engine::{EngineError, Result, RoleAssumer, SharedStore};
use tracing::info;

use crate::s3::S3Store;

const PROVIDER_NAME: &str = "tfsc-assumed-role";

/// Assumes a role with STS and returns an [`S3Store`] acting as that role.
#[derive(Debug, Clone)]
pub struct StsRoleAssumer {
    sdk_config: SdkConfig,
    client: aws_sdk_sts::Client,
}

impl StsRoleAssumer {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
            client: aws_sdk_sts::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<SharedStore> {
        info!(role_arn, session_name, "assuming role");
        let output = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| EngineError::Credentials {
                role_arn: role_arn.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let creds = output.credentials().ok_or_else(|| EngineError::Credentials {
            role_arn: role_arn.to_string(),
            message: "response carried no credentials".to_string(),
        })?;

        let credentials = aws_sdk_s3::config::Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            SystemTime::try_from(*creds.expiration()).ok(),
            PROVIDER_NAME,
        );
        let config = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .credentials_provider(credentials)
            .build();

        Ok(Arc::new(S3Store::from_client(aws_sdk_s3::Client::from_conf(
            config,
        ))))
    }
}
