//! S3-backed object store.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
use tfsc_engine::{EngineError, ObjectStore, ObjectUri, Result};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Reads objects from S3 with the client's credentials.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self::from_client(Client::new(config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn get_object(&self, uri: &ObjectUri) -> Result<GetObjectOutput> {
        debug!(%uri, "s3 get_object");
        self.client
            .get_object()
            .bucket(&uri.bucket)
            .key(&uri.key)
            .send()
            .await
            .map_err(|e| get_object_error(uri, e))
    }
}

fn get_object_error(uri: &ObjectUri, err: SdkError<GetObjectError>) -> EngineError {
    if err.as_service_error().is_some_and(GetObjectError::is_no_such_key) {
        return EngineError::ObjectNotFound(uri.to_string());
    }
    EngineError::Storage(format!("{uri}: {}", DisplayErrorContext(&err)))
}

fn body_error(uri: &ObjectUri, err: impl std::error::Error) -> EngineError {
    EngineError::Storage(format!("{uri}: {}", DisplayErrorContext(&err)))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>> {
        let output = self.get_object(uri).await?;
        let data = output.body.collect().await.map_err(|e| body_error(uri, e))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn download(&self, uri: &ObjectUri, dest: &Path) -> Result<()> {
        let mut body = self.get_object(uri).await?.body;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0usize;
        while let Some(chunk) = body.try_next().await.map_err(|e| body_error(uri, e))? {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;
        debug!(%uri, dest = %dest.display(), size = written, "object downloaded");
        Ok(())
    }
}
