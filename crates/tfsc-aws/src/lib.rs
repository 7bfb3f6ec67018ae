//! AWS implementations of the engine's client traits.
//!
//! | trait | adapter | service |
//! |---|---|---|
//! | `ObjectStore` | [`S3Store`] | S3 |
//! | `RoleAssumer` | [`StsRoleAssumer`] | STS, then S3 |
//! | `WorkflowBackend` | [`StepFunctionsBackend`] | Step Functions |
//! | `CatalogNotifier` | [`ServiceCatalogNotifier`] | Service Catalog |
//!
//! SDK errors are rendered with `DisplayErrorContext` so the full source
//! chain ends up in the engine error message.

pub mod catalog;
pub mod s3;
pub mod sfn;
pub mod sts;

pub use aws_config::SdkConfig;
pub use catalog::ServiceCatalogNotifier;
pub use s3::S3Store;
pub use sfn::StepFunctionsBackend;
pub use sts::StsRoleAssumer;

/// Load shared SDK configuration from the default provider chain.
pub async fn load_sdk_config() -> SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}
