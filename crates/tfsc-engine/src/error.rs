//! Error types for the provisioning engine.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while coordinating a product operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The operation request is malformed or incomplete.
    #[error("Invalid operation request: {0}")]
    InvalidRequest(String),

    /// The operation kind is not one of the three supported operations.
    #[error("Unknown product operation '{0}'")]
    UnknownOperation(String),

    /// A storage location could not be parsed.
    #[error("Invalid S3 URI '{0}'")]
    InvalidUri(String),

    /// The requested object does not exist.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Object storage call failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Temporary credentials could not be obtained.
    #[error("Failed to assume role '{role_arn}': {message}")]
    Credentials { role_arn: String, message: String },

    /// The workflow backend rejected or failed the start call.
    #[error("Failed to start execution '{name}': {message}")]
    Trigger { name: String, message: String },

    /// An execution with the same name has already been started.
    #[error("Execution '{0}' already exists")]
    ExecutionExists(String),

    /// The catalog notification call failed.
    #[error("Notification failed: {0}")]
    Notify(String),

    /// The artifact is not stored in a supported location type.
    #[error("Unknown artifact type '{0}', expected 'AWS_S3'")]
    UnsupportedArtifact(String),

    /// The artifact archive could not be unpacked.
    #[error("Artifact extraction failed: {0}")]
    Archive(String),

    /// The declared-variables manifest is missing or unparsable.
    #[error(
        "Provisioning artifact (product version) parameters could not be loaded from file '{filename}': {message}"
    )]
    Manifest { filename: String, message: String },

    /// The Terraform outputs document is malformed.
    #[error("Invalid terraform outputs document: {0}")]
    Outputs(String),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
