//! Configuration for the tfsc provisioning engine.
//!
//! All settings come from environment variables (the Lambda configuration
//! surface). Sections are resolved once per process and treated as read-only:
//! - [`CoordinatorConfig`] for the operation-start handler
//! - [`ParserConfig`] for the artifact parameter parser
//! - [`LogConfig`] for the tracing subscriber

pub mod env;
pub mod error;
pub mod types;

pub use env::{EnvLookup, ProcessEnv};
pub use error::{ConfigError, Result};
pub use types::*;
