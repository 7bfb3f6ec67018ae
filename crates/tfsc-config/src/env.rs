//! Environment variable lookup.
//!
//! Every section is resolved through an [`EnvLookup`] so that tests can supply
//! a fixed map instead of mutating the process environment.

use std::collections::HashMap;

use crate::{ConfigError, Result};

/// Name of the Terraform state bucket variable.
pub const TFSTATE_BUCKET_NAME: &str = "TFSTATE_BUCKET_NAME";

/// ARN of the provisioning state machine.
pub const STATE_MACHINE_ARN: &str = "STATE_MACHINE_ARN";

/// File name of the declared-variables manifest inside a provisioning artifact.
pub const VARIABLES_TF_JSON_FILENAME: &str = "VARIABLES_TF_JSON_FILENAME";

/// Set by the Lambda runtime; used as the assumed-role session name.
pub const AWS_LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Directory for per-invocation artifact scratch space.
pub const TFSC_SCRATCH_DIR: &str = "TFSC_SCRATCH_DIR";

/// Log filter directive (tracing `EnvFilter` syntax).
pub const TFSC_LOG: &str = "TFSC_LOG";

/// Log output format: `json` or `text`.
pub const TFSC_LOG_FORMAT: &str = "TFSC_LOG_FORMAT";

/// Source of environment values.
pub trait EnvLookup {
    /// Returns the raw value of `var`, if set.
    fn get(&self, var: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, var: &str) -> Option<String> {
        std::env::var(var).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn get(&self, var: &str) -> Option<String> {
        HashMap::get(self, var).cloned()
    }
}

impl EnvLookup for HashMap<&str, &str> {
    fn get(&self, var: &str) -> Option<String> {
        HashMap::get(self, var).map(|v| v.to_string())
    }
}

/// Look up a variable, treating an empty or whitespace-only value as unset.
pub fn optional(env: &dyn EnvLookup, var: &str) -> Option<String> {
    env.get(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Look up a variable that must be present.
pub fn required(env: &dyn EnvLookup, var: &str, purpose: &str) -> Result<String> {
    optional(env, var).ok_or_else(|| ConfigError::Missing {
        var: var.to_string(),
        purpose: purpose.to_string(),
    })
}
