//! Configuration sections.
//!
//! Each Lambda handler resolves only the section it needs, once, at startup:
//!
//! | section | variables |
//! |---|---|
//! | [`CoordinatorConfig`] | `TFSTATE_BUCKET_NAME`, `STATE_MACHINE_ARN` |
//! | [`ParserConfig`] | `VARIABLES_TF_JSON_FILENAME`, `AWS_LAMBDA_FUNCTION_NAME`, `TFSC_SCRATCH_DIR` |
//! | [`LogConfig`] | `TFSC_LOG`, `TFSC_LOG_FORMAT` |

use std::path::PathBuf;

use serde::Serialize;

use crate::env::{self, EnvLookup, ProcessEnv};
use crate::{ConfigError, Result};

/// Session name used for role assumption when the function name is unknown.
pub const DEFAULT_SESSION_NAME: &str = "cross-acct";

/// Default scratch directory (the only writable path inside Lambda).
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp";

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the operation-start handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorConfig {
    /// Bucket holding Terraform state, outputs and stderr captures.
    pub state_bucket: String,
    /// State machine that runs the Terraform build.
    pub state_machine_arn: String,
}

impl CoordinatorConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Resolve from an arbitrary lookup.
    pub fn from_lookup(env: &dyn EnvLookup) -> Result<Self> {
        let state_bucket = env::required(env, env::TFSTATE_BUCKET_NAME, "terraform state bucket")?;
        if state_bucket.contains('/') {
            return Err(ConfigError::Invalid {
                var: env::TFSTATE_BUCKET_NAME.to_string(),
                message: format!("'{state_bucket}' is not a bucket name"),
            });
        }
        let state_machine_arn =
            env::required(env, env::STATE_MACHINE_ARN, "provisioning state machine")?;
        if !state_machine_arn.starts_with("arn:") {
            return Err(ConfigError::Invalid {
                var: env::STATE_MACHINE_ARN.to_string(),
                message: format!("'{state_machine_arn}' is not an ARN"),
            });
        }
        Ok(Self {
            state_bucket,
            state_machine_arn,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter parser
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the artifact parameter parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParserConfig {
    /// Manifest file name looked up at the root of an unpacked artifact.
    pub variables_filename: String,
    /// Session name for the assumed launch role.
    pub session_name: String,
    /// Parent directory for per-invocation scratch space.
    pub scratch_dir: PathBuf,
}

impl ParserConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Resolve from an arbitrary lookup.
    pub fn from_lookup(env: &dyn EnvLookup) -> Result<Self> {
        let variables_filename = env::required(
            env,
            env::VARIABLES_TF_JSON_FILENAME,
            "declared-variables manifest file name",
        )?;
        if variables_filename.contains("..") || variables_filename.starts_with('/') {
            return Err(ConfigError::Invalid {
                var: env::VARIABLES_TF_JSON_FILENAME.to_string(),
                message: format!("'{variables_filename}' must be a path relative to the artifact root"),
            });
        }
        let session_name = env::optional(env, env::AWS_LAMBDA_FUNCTION_NAME)
            .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
        let scratch_dir = env::optional(env, env::TFSC_SCRATCH_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR));
        Ok(Self {
            variables_filename,
            session_name,
            scratch_dir,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line (CloudWatch friendly).
    #[default]
    Json,
    /// Human-readable text.
    Text,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LogConfig {
    /// Explicit filter directive; `None` means use the built-in default.
    pub filter: Option<String>,
    /// Output format.
    pub format: LogFormat,
}

impl LogConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Resolve from an arbitrary lookup.
    pub fn from_lookup(env: &dyn EnvLookup) -> Result<Self> {
        let format = match env::optional(env, env::TFSC_LOG_FORMAT) {
            None => LogFormat::default(),
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: env::TFSC_LOG_FORMAT.to_string(),
                    message: format!("expected 'json' or 'text', got '{other}'"),
                });
            }
        };
        Ok(Self {
            filter: env::optional(env, env::TFSC_LOG),
            format,
        })
    }
}
