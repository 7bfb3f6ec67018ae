//! S3 object locations.

use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};

const SCHEME: &str = "s3://";

/// A bucket + key pair addressed as `s3://bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUri {
    pub bucket: String,
    pub key: String,
}

impl ObjectUri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse an `s3://bucket/key` location. The scheme is matched case-insensitively.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = strip_scheme(uri).ok_or_else(|| EngineError::InvalidUri(uri.to_string()))?;
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(bucket, key))
            }
            _ => Err(EngineError::InvalidUri(uri.to_string())),
        }
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl FromStr for ObjectUri {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Rewrite any case variant of the `s3://` scheme to lowercase.
///
/// The catalog hands out artifact paths such as `S3://bucket/key`, which
/// the Terraform build cannot consume.
pub fn normalize_scheme(uri: &str) -> Result<String> {
    let rest = strip_scheme(uri).ok_or_else(|| EngineError::InvalidUri(uri.to_string()))?;
    Ok(format!("{SCHEME}{rest}"))
}

fn strip_scheme(uri: &str) -> Option<&str> {
    let head = uri.get(..SCHEME.len())?;
    if head.eq_ignore_ascii_case(SCHEME) {
        uri.get(SCHEME.len()..)
    } else {
        None
    }
}
