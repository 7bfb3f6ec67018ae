//! Artifact parameter discovery.
//!
//! The catalog asks for the parameter schema of a product version before any
//! request exists. The artifact is a zip of Terraform configuration; its
//! declared variables are read from a JSON manifest inside the archive and
//! turned into [`ParameterDescriptor`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tfsc_config::ParserConfig;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::outcome::{NO_DESCRIPTION, stringify};
use crate::request::ArtifactRef;
use crate::storage::SharedStore;
use crate::uri::ObjectUri;

/// Type reported for a variable that declares none.
pub const DEFAULT_PARAMETER_TYPE: &str = "any";

/// A parameter discovery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRequest {
    pub artifact: ArtifactRef,
    pub launch_role_arn: String,
}

/// One configurable input of a product version.
///
/// Every field is always serialized; the catalog rejects responses that
/// omit any of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub key: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    pub default_value: String,
    pub is_no_echo: bool,
}

/// Response to a parameter discovery call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterResponse {
    pub parameters: Vec<ParameterDescriptor>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Role Assumption
// ─────────────────────────────────────────────────────────────────────────────

/// Obtains an object store acting as another role.
///
/// Credentials are obtained on every call and never cached.
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<SharedStore>;
}

/// A role assumer that can be shared across tasks.
pub type SharedAssumer = Arc<dyn RoleAssumer>;

/// Role assumer that hands out one fixed store and records every call.
pub struct StaticRoleAssumer {
    store: SharedStore,
    calls: Mutex<Vec<(String, String)>>,
    failing: Mutex<Option<String>>,
}

impl StaticRoleAssumer {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(None),
        }
    }

    /// Make every subsequent call fail.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failing.lock() = Some(message.into());
    }

    /// `(role_arn, session_name)` of every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RoleAssumer for StaticRoleAssumer {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<SharedStore> {
        self.calls
            .lock()
            .push((role_arn.to_string(), session_name.to_string()));
        if let Some(message) = self.failing.lock().clone() {
            return Err(EngineError::Credentials {
                role_arn: role_arn.to_string(),
                message,
            });
        }
        Ok(Arc::clone(&self.store))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scratch Area
// ─────────────────────────────────────────────────────────────────────────────

/// Per-invocation scratch paths.
///
/// [`ScratchArea::clean`] removes both without blocking the runtime. Drop
/// only removes what an interrupted invocation left behind.
struct ScratchArea {
    archive: PathBuf,
    dir: PathBuf,
    cleaned: bool,
}

impl ScratchArea {
    fn new(root: &Path, invocation_id: &str) -> Result<Self> {
        let id: String = invocation_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if id.is_empty() {
            return Err(EngineError::InvalidRequest("empty invocation id".to_string()));
        }
        Ok(Self {
            archive: root.join(format!("{id}.zip")),
            dir: root.join(id),
            cleaned: false,
        })
    }

    async fn clean(&mut self) {
        if let Err(e) = tokio::fs::remove_file(&self.archive).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.archive.display(), error = %e, "failed to remove artifact archive");
            }
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.dir.display(), error = %e, "failed to remove artifact directory");
            }
        }
        self.cleaned = true;
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        if self.archive.exists() {
            if let Err(e) = std::fs::remove_file(&self.archive) {
                warn!(path = %self.archive.display(), error = %e, "failed to remove artifact archive");
            }
        }
        if self.dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.dir) {
                warn!(path = %self.dir.display(), error = %e, "failed to remove artifact directory");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extractor
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the parameter schema of a provisioning artifact.
pub struct ParameterExtractor {
    assumer: SharedAssumer,
    config: ParserConfig,
}

impl ParameterExtractor {
    pub fn new(assumer: SharedAssumer, config: ParserConfig) -> Self {
        Self { assumer, config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Discover the parameters of `request.artifact`.
    ///
    /// `invocation_id` scopes the scratch area; concurrent invocations must
    /// pass distinct ids.
    pub async fn extract(&self, request: &ParameterRequest, invocation_id: &str) -> Result<ParameterResponse> {
        if !request.artifact.is_s3() {
            return Err(EngineError::UnsupportedArtifact(
                request.artifact.artifact_type.clone(),
            ));
        }
        let uri = ObjectUri::parse(&request.artifact.path)?;
        let mut scratch = ScratchArea::new(&self.config.scratch_dir, invocation_id)?;

        let result = self.discover(request, &uri, &scratch).await;
        scratch.clean().await;
        result
    }

    async fn discover(
        &self,
        request: &ParameterRequest,
        uri: &ObjectUri,
        scratch: &ScratchArea,
    ) -> Result<ParameterResponse> {
        let store = self
            .assumer
            .assume_role(&request.launch_role_arn, &self.config.session_name)
            .await?;

        info!(%uri, dest = %scratch.archive.display(), "downloading provisioning artifact");
        store.download(uri, &scratch.archive).await?;

        info!(
            archive = %scratch.archive.display(),
            dir = %scratch.dir.display(),
            "extracting provisioning artifact"
        );
        unpack(scratch.archive.clone(), scratch.dir.clone()).await?;
        tokio::fs::remove_file(&scratch.archive).await?;

        let manifest_path = scratch.dir.join(&self.config.variables_filename);
        info!(path = %manifest_path.display(), "loading declared variables");
        let manifest = tokio::fs::read_to_string(&manifest_path)
            .await
            .map_err(|e| self.manifest_error(e))?;
        let document: Value = serde_json::from_str(&manifest).map_err(|e| self.manifest_error(e))?;

        let parameters = descriptors_from_manifest(&document).map_err(|e| self.manifest_error(e))?;
        debug!(count = parameters.len(), "parameters discovered");
        Ok(ParameterResponse { parameters })
    }

    fn manifest_error(&self, err: impl std::fmt::Display) -> EngineError {
        EngineError::Manifest {
            filename: self.config.variables_filename.clone(),
            message: err.to_string(),
        }
    }
}

async fn unpack(archive: PathBuf, dir: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&archive)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| EngineError::Archive(e.to_string()))?;
        zip.extract(&dir)
            .map_err(|e| EngineError::Archive(e.to_string()))?;
        debug!(entries = zip.len(), dir = %dir.display(), "artifact extracted");
        Ok(())
    })
    .await
    .map_err(|e| EngineError::Archive(e.to_string()))?
}

/// Convert a declared-variables manifest into parameter descriptors.
///
/// Reads the top-level `variable` object; a manifest without one declares
/// no parameters. Non-string defaults and types are JSON encoded.
pub fn descriptors_from_manifest(manifest: &Value) -> Result<Vec<ParameterDescriptor>> {
    let empty = Map::new();
    let variables = match manifest.get("variable") {
        None => &empty,
        Some(Value::Object(vars)) => vars,
        Some(_) => {
            return Err(EngineError::InvalidRequest(
                "manifest 'variable' is not an object".to_string(),
            ));
        }
    };

    variables
        .iter()
        .map(|(key, block)| {
            let param_type = match block.get("type") {
                Some(t) => stringify(t)?,
                None => DEFAULT_PARAMETER_TYPE.to_string(),
            };
            let default_value = match block.get("default") {
                Some(d) => stringify(d)?,
                None => String::new(),
            };
            Ok(ParameterDescriptor {
                key: key.clone(),
                param_type,
                description: block
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or(NO_DESCRIPTION)
                    .to_string(),
                default_value,
                is_no_echo: block
                    .get("sensitive")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect()
}
