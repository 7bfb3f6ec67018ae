//! Build environment derivation.
//!
//! Turns a validated [`OperationRequest`] into the ordered list of environment
//! variables handed to the Terraform build. Every location is scoped by
//! account id and provisioned product id, so the same product keeps one state
//! file across provision, update and terminate while distinct products never
//! share one. Stderr captures are further scoped by record id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::request::OperationRequest;
use crate::uri::{ObjectUri, normalize_scheme};

pub const LAUNCH_ROLE_ARN: &str = "LAUNCH_ROLE_ARN";
pub const OPERATION: &str = "OPERATION";
pub const OUTPUTS_S3_URI: &str = "OUTPUTS_S3_URI";
pub const STDERR_S3_URI: &str = "STDERR_S3_URI";
pub const S3_BACKEND_JSON: &str = "S3_BACKEND_JSON";
pub const ARTIFACT_S3_URI: &str = "ARTIFACT_S3_URI";
pub const DEFAULT_TAGS_JSON: &str = "TF_VAR_default_tags_json";

/// Prefix Terraform uses to read input variables from the environment.
pub const TF_VAR_PREFIX: &str = "TF_VAR_";

// ─────────────────────────────────────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────────────────────────────────────

/// One `{Name, Value}` environment override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Ordered build environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildEnvironment(Vec<EnvVar>);

impl BuildEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(EnvVar {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Value of `name`. When a name repeats, the last entry wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<EnvVar> for BuildEnvironment {
    fn from_iter<I: IntoIterator<Item = EnvVar>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State Layout
// ─────────────────────────────────────────────────────────────────────────────

/// Object layout inside the Terraform state bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    bucket: String,
}

impl StateLayout {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn prefix(account_id: &str, instance_id: &str) -> String {
        format!("{account_id}/{instance_id}")
    }

    /// Key of the Terraform state file.
    pub fn state_key(&self, account_id: &str, instance_id: &str) -> String {
        format!("{}.tfstate", Self::prefix(account_id, instance_id))
    }

    /// Where the build writes `terraform output -json`.
    pub fn outputs_uri(&self, account_id: &str, instance_id: &str) -> ObjectUri {
        ObjectUri::new(
            &self.bucket,
            format!("{}.tfoutputs.json", Self::prefix(account_id, instance_id)),
        )
    }

    /// Where the build writes Terraform's stderr for one record.
    pub fn stderr_uri(&self, account_id: &str, instance_id: &str, record_id: &str) -> ObjectUri {
        ObjectUri::new(
            &self.bucket,
            format!(
                "{}-{record_id}.stderr.txt",
                Self::prefix(account_id, instance_id)
            ),
        )
    }

    /// Terraform backend configuration in `.tf.json` form.
    ///
    /// State is read and written with the build's own role (`default`
    /// profile); resource calls use the launch role.
    pub fn backend_json(&self, account_id: &str, instance_id: &str) -> Value {
        json!({
            "terraform": {
                "backend": {
                    "s3": {
                        "bucket": self.bucket,
                        "key": self.state_key(account_id, instance_id),
                        "profile": "default",
                    }
                }
            }
        })
    }
}

/// Derive the build environment for a request.
pub fn derive_environment(request: &OperationRequest, layout: &StateLayout) -> Result<BuildEnvironment> {
    let account = request.account_id.as_str();
    let instance = request.instance_id.as_str();

    let mut env = BuildEnvironment::new();
    env.push(LAUNCH_ROLE_ARN, &request.launch_role_arn);
    env.push(OPERATION, request.kind.wire_name());
    env.push(OUTPUTS_S3_URI, layout.outputs_uri(account, instance).to_string());
    env.push(
        STDERR_S3_URI,
        layout
            .stderr_uri(account, instance, &request.record_id)
            .to_string(),
    );
    env.push(
        S3_BACKEND_JSON,
        serde_json::to_string(&layout.backend_json(account, instance))?,
    );

    if let Some(artifact) = request.s3_artifact() {
        env.push(ARTIFACT_S3_URI, normalize_scheme(&artifact.path)?);
    }

    if let Some(tags) = &request.tags {
        let merged: Map<String, Value> = tags
            .iter()
            .map(|t| (t.key.clone(), Value::String(t.value.clone())))
            .collect();
        env.push(DEFAULT_TAGS_JSON, serde_json::to_string(&merged)?);
    }

    for param in &request.parameters {
        env.push(format!("{TF_VAR_PREFIX}{}", param.key), &param.value);
    }

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::OperationRequest;
    use serde_json::json;

    fn request(extra: Value) -> OperationRequest {
        let mut doc = json!({
            "token": "t1",
            "operation": "PROVISION_PRODUCT",
            "provisionedProductId": "pp-abc",
            "recordId": "r1",
            "launchRoleArn": "arn:aws:iam::111111111111:role/Launch",
            "artifact": {"path": "S3://bucket/key", "type": "AWS_S3"},
            "identity": {"awsAccountId": "111111111111"},
        });
        for (k, v) in extra.as_object().unwrap() {
            doc[k] = v.clone();
        }
        OperationRequest::from_document(doc).unwrap()
    }

    fn layout() -> StateLayout {
        StateLayout::new("tf-state")
    }

    #[test]
    fn test_core_entries() {
        let env = derive_environment(&request(json!({})), &layout()).unwrap();
        assert_eq!(
            env.get(LAUNCH_ROLE_ARN),
            Some("arn:aws:iam::111111111111:role/Launch")
        );
        assert_eq!(env.get(OPERATION), Some("PROVISION_PRODUCT"));
        assert_eq!(
            env.get(OUTPUTS_S3_URI),
            Some("s3://tf-state/111111111111/pp-abc.tfoutputs.json")
        );
        assert_eq!(
            env.get(STDERR_S3_URI),
            Some("s3://tf-state/111111111111/pp-abc-r1.stderr.txt")
        );
        assert_eq!(env.get(ARTIFACT_S3_URI), Some("s3://bucket/key"));

        let backend: Value = serde_json::from_str(env.get(S3_BACKEND_JSON).unwrap()).unwrap();
        assert_eq!(backend["terraform"]["backend"]["s3"]["bucket"], "tf-state");
        assert_eq!(
            backend["terraform"]["backend"]["s3"]["key"],
            "111111111111/pp-abc.tfstate"
        );
        assert_eq!(backend["terraform"]["backend"]["s3"]["profile"], "default");
    }

    #[test]
    fn test_one_entry_per_parameter() {
        let req = request(json!({
            "parameters": [
                {"key": "size", "value": "10"},
                {"key": "name", "value": "demo"},
            ]
        }));
        let env = derive_environment(&req, &layout()).unwrap();
        let vars: Vec<_> = env
            .iter()
            .filter(|v| v.name.starts_with(TF_VAR_PREFIX) && v.name != DEFAULT_TAGS_JSON)
            .collect();
        assert_eq!(vars.len(), 2);
        assert_eq!(env.get("TF_VAR_size"), Some("10"));
        assert_eq!(env.get("TF_VAR_name"), Some("demo"));
    }

    #[test]
    fn test_tags_entry_only_when_tags_present() {
        let without = derive_environment(&request(json!({})), &layout()).unwrap();
        assert!(without.get(DEFAULT_TAGS_JSON).is_none());

        let with = derive_environment(
            &request(json!({"tags": [
                {"key": "finops_project_name", "value": "project-a"},
                {"key": "finops_project_number", "value": "2222"},
            ]})),
            &layout(),
        )
        .unwrap();
        assert_eq!(with.iter().filter(|v| v.name == DEFAULT_TAGS_JSON).count(), 1);
        let tags: Value = serde_json::from_str(with.get(DEFAULT_TAGS_JSON).unwrap()).unwrap();
        assert_eq!(
            tags,
            json!({"finops_project_name": "project-a", "finops_project_number": "2222"})
        );

        let empty = derive_environment(&request(json!({"tags": []})), &layout()).unwrap();
        assert_eq!(empty.get(DEFAULT_TAGS_JSON), Some("{}"));
    }

    #[test]
    fn test_state_key_is_stable_across_operations() {
        let provision = request(json!({}));
        let terminate = OperationRequest::from_document(json!({
            "token": "t9",
            "operation": "TERMINATE_PROVISIONED_PRODUCT",
            "provisionedProductId": "pp-abc",
            "recordId": "r9",
            "launchRoleArn": "arn:aws:iam::111111111111:role/Launch",
            "identity": {"awsAccountId": "111111111111"},
        }))
        .unwrap();

        let a = derive_environment(&provision, &layout()).unwrap();
        let b = derive_environment(&terminate, &layout()).unwrap();
        assert_eq!(a.get(S3_BACKEND_JSON), b.get(S3_BACKEND_JSON));
        assert_eq!(a.get(OUTPUTS_S3_URI), b.get(OUTPUTS_S3_URI));
        assert_ne!(a.get(STDERR_S3_URI), b.get(STDERR_S3_URI));
        assert!(b.get(ARTIFACT_S3_URI).is_none());
    }

    #[test]
    fn test_environment_serializes_as_name_value_list() {
        let mut env = BuildEnvironment::new();
        env.push("A", "1");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!([{"Name": "A", "Value": "1"}]));
        let back: BuildEnvironment = serde_json::from_value(value).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let mut env = BuildEnvironment::new();
        env.push("TF_VAR_x", "1");
        env.push("TF_VAR_x", "2");
        assert_eq!(env.get("TF_VAR_x"), Some("2"));
        assert_eq!(env.len(), 2);
    }
}
