//! Product operation requests as delivered by the catalog.
//!
//! # Example body
//!
//! ```json
//! {
//!   "token": "965d4597-3088-41ae-87dc-3498daf1d69d",
//!   "operation": "PROVISION_PRODUCT",
//!   "provisionedProductId": "pp-ctfiwih3iodci",
//!   "provisionedProductName": "tf-s3-bucket-11261452",
//!   "recordId": "rec-rf5pmkrnabmx4",
//!   "launchRoleArn": "arn:aws:iam::111111111111:role/ServiceCatalogLaunchRole",
//!   "artifact": { "path": "S3://sc-.../out/...", "type": "AWS_S3" },
//!   "identity": { "principal": "AROA...", "awsAccountId": "111111111111", "organizationId": null },
//!   "parameters": [{ "key": "bucket_name_prefix", "value": "the-prefix-" }],
//!   "tags": [{ "key": "finops_project_name", "value": "project-a" }]
//! }
//! ```
//!
//! TERMINATE requests carry no `artifact`, `parameters` or `tags`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::notify::Correlation;

/// The only artifact location type the engine can read.
pub const ARTIFACT_TYPE_S3: &str = "AWS_S3";

// ─────────────────────────────────────────────────────────────────────────────
// Operation Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle action requested on a provisioned product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "PROVISION_PRODUCT")]
    Provision,
    #[serde(rename = "UPDATE_PROVISIONED_PRODUCT")]
    Update,
    #[serde(rename = "TERMINATE_PROVISIONED_PRODUCT")]
    Terminate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::Provision, Self::Update, Self::Terminate];

    /// Name used on the wire by the catalog.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Provision => "PROVISION_PRODUCT",
            Self::Update => "UPDATE_PROVISIONED_PRODUCT",
            Self::Terminate => "TERMINATE_PROVISIONED_PRODUCT",
        }
    }

    /// Prefix used in execution names.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Update => "update",
            Self::Terminate => "terminate",
        }
    }

    /// Whether this operation runs Terraform against a provisioning artifact.
    pub fn requires_artifact(self) -> bool {
        !matches!(self, Self::Terminate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for OperationKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name() == s)
            .ok_or_else(|| EngineError::UnknownOperation(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request parts
// ─────────────────────────────────────────────────────────────────────────────

/// Location of a provisioning artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
}

impl ArtifactRef {
    pub fn is_s3(&self) -> bool {
        self.artifact_type == ARTIFACT_TYPE_S3
    }
}

/// A `{key, value}` pair from the request's `parameters` or `tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIdentity {
    aws_account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    token: Option<String>,
    operation: Option<String>,
    provisioned_product_id: Option<String>,
    record_id: Option<String>,
    launch_role_arn: Option<String>,
    artifact: Option<ArtifactRef>,
    identity: Option<WireIdentity>,
    parameters: Option<Vec<KeyValue>>,
    tags: Option<Vec<KeyValue>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation Request
// ─────────────────────────────────────────────────────────────────────────────

/// A validated product operation request.
///
/// Keeps the original JSON document so that it can be forwarded to the state
/// machine unchanged, including fields the engine does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub token: String,
    pub record_id: String,
    /// Account the product is provisioned into.
    pub account_id: String,
    /// Provisioned product id (`pp-...`).
    pub instance_id: String,
    pub launch_role_arn: String,
    pub artifact: Option<ArtifactRef>,
    pub parameters: Vec<KeyValue>,
    /// `None` when the request has no `tags` field at all.
    pub tags: Option<Vec<KeyValue>>,
    document: Value,
}

impl OperationRequest {
    /// Parse and validate a queued message body.
    pub fn parse(body: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(body)
            .map_err(|e| EngineError::InvalidRequest(format!("body is not valid JSON: {e}")))?;
        Self::from_document(document)
    }

    /// Validate an already-decoded request document.
    pub fn from_document(document: Value) -> Result<Self> {
        let wire = WireRequest::deserialize(&document)
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;

        let kind: OperationKind = require(wire.operation, "operation")?.parse()?;
        let token = require(wire.token, "token")?;
        let record_id = require(wire.record_id, "recordId")?;
        let instance_id = require(wire.provisioned_product_id, "provisionedProductId")?;
        let launch_role_arn = require(wire.launch_role_arn, "launchRoleArn")?;
        let account_id = require(
            wire.identity.and_then(|i| i.aws_account_id),
            "identity.awsAccountId",
        )?;

        let request = Self {
            kind,
            token,
            record_id,
            account_id,
            instance_id,
            launch_role_arn,
            artifact: wire.artifact,
            parameters: wire.parameters.unwrap_or_default(),
            tags: wire.tags,
            document,
        };

        if kind.requires_artifact() && request.s3_artifact().is_none() {
            return Err(EngineError::InvalidRequest(
                "Could not load artifact S3 uri from product operation request".to_string(),
            ));
        }

        Ok(request)
    }

    /// The artifact reference, if present and stored in S3.
    pub fn s3_artifact(&self) -> Option<&ArtifactRef> {
        self.artifact.as_ref().filter(|a| a.is_s3())
    }

    /// The request exactly as received.
    pub fn document(&self) -> &Value {
        &self.document
    }
}

fn require(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(EngineError::InvalidRequest(format!(
            "missing required field '{field}'"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation Header
// ─────────────────────────────────────────────────────────────────────────────

/// The correlation subset of a request: enough to address a notification.
///
/// Outcome events and failed start attempts are read through this view so
/// that a notification can still be sent when the rest of the request is
/// unusable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHeader {
    pub operation: String,
    pub token: String,
    pub record_id: String,
}

impl OperationHeader {
    /// Read the header from a request document.
    pub fn from_document(document: &Value) -> Result<Self> {
        Self::deserialize(document).map_err(|e| EngineError::InvalidRequest(e.to_string()))
    }

    /// The parsed operation kind.
    pub fn kind(&self) -> Result<OperationKind> {
        self.operation.parse()
    }

    /// Split into the notification variant selector and the correlation pair.
    pub fn correlate(self) -> Result<(OperationKind, Correlation)> {
        let kind = self.kind()?;
        Ok((kind, Correlation::new(self.token, self.record_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provision_doc() -> Value {
        json!({
            "token": "t1",
            "operation": "PROVISION_PRODUCT",
            "provisionedProductId": "pp-abc",
            "provisionedProductName": "tf-s3-bucket",
            "recordId": "r1",
            "launchRoleArn": "arn:aws:iam::111111111111:role/Launch",
            "artifact": {"path": "S3://bucket/key", "type": "AWS_S3"},
            "identity": {"principal": "AROA", "awsAccountId": "111111111111", "organizationId": null},
            "parameters": [{"key": "size", "value": "10"}],
            "tags": [{"key": "team", "value": "a"}]
        })
    }

    #[test]
    fn test_operation_kind_wire_names() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.wire_name().parse::<OperationKind>().unwrap(), kind);
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.wire_name()));
        }
        assert_eq!(OperationKind::Update.short_name(), "update");
        assert!(!OperationKind::Terminate.requires_artifact());
    }

    #[test]
    fn test_unknown_operation_kind() {
        match "DESCRIBE_PRODUCT".parse::<OperationKind>().unwrap_err() {
            EngineError::UnknownOperation(op) => assert_eq!(op, "DESCRIBE_PRODUCT"),
            other => panic!("Expected UnknownOperation, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_provision_request() {
        let request = OperationRequest::from_document(provision_doc()).unwrap();
        assert_eq!(request.kind, OperationKind::Provision);
        assert_eq!(request.token, "t1");
        assert_eq!(request.record_id, "r1");
        assert_eq!(request.account_id, "111111111111");
        assert_eq!(request.instance_id, "pp-abc");
        assert_eq!(request.parameters, vec![KeyValue::new("size", "10")]);
        assert_eq!(request.tags.as_ref().unwrap().len(), 1);
        assert_eq!(request.document()["provisionedProductName"], "tf-s3-bucket");
    }

    #[test]
    fn test_terminate_without_artifact_is_accepted() {
        let doc = json!({
            "token": "t2",
            "operation": "TERMINATE_PROVISIONED_PRODUCT",
            "provisionedProductId": "pp-abc",
            "recordId": "r2",
            "launchRoleArn": "arn:aws:iam::111111111111:role/Launch",
            "identity": {"awsAccountId": "111111111111"}
        });
        let request = OperationRequest::from_document(doc).unwrap();
        assert!(request.artifact.is_none());
        assert!(request.parameters.is_empty());
        assert!(request.tags.is_none());
    }

    #[test]
    fn test_provision_and_update_require_artifact() {
        for op in ["PROVISION_PRODUCT", "UPDATE_PROVISIONED_PRODUCT"] {
            let mut doc = provision_doc();
            doc["operation"] = json!(op);
            doc.as_object_mut().unwrap().remove("artifact");
            let err = OperationRequest::from_document(doc).unwrap_err();
            assert!(err.to_string().contains("artifact S3 uri"), "{op}: {err}");
        }
    }

    #[test]
    fn test_non_s3_artifact_counts_as_missing() {
        let mut doc = provision_doc();
        doc["artifact"]["type"] = json!("GIT");
        assert!(OperationRequest::from_document(doc).is_err());
    }

    #[test]
    fn test_missing_required_fields() {
        for field in ["token", "recordId", "provisionedProductId", "launchRoleArn"] {
            let mut doc = provision_doc();
            doc.as_object_mut().unwrap().remove(field);
            let err = OperationRequest::from_document(doc).unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }

        let mut doc = provision_doc();
        doc["identity"] = json!({"principal": "AROA"});
        let err = OperationRequest::from_document(doc).unwrap_err();
        assert!(err.to_string().contains("identity.awsAccountId"));
    }

    #[test]
    fn test_unknown_operation_fails_request() {
        let mut doc = provision_doc();
        doc["operation"] = json!("IMPORT_PRODUCT");
        assert!(matches!(
            OperationRequest::from_document(doc),
            Err(EngineError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            OperationRequest::parse("not json"),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_header_correlates() {
        let header = OperationHeader::from_document(&provision_doc()).unwrap();
        let (kind, correlation) = header.correlate().unwrap();
        assert_eq!(kind, OperationKind::Provision);
        assert_eq!(correlation.token(), "t1");
        assert_eq!(correlation.record_id(), "r1");
    }

    #[test]
    fn test_header_with_unknown_operation() {
        let doc = json!({"operation": "X", "token": "t", "recordId": "r"});
        let header = OperationHeader::from_document(&doc).unwrap();
        assert!(header.correlate().is_err());
    }
}
