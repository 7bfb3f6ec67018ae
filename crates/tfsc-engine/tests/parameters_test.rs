//! Integration tests for artifact parameter discovery.

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tfsc_config::ParserConfig;
use tfsc_engine::{
    ArtifactRef, EngineError, MemoryStore, ParameterExtractor, ParameterRequest,
    StaticRoleAssumer,
};
use zip::write::SimpleFileOptions;

const ARTIFACT_URI: &str = "s3://sc-artifacts/out/product-v1";
const LAUNCH_ROLE: &str = "arn:aws:iam::111111111111:role/ServiceCatalogLaunchRole";

fn archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn manifest() -> String {
    json!({
        "variable": {
            "bucket_prefix": {"type": "string", "description": "Prefix for the bucket name"},
            "size": {"type": "number", "default": 10},
            "password": {"type": "string", "sensitive": true},
        }
    })
    .to_string()
}

fn request(artifact_type: &str) -> ParameterRequest {
    ParameterRequest {
        artifact: ArtifactRef {
            path: ARTIFACT_URI.to_string(),
            artifact_type: artifact_type.to_string(),
        },
        launch_role_arn: LAUNCH_ROLE.to_string(),
    }
}

fn setup(
    scratch: &Path,
    store: MemoryStore,
) -> (ParameterExtractor, Arc<StaticRoleAssumer>) {
    let assumer = Arc::new(StaticRoleAssumer::new(Arc::new(store)));
    let config = ParserConfig {
        variables_filename: "variables.tf.json".to_string(),
        session_name: "parameter-parser".to_string(),
        scratch_dir: scratch.to_path_buf(),
    };
    (ParameterExtractor::new(assumer.clone(), config), assumer)
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_extracts_parameters_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::new().with_object(
        ARTIFACT_URI,
        archive(&[("main.tf", "# empty"), ("variables.tf.json", &manifest())]),
    );
    let (extractor, assumer) = setup(tmp.path(), store);

    let response = extractor.extract(&request("AWS_S3"), "req-1").await.unwrap();
    let keys: Vec<_> = response.parameters.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["bucket_prefix", "size", "password"]);
    assert_eq!(response.parameters[0].description, "Prefix for the bucket name");
    assert_eq!(response.parameters[1].default_value, "10");
    assert_eq!(response.parameters[1].description, "No description provided");
    assert!(response.parameters[2].is_no_echo);

    assert_eq!(
        assumer.calls(),
        vec![(LAUNCH_ROLE.to_string(), "parameter-parser".to_string())]
    );
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_manifest_is_read_from_archive_root() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::new().with_object(
        ARTIFACT_URI,
        archive(&[("module/variables.tf.json", &manifest())]),
    );
    let (extractor, _) = setup(tmp.path(), store);

    let err = extractor.extract(&request("AWS_S3"), "req-2").await.unwrap_err();
    assert!(matches!(err, EngineError::Manifest { .. }));
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_missing_manifest_names_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::new().with_object(ARTIFACT_URI, archive(&[("main.tf", "")]));
    let (extractor, _) = setup(tmp.path(), store);

    let err = extractor.extract(&request("AWS_S3"), "req-3").await.unwrap_err();
    assert!(err.to_string().contains("'variables.tf.json'"));
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_unparsable_manifest_is_cleaned_up() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::new().with_object(
        ARTIFACT_URI,
        archive(&[("variables.tf.json", "variable \"x\" {}")]),
    );
    let (extractor, _) = setup(tmp.path(), store);

    let err = extractor.extract(&request("AWS_S3"), "req-4").await.unwrap_err();
    assert!(matches!(err, EngineError::Manifest { .. }));
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_corrupt_archive_is_cleaned_up() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::new().with_object(ARTIFACT_URI, "not a zip");
    let (extractor, _) = setup(tmp.path(), store);

    let err = extractor.extract(&request("AWS_S3"), "req-5").await.unwrap_err();
    assert!(matches!(err, EngineError::Archive(_)));
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_manifest_without_variables() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::new()
        .with_object(ARTIFACT_URI, archive(&[("variables.tf.json", "{}")]));
    let (extractor, _) = setup(tmp.path(), store);

    let response = extractor.extract(&request("AWS_S3"), "req-6").await.unwrap();
    assert!(response.parameters.is_empty());
}

#[tokio::test]
async fn test_unsupported_artifact_is_rejected_before_assuming_role() {
    let tmp = tempfile::tempdir().unwrap();
    let (extractor, assumer) = setup(tmp.path(), MemoryStore::new());

    let err = extractor
        .extract(&request("MARKETPLACE_AMI"), "req-7")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unknown artifact type 'MARKETPLACE_AMI', expected 'AWS_S3'"
    );
    assert!(assumer.calls().is_empty());
}

#[tokio::test]
async fn test_credential_failure_leaves_no_scratch() {
    let tmp = tempfile::tempdir().unwrap();
    let (extractor, assumer) = setup(tmp.path(), MemoryStore::new());
    assumer.fail_with("AccessDenied");

    let err = extractor.extract(&request("AWS_S3"), "req-8").await.unwrap_err();
    assert!(matches!(err, EngineError::Credentials { .. }));
    assert!(scratch_is_empty(tmp.path()));
}
