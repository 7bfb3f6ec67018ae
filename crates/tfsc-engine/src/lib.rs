//! Provisioning workflow coordinator for Terraform-backed catalog products.
//!
//! This crate holds the engine's logic with every cloud call behind a trait,
//! so it runs unchanged against AWS (`tfsc-aws`) or the in-memory fakes in
//! this crate.
//!
//! # Architecture
//!
//! ```text
//! queue ──► Coordinator ──► WorkflowBackend ──► (Terraform build)
//!             │  normalize, derive env,                │
//!             │  start named execution                 ▼
//!             │                              success / failure event
//!             ▼                                        │
//!       CatalogNotifier ◄──────── OutcomeReporter ◄────┘
//!       (FAILED on start error)   (outputs / stderr via ObjectStore)
//!
//! catalog ──► ParameterExtractor ──► RoleAssumer ──► ObjectStore (artifact zip)
//! ```

pub mod coordinator;
pub mod environment;
pub mod error;
pub mod notify;
pub mod outcome;
pub mod parameters;
pub mod protocol;
pub mod request;
pub mod storage;
pub mod uri;
pub mod workflow;

pub use coordinator::{Coordinator, PlannedExecution, TriggerOutcome};
pub use environment::{BuildEnvironment, EnvVar, StateLayout, derive_environment};
pub use error::{EngineError, Result};
pub use notify::{
    CatalogNotifier, Correlation, Notification, NotificationStatus, RecordOutput,
    RecordingNotifier, ResourceIdentifier, SharedNotifier, UniqueTag,
};
pub use outcome::{OutcomeReporter, PLACEHOLDER_RESOURCE_ARN};
pub use parameters::{
    ParameterDescriptor, ParameterExtractor, ParameterRequest, ParameterResponse, RoleAssumer,
    SharedAssumer, StaticRoleAssumer,
};
pub use protocol::{BuildOverrides, ExecutionInput, FailureEvent, SuccessEvent};
pub use request::{ArtifactRef, KeyValue, OperationHeader, OperationKind, OperationRequest};
pub use storage::{MemoryStore, ObjectStore, SharedStore};
pub use uri::ObjectUri;
pub use workflow::{MockWorkflow, SharedWorkflow, WorkflowBackend, execution_name};
