//! The cluster collaborator: everything the migration needs from Kubernetes.
//!
//! The orchestrator only talks to [`Cluster`]. The shipped implementation
//! drives `kubectl` (see [`kubectl`]); tests use an in-memory fake.

#[cfg(test)]
pub mod fake;
mod kubectl;

use std::io;
use std::time::Duration;

use crate::model::{PatchOp, WorkloadDocument, WorkloadKind, WorkloadRef};

pub use kubectl::Kubectl;

/// Errors from talking to the cluster.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("required tool '{0}' was not found on PATH")]
    ToolMissing(String),

    #[error("failed to run {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("{program} {command} failed: {stderr}")]
    CommandFailed {
        program: String,
        command: String,
        stderr: String,
    },

    #[error("unexpected output from {command}: {source}")]
    Decode {
        command: String,
        source: serde_json::Error,
    },

    #[error("failed to encode patch: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, ClusterError>;

/// How a rollout wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutStatus {
    Complete,
    Failed(String),
    TimedOut,
}

/// Operations the migration consumes from the cluster.
///
/// Every call is blocking. A pass makes them one resource at a time.
pub trait Cluster {
    /// Identifier of the cluster/environment the calls go to.
    fn context_id(&self) -> Result<String>;

    /// Workloads of `kinds`, limited to `namespaces` when given.
    ///
    /// A listed namespace that can't be read contributes nothing; it does not
    /// fail the whole fetch. Without a namespace list, a failed read is an
    /// error.
    fn fetch(
        &self,
        kinds: &[WorkloadKind],
        namespaces: Option<&[String]>,
    ) -> Result<Vec<WorkloadDocument>>;

    /// The live document for one workload, or `None` if it no longer exists.
    fn get(&self, reference: &WorkloadRef) -> Result<Option<WorkloadDocument>>;

    /// The live uid of one workload, or `None` if it no longer exists.
    fn live_uid(&self, reference: &WorkloadRef) -> Result<Option<String>>;

    /// Ask the cluster whether `ops` would be accepted, without mutating.
    fn dry_run_validate(&self, reference: &WorkloadRef, ops: &[PatchOp]) -> Result<()>;

    /// Apply `ops` as one batch.
    fn apply_patch(&self, reference: &WorkloadRef, ops: &[PatchOp]) -> Result<()>;

    /// Block until the workload's rollout finishes or `timeout` elapses.
    fn wait_for_rollout(&self, reference: &WorkloadRef, timeout: Duration) -> RolloutStatus;
}
