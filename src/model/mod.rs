//! Core data model for the migration.
//!
//! These types cover what is read from the cluster (workloads and their
//! pod templates), what is sent back (patch operations), and what is
//! recorded (ledger entries keyed by fingerprint).

mod ledger;
mod patch;
mod workload;

pub use ledger::{Fingerprint, LedgerEntry, Phase};
pub use patch::PatchOp;
pub use workload::{ContainerSpec, UnknownKind, WorkloadDocument, WorkloadKind, WorkloadRef};

#[cfg(test)]
pub use workload::PodTemplateSpec;
