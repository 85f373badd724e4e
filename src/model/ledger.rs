//! Ledger types: immutable facts about a resource's migration progress.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{WorkloadDocument, WorkloadKind, WorkloadRef};

/// Lifecycle phase recorded for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// A patch is about to be sent. `extra` holds the planned ops.
    Applying,

    /// The cluster accepted the patch.
    Applied,

    /// The rollout completed (or the kind has none). The resource is done.
    Verified,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Verified => "verified",
        })
    }
}

/// "This exact resource in this exact cluster."
///
/// A recreated object gets a new uid, so facts recorded against the old
/// incarnation never match it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub context: String,
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl Fingerprint {
    pub fn new(context: &str, reference: &WorkloadRef, uid: &str) -> Self {
        Self {
            context: context.to_string(),
            kind: reference.kind,
            namespace: reference.namespace.clone(),
            name: reference.name.clone(),
            uid: uid.to_string(),
        }
    }

    pub fn of(context: &str, doc: &WorkloadDocument) -> Self {
        Self::new(context, &doc.reference, &doc.uid)
    }
}

/// One line of the ledger file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ts: Timestamp,
    pub phase: Phase,
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
    pub context: String,
    pub uid: String,
    #[serde(default)]
    pub extra: Value,
}

impl LedgerEntry {
    /// A new entry stamped with the current time.
    pub fn now(phase: Phase, fingerprint: &Fingerprint, extra: Value) -> Self {
        Self {
            ts: Timestamp::now(),
            phase,
            kind: fingerprint.kind,
            namespace: fingerprint.namespace.clone(),
            name: fingerprint.name.clone(),
            context: fingerprint.context.clone(),
            uid: fingerprint.uid.clone(),
            extra,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            context: self.context.clone(),
            kind: self.kind,
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            uid: self.uid.clone(),
        }
    }
}
