//! Patch operations: structural edits sent to the cluster as one batch.

use serde::{Deserialize, Serialize};

/// A single JSON-patch operation.
///
/// Only `replace` is ever produced; every op in a batch targets a distinct
/// image field, so a batch is order-independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    pub value: String,
}

impl PatchOp {
    pub fn replace(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: "replace".to_string(),
            path: path.into(),
            value: value.into(),
        }
    }
}
