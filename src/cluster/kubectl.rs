//! `kubectl`-backed cluster access.
//!
//! Each operation maps to one `kubectl` invocation. Output is requested as
//! JSON where there is any to read. When a context is configured it is passed
//! on every call, so the whole pass talks to one cluster even if the
//! kubeconfig's current context changes underneath it.

use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::model::{PatchOp, WorkloadDocument, WorkloadKind, WorkloadRef};

use super::{Cluster, ClusterError, Result, RolloutStatus};

/// Cluster access through the `kubectl` binary.
pub struct Kubectl {
    program: String,
    context: Option<String>,
}

/// JSON shape returned by `kubectl get … -o json` for several objects.
#[derive(Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<Value>,
}

impl Kubectl {
    pub fn new(program: impl Into<String>, context: Option<String>) -> Self {
        Self {
            program: program.into(),
            context,
        }
    }

    /// Fail early if the binary can't be run at all.
    pub fn ensure_available(&self) -> Result<()> {
        self.run(&["version", "--client"]).map(|_| ())
    }

    /// Run `kubectl` with the given args and return stdout.
    fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        if let Some(context) = &self.context {
            cmd.args(["--context", context.as_str()]);
        }
        cmd.args(args);
        tracing::debug!(program = %self.program, ?args, "running");

        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClusterError::ToolMissing(self.program.clone())
            } else {
                ClusterError::Spawn {
                    program: self.program.clone(),
                    source: e,
                }
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ClusterError::CommandFailed {
                program: self.program.clone(),
                command: describe(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn fetch_scope(&self, kinds: &str, namespace: Option<&str>) -> Result<Vec<WorkloadDocument>> {
        let mut args = vec!["get", kinds, "-o", "json"];
        match namespace {
            Some(ns) => args.extend(["--namespace", ns]),
            None => args.push("--all-namespaces"),
        }
        let json = self.run(&args)?;
        let list: ObjectList = serde_json::from_str(&json).map_err(|source| ClusterError::Decode {
            command: describe(&args),
            source,
        })?;

        let mut docs = Vec::with_capacity(list.items.len());
        for item in list.items {
            match WorkloadDocument::from_json(item) {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable object"),
            }
        }
        Ok(docs)
    }

    fn patch(&self, reference: &WorkloadRef, ops: &[PatchOp], dry_run: bool) -> Result<()> {
        let body = serde_json::to_string(ops).map_err(ClusterError::Encode)?;
        let mut args = vec![
            "patch",
            reference.kind.resource(),
            reference.name.as_str(),
            "--namespace",
            reference.namespace.as_str(),
            "--type",
            "json",
            "-p",
            body.as_str(),
        ];
        if dry_run {
            args.push("--dry-run=server");
        }
        self.run(&args).map(|_| ())
    }
}

impl Cluster for Kubectl {
    fn context_id(&self) -> Result<String> {
        if let Some(context) = &self.context {
            return Ok(context.clone());
        }
        let name = self.run(&["config", "current-context"])?;
        Ok(name.trim().to_string())
    }

    fn fetch(
        &self,
        kinds: &[WorkloadKind],
        namespaces: Option<&[String]>,
    ) -> Result<Vec<WorkloadDocument>> {
        let kinds = kinds
            .iter()
            .map(|k| k.resource())
            .collect::<Vec<_>>()
            .join(",");
        if kinds.is_empty() {
            return Ok(Vec::new());
        }

        // Only a listed namespace may be skipped; a failed cluster-wide list
        // would otherwise look like an empty cluster.
        let Some(namespaces) = namespaces else {
            return self.fetch_scope(&kinds, None);
        };

        let mut docs = Vec::new();
        for ns in namespaces {
            match self.fetch_scope(&kinds, Some(ns.as_str())) {
                Ok(found) => {
                    tracing::debug!(namespace = %ns, count = found.len(), "fetched");
                    docs.extend(found);
                }
                Err(e @ ClusterError::ToolMissing(_)) => return Err(e),
                Err(e) => tracing::warn!(namespace = %ns, error = %e, "skipping namespace"),
            }
        }
        Ok(docs)
    }

    fn get(&self, reference: &WorkloadRef) -> Result<Option<WorkloadDocument>> {
        let args = [
            "get",
            reference.kind.resource(),
            reference.name.as_str(),
            "--namespace",
            reference.namespace.as_str(),
            "--ignore-not-found",
            "-o",
            "json",
        ];
        let json = self.run(&args)?;
        if json.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(&json).map_err(|source| ClusterError::Decode {
            command: describe(&args),
            source,
        })?;
        match WorkloadDocument::from_json(value) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(%reference, error = %e, "live object undecodable");
                Ok(None)
            }
        }
    }

    fn live_uid(&self, reference: &WorkloadRef) -> Result<Option<String>> {
        let uid = self.run(&[
            "get",
            reference.kind.resource(),
            reference.name.as_str(),
            "--namespace",
            reference.namespace.as_str(),
            "--ignore-not-found",
            "-o",
            "jsonpath={.metadata.uid}",
        ])?;
        let uid = uid.trim();
        Ok((!uid.is_empty()).then(|| uid.to_string()))
    }

    fn dry_run_validate(&self, reference: &WorkloadRef, ops: &[PatchOp]) -> Result<()> {
        self.patch(reference, ops, true)
    }

    fn apply_patch(&self, reference: &WorkloadRef, ops: &[PatchOp]) -> Result<()> {
        self.patch(reference, ops, false)
    }

    fn wait_for_rollout(&self, reference: &WorkloadRef, timeout: Duration) -> RolloutStatus {
        let target = format!("{}/{}", reference.kind.resource(), reference.name);
        let timeout = format!("--timeout={}s", timeout_secs(timeout));
        let result = self.run(&[
            "rollout",
            "status",
            target.as_str(),
            "--namespace",
            reference.namespace.as_str(),
            timeout.as_str(),
        ]);
        match result {
            Ok(_) => RolloutStatus::Complete,
            Err(ClusterError::CommandFailed { stderr, .. }) if is_timeout(&stderr) => {
                RolloutStatus::TimedOut
            }
            Err(e) => RolloutStatus::Failed(e.to_string()),
        }
    }
}

/// Whole seconds for `--timeout`, rounded up, never zero.
fn timeout_secs(timeout: Duration) -> u64 {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    secs.max(1)
}

fn is_timeout(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("timed out")
}

/// Short form of a command line for error messages; skips patch bodies.
fn describe(args: &[&str]) -> String {
    args.iter()
        .take_while(|a| **a != "-p")
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}
