//! In-memory cluster for orchestrator tests.
//!
//! Holds workload documents, applies patches to them, and records every
//! mutating call so tests can assert on what the orchestrator did.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::model::{PatchOp, WorkloadDocument, WorkloadKind, WorkloadRef};

use super::{Cluster, ClusterError, Result, RolloutStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Validate(String),
    Apply(String),
    Rollout(String),
}

#[derive(Default)]
pub struct FakeCluster {
    pub context: String,
    docs: RefCell<Vec<WorkloadDocument>>,
    calls: RefCell<Vec<Call>>,
    reject_validation: RefCell<HashSet<String>>,
    reject_apply: RefCell<HashSet<String>>,
    fail_get: RefCell<HashSet<String>>,
    rollouts: RefCell<HashMap<String, RolloutStatus>>,
}

impl FakeCluster {
    pub fn new(context: &str, docs: Vec<WorkloadDocument>) -> Self {
        Self {
            context: context.to_string(),
            docs: RefCell::new(docs),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn doc(&self, name: &str) -> WorkloadDocument {
        self.docs
            .borrow()
            .iter()
            .find(|d| d.reference.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no document named {name}"))
    }

    pub fn reject_validation(&self, name: &str) {
        self.reject_validation.borrow_mut().insert(name.to_string());
    }

    pub fn reject_apply(&self, name: &str) {
        self.reject_apply.borrow_mut().insert(name.to_string());
    }

    /// Reads of this workload (`get`, `live_uid`) fail as if the API refused them.
    pub fn fail_get(&self, name: &str) {
        self.fail_get.borrow_mut().insert(name.to_string());
    }

    pub fn set_rollout(&self, name: &str, status: RolloutStatus) {
        self.rollouts.borrow_mut().insert(name.to_string(), status);
    }

    /// An external actor sets a container image directly.
    pub fn set_image(&self, name: &str, index: usize, image: &str) {
        let mut docs = self.docs.borrow_mut();
        let doc = docs
            .iter_mut()
            .find(|d| d.reference.name == name)
            .unwrap_or_else(|| panic!("no document named {name}"));
        doc.template.containers[index].image = Some(image.to_string());
    }

    /// The object is deleted and created again under a new uid.
    pub fn recreate(&self, name: &str, uid: &str) {
        let mut docs = self.docs.borrow_mut();
        if let Some(doc) = docs.iter_mut().find(|d| d.reference.name == name) {
            doc.uid = uid.to_string();
        }
    }

    pub fn delete(&self, name: &str) {
        self.docs.borrow_mut().retain(|d| d.reference.name != name);
    }

    fn find(&self, reference: &WorkloadRef) -> Option<WorkloadDocument> {
        self.docs
            .borrow()
            .iter()
            .find(|d| &d.reference == reference)
            .cloned()
    }

    fn rejected(name: &str, what: &str) -> ClusterError {
        ClusterError::CommandFailed {
            program: "fake".to_string(),
            command: format!("{what} {name}"),
            stderr: "rejected".to_string(),
        }
    }
}

impl Cluster for FakeCluster {
    fn context_id(&self) -> Result<String> {
        Ok(self.context.clone())
    }

    fn fetch(
        &self,
        kinds: &[WorkloadKind],
        namespaces: Option<&[String]>,
    ) -> Result<Vec<WorkloadDocument>> {
        Ok(self
            .docs
            .borrow()
            .iter()
            .filter(|d| kinds.contains(&d.reference.kind))
            .filter(|d| namespaces.is_none_or(|ns| ns.contains(&d.reference.namespace)))
            .cloned()
            .collect())
    }

    fn get(&self, reference: &WorkloadRef) -> Result<Option<WorkloadDocument>> {
        if self.fail_get.borrow().contains(&reference.name) {
            return Err(Self::rejected(&reference.name, "get"));
        }
        Ok(self.find(reference))
    }

    fn live_uid(&self, reference: &WorkloadRef) -> Result<Option<String>> {
        if self.fail_get.borrow().contains(&reference.name) {
            return Err(Self::rejected(&reference.name, "get"));
        }
        Ok(self.find(reference).map(|d| d.uid))
    }

    fn dry_run_validate(&self, reference: &WorkloadRef, _ops: &[PatchOp]) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::Validate(reference.name.clone()));
        if self.reject_validation.borrow().contains(&reference.name) {
            return Err(Self::rejected(&reference.name, "validate"));
        }
        Ok(())
    }

    fn apply_patch(&self, reference: &WorkloadRef, ops: &[PatchOp]) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::Apply(reference.name.clone()));
        if self.reject_apply.borrow().contains(&reference.name) {
            return Err(Self::rejected(&reference.name, "apply"));
        }
        let mut docs = self.docs.borrow_mut();
        let Some(doc) = docs.iter_mut().find(|d| &d.reference == reference) else {
            return Err(Self::rejected(&reference.name, "apply"));
        };
        for op in ops {
            let mut parts = op.path.rsplit('/');
            let (_, index, section) = (parts.next(), parts.next(), parts.next());
            let index: usize = index.and_then(|i| i.parse().ok()).unwrap_or(usize::MAX);
            let list = match section {
                Some("initContainers") => &mut doc.template.init_containers,
                _ => &mut doc.template.containers,
            };
            if let Some(container) = list.get_mut(index) {
                container.image = Some(op.value.clone());
            }
        }
        Ok(())
    }

    fn wait_for_rollout(&self, reference: &WorkloadRef, _timeout: Duration) -> RolloutStatus {
        self.calls
            .borrow_mut()
            .push(Call::Rollout(reference.name.clone()));
        self.rollouts
            .borrow()
            .get(&reference.name)
            .cloned()
            .unwrap_or(RolloutStatus::Complete)
    }
}
