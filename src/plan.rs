//! Patch planning: find every container image that needs rewriting.
//!
//! Planning walks `containers` then `initContainers`, each in index order, so
//! the same document always yields the same ops in the same order.

use std::fmt;

use crate::model::{ContainerSpec, PatchOp, WorkloadDocument, WorkloadKind};
use crate::rewrite::{needs_rewrite, rewrite};

/// Which container sequence of the pod template a change lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSection {
    Containers,
    InitContainers,
}

impl ContainerSection {
    fn field(self) -> &'static str {
        match self {
            Self::Containers => "containers",
            Self::InitContainers => "initContainers",
        }
    }
}

impl fmt::Display for ContainerSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// One image that needs to move, with enough context to show and patch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageChange {
    pub section: ContainerSection,
    pub index: usize,
    pub container: String,
    pub from: String,
    pub to: String,
}

impl ImageChange {
    /// Pointer to this change's `image` field in a document of `kind`.
    pub fn path(&self, kind: WorkloadKind) -> String {
        format!(
            "{}/{}/{}/image",
            kind.pod_spec_path(),
            self.section.field(),
            self.index
        )
    }

    pub fn to_op(&self, kind: WorkloadKind) -> PatchOp {
        PatchOp::replace(self.path(kind), self.to.clone())
    }
}

/// Every image change `doc` needs, in deterministic order.
pub fn changes(doc: &WorkloadDocument) -> Vec<ImageChange> {
    let mut out = Vec::new();
    collect(ContainerSection::Containers, &doc.template.containers, &mut out);
    collect(
        ContainerSection::InitContainers,
        &doc.template.init_containers,
        &mut out,
    );
    out
}

/// The patch that migrates `doc`. Empty when nothing needs to change.
pub fn plan(doc: &WorkloadDocument) -> Vec<PatchOp> {
    changes(doc)
        .iter()
        .map(|c| c.to_op(doc.reference.kind))
        .collect()
}

fn collect(section: ContainerSection, containers: &[ContainerSpec], out: &mut Vec<ImageChange>) {
    for (index, container) in containers.iter().enumerate() {
        let Some(image) = container.image.as_deref() else {
            continue;
        };
        if needs_rewrite(image) {
            out.push(ImageChange {
                section,
                index,
                container: container.name.clone(),
                from: image.to_string(),
                to: rewrite(image),
            });
        }
    }
}
