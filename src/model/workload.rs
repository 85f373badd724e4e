//! Workload types: what the migration reads from the cluster.
//!
//! Documents are decoded from the cluster's JSON into a typed shape per kind.
//! Container lists are decoded leniently: a missing or non-sequence list is
//! empty, and a malformed entry keeps its index but carries no image, so patch
//! paths always line up with the live document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The workload kinds the migration knows how to patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    CronJob,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::Deployment,
        WorkloadKind::DaemonSet,
        WorkloadKind::StatefulSet,
        WorkloadKind::CronJob,
    ];

    /// The lowercase resource name the cluster tooling accepts.
    pub fn resource(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::DaemonSet => "daemonset",
            Self::StatefulSet => "statefulset",
            Self::CronJob => "cronjob",
        }
    }

    /// Whether a template change triggers a rollout the cluster reports on.
    ///
    /// A cron job's template only takes effect on its next scheduled run.
    pub fn has_rollout(self) -> bool {
        !matches!(self, Self::CronJob)
    }

    /// Structural pointer to the pod spec inside a document of this kind.
    pub fn pod_spec_path(self) -> &'static str {
        match self {
            Self::CronJob => "/spec/jobTemplate/spec/template/spec",
            Self::Deployment | Self::DaemonSet | Self::StatefulSet => "/spec/template/spec",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deployment => "Deployment",
            Self::DaemonSet => "DaemonSet",
            Self::StatefulSet => "StatefulSet",
            Self::CronJob => "CronJob",
        };
        f.write_str(name)
    }
}

/// Error returned when a string names no supported workload kind.
#[derive(Debug, thiserror::Error)]
#[error("unknown workload kind '{0}' (expected deployment, daemonset, statefulset or cronjob)")]
pub struct UnknownKind(pub String);

impl FromStr for WorkloadKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deployment" | "deployments" | "deploy" => Ok(Self::Deployment),
            "daemonset" | "daemonsets" | "ds" => Ok(Self::DaemonSet),
            "statefulset" | "statefulsets" | "sts" => Ok(Self::StatefulSet),
            "cronjob" | "cronjobs" | "cj" => Ok(Self::CronJob),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Identifies one workload within a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// One container entry from a pod template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// The two container sequences of a pod template, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    #[serde(default, deserialize_with = "lenient_containers")]
    pub containers: Vec<ContainerSpec>,
    #[serde(default, deserialize_with = "lenient_containers")]
    pub init_containers: Vec<ContainerSpec>,
}

/// A workload as read from the cluster during one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadDocument {
    pub reference: WorkloadRef,

    /// Cluster-assigned identity; changes when the object is recreated.
    pub uid: String,

    pub template: PodTemplateSpec,
}

/// Error decoding a workload object.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("object has unsupported kind '{0}'")]
    UnsupportedKind(String),

    #[error("object metadata is missing or malformed: {0}")]
    Metadata(serde_json::Error),
}

#[derive(Deserialize)]
struct RawObject {
    #[serde(default)]
    kind: String,
    metadata: RawMetadata,
    #[serde(default)]
    spec: Value,
}

#[derive(Deserialize)]
struct RawMetadata {
    name: String,
    #[serde(default = "default_namespace")]
    namespace: String,
    #[serde(default)]
    uid: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

// spec.template.spec
#[derive(Deserialize)]
struct TemplateHolder {
    template: PodHolder,
}

#[derive(Deserialize)]
struct PodHolder {
    #[serde(default)]
    spec: PodTemplateSpec,
}

// spec.jobTemplate.spec.template.spec
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CronJobHolder {
    job_template: JobHolder,
}

#[derive(Deserialize)]
struct JobHolder {
    spec: TemplateHolder,
}

impl WorkloadDocument {
    /// Decode one object from the cluster's JSON representation.
    ///
    /// Identity must decode; the pod template is best effort. A template that
    /// doesn't have the expected shape decodes as empty and plans no change.
    pub fn from_json(value: Value) -> Result<Self, DocumentError> {
        let raw: RawObject = serde_json::from_value(value).map_err(DocumentError::Metadata)?;
        let kind: WorkloadKind = raw
            .kind
            .parse()
            .map_err(|_| DocumentError::UnsupportedKind(raw.kind.clone()))?;

        let template = match kind {
            WorkloadKind::CronJob => serde_json::from_value::<CronJobHolder>(raw.spec)
                .map(|h| h.job_template.spec.template.spec),
            _ => serde_json::from_value::<TemplateHolder>(raw.spec).map(|h| h.template.spec),
        }
        .unwrap_or_else(|e| {
            tracing::debug!(%kind, name = %raw.metadata.name, error = %e, "pod template not decodable");
            PodTemplateSpec::default()
        });

        Ok(Self {
            reference: WorkloadRef {
                kind,
                namespace: raw.metadata.namespace,
                name: raw.metadata.name,
            },
            uid: raw.metadata.uid,
            template,
        })
    }
}

/// Decode a container list without failing on malformed input.
fn lenient_containers<'de, D>(deserializer: D) -> Result<Vec<ContainerSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let image = item.get("image").and_then(Value::as_str).map(String::from);
            ContainerSpec { name, image }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn parse_kinds_case_insensitively() {
        assert_eq!("Deployment".parse::<WorkloadKind>().unwrap(), WorkloadKind::Deployment);
        assert_eq!("ds".parse::<WorkloadKind>().unwrap(), WorkloadKind::DaemonSet);
        assert_eq!("STATEFULSETS".parse::<WorkloadKind>().unwrap(), WorkloadKind::StatefulSet);
        assert_eq!(" cronjob ".parse::<WorkloadKind>().unwrap(), WorkloadKind::CronJob);
        assert!("ReplicaSet".parse::<WorkloadKind>().is_err());
    }

    #[test]
    fn only_cronjob_lacks_rollout() {
        for kind in WorkloadKind::ALL {
            assert_eq!(kind.has_rollout(), kind != WorkloadKind::CronJob);
        }
    }

    #[test]
    fn decode_deployment() {
        let doc = WorkloadDocument::from_json(json!({
            "kind": "Deployment",
            "metadata": { "name": "web", "namespace": "shop", "uid": "u-1" },
            "spec": { "template": { "spec": {
                "containers": [{ "name": "app", "image": "bitnami/nginx:1" }],
                "initContainers": [{ "name": "init", "image": "busybox" }]
            }}}
        }))
        .unwrap();

        assert_eq!(doc.reference.kind, WorkloadKind::Deployment);
        assert_eq!(doc.reference.namespace, "shop");
        assert_eq!(doc.uid, "u-1");
        assert_eq!(doc.template.containers[0].image.as_deref(), Some("bitnami/nginx:1"));
        assert_eq!(doc.template.init_containers[0].name, "init");
    }

    #[test]
    fn decode_cronjob_nested_template() {
        let doc = WorkloadDocument::from_json(json!({
            "kind": "CronJob",
            "metadata": { "name": "backup", "namespace": "ops", "uid": "u-2" },
            "spec": { "jobTemplate": { "spec": { "template": { "spec": {
                "containers": [{ "name": "dump", "image": "bitnami/postgresql:16" }]
            }}}}}
        }))
        .unwrap();

        assert_eq!(doc.template.containers.len(), 1);
        assert_eq!(doc.template.containers[0].name, "dump");
    }

    #[test]
    fn malformed_container_lists_decode_as_empty() {
        let doc = WorkloadDocument::from_json(json!({
            "kind": "StatefulSet",
            "metadata": { "name": "db", "namespace": "data", "uid": "u-3" },
            "spec": { "template": { "spec": {
                "containers": "not-a-list",
                "initContainers": { "name": "odd" }
            }}}
        }))
        .unwrap();

        assert!(doc.template.containers.is_empty());
        assert!(doc.template.init_containers.is_empty());
    }

    #[test]
    fn malformed_entry_keeps_its_index() {
        let doc = WorkloadDocument::from_json(json!({
            "kind": "DaemonSet",
            "metadata": { "name": "agent", "namespace": "kube-system", "uid": "u-4" },
            "spec": { "template": { "spec": {
                "containers": [42, { "name": "b", "image": "bitnami/x:1" }]
            }}}
        }))
        .unwrap();

        assert_eq!(doc.template.containers.len(), 2);
        assert_eq!(doc.template.containers[0].image, None);
        assert_eq!(doc.template.containers[1].image.as_deref(), Some("bitnami/x:1"));
    }

    #[test]
    fn missing_template_decodes_as_empty() {
        let doc = WorkloadDocument::from_json(json!({
            "kind": "Deployment",
            "metadata": { "name": "bare", "namespace": "default", "uid": "u-5" }
        }))
        .unwrap();

        assert_eq!(doc.template, PodTemplateSpec::default());
    }

    #[test]
    fn unsupported_kind_is_rejected() {
        let err = WorkloadDocument::from_json(json!({
            "kind": "Job",
            "metadata": { "name": "once", "namespace": "default", "uid": "u-6" }
        }))
        .unwrap_err();

        assert!(matches!(err, DocumentError::UnsupportedKind(_)));
    }
}
