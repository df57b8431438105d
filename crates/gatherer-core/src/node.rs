//! Node capacity extraction from raw Node objects

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const LABEL_MASTER: &str = "node-role.kubernetes.io/master";
const LABEL_CONTROL_PLANE: &str = "node-role.kubernetes.io/control-plane";
const LABEL_INFRA: &str = "node-role.kubernetes.io/infra";
const LABEL_INSTANCE_TYPE: &str = "node.kubernetes.io/instance-type";
const LABEL_ZONE: &str = "topology.kubernetes.io/zone";

/// Role of a node, derived from well-known labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Infra,
    Worker,
}

impl NodeRole {
    /// Classify by label presence: control plane wins over infra, anything else is a worker
    pub fn from_labels(labels: Option<&serde_json::Map<String, Value>>) -> Self {
        let has = |label: &str| labels.is_some_and(|l| l.contains_key(label));
        if has(LABEL_MASTER) || has(LABEL_CONTROL_PLANE) {
            NodeRole::Master
        } else if has(LABEL_INFRA) {
            NodeRole::Infra
        } else {
            NodeRole::Worker
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Master => "master",
            NodeRole::Infra => "infra",
            NodeRole::Worker => "worker",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "master" => Some(NodeRole::Master),
            "infra" => Some(NodeRole::Infra),
            "worker" => Some(NodeRole::Worker),
            _ => None,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// cpu/memory/storage/pods quantities, unit suffixes preserved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuantities {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
    pub pods: Option<String>,
}

impl ResourceQuantities {
    fn from_status(section: Option<&Value>) -> Self {
        let get = |key: &str| {
            section
                .and_then(|s| s.get(key))
                .and_then(Value::as_str)
                .map(String::from)
        };
        Self {
            cpu: get("cpu"),
            memory: get("memory"),
            storage: get("ephemeral-storage"),
            pods: get("pods"),
        }
    }
}

/// Capacity facts of one node, as stored in the node capacity table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub node_name: String,
    pub role: NodeRole,
    pub capacity: ResourceQuantities,
    pub allocatable: ResourceQuantities,
    pub instance_type: Option<String>,
    pub zone: Option<String>,
    pub os_image: Option<String>,
    pub kernel_version: Option<String>,
    pub container_runtime: Option<String>,
}

impl NodeCapacity {
    /// Extract capacity facts from a raw (non-normalized) Node object
    pub fn from_manifest(node_name: &str, node: &Value) -> Self {
        let status = node.get("status");
        let labels = node
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(Value::as_object);
        let label = |key: &str| {
            labels
                .and_then(|l| l.get(key))
                .and_then(Value::as_str)
                .map(String::from)
        };
        let node_info = |key: &str| {
            status
                .and_then(|s| s.get("nodeInfo"))
                .and_then(|i| i.get(key))
                .and_then(Value::as_str)
                .map(String::from)
        };

        Self {
            node_name: node_name.to_string(),
            role: NodeRole::from_labels(labels),
            capacity: ResourceQuantities::from_status(status.and_then(|s| s.get("capacity"))),
            allocatable: ResourceQuantities::from_status(
                status.and_then(|s| s.get("allocatable")),
            ),
            instance_type: label(LABEL_INSTANCE_TYPE),
            zone: label(LABEL_ZONE),
            os_image: node_info("osImage"),
            kernel_version: node_info("kernelVersion"),
            container_runtime: node_info("containerRuntimeVersion"),
        }
    }
}
