//! Kind catalogue: maps a resource kind to its API coordinates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the sync engine treats items of a kind beyond storing the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KindBehavior {
    /// Manifest snapshot only
    #[default]
    Workload,
    /// Manifest snapshot plus a row in the node capacity table
    NodeCapacity,
}

/// Resolved API coordinates for one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSpec {
    pub api_version: String,
    pub plural: String,
    pub namespaced: bool,
    #[serde(default)]
    pub behavior: KindBehavior,
}

impl KindSpec {
    pub fn new(api_version: &str, plural: &str, namespaced: bool) -> Self {
        Self {
            api_version: api_version.to_string(),
            plural: plural.to_string(),
            namespaced,
            behavior: KindBehavior::Workload,
        }
    }

    fn with_behavior(mut self, behavior: KindBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Split `group/version` into its parts; the core group has no prefix
    pub fn group_version(&self) -> (Option<&str>, &str) {
        match self.api_version.split_once('/') {
            Some((group, version)) => (Some(group), version),
            None => (None, self.api_version.as_str()),
        }
    }

    /// REST path of the collection, optionally restricted to one namespace
    pub fn collection_path(&self, namespace: Option<&str>) -> String {
        let prefix = match self.group_version() {
            (None, version) => format!("/api/{}", version),
            (Some(group), version) => format!("/apis/{}/{}", group, version),
        };
        match namespace {
            Some(ns) => format!("{}/namespaces/{}/{}", prefix, ns, self.plural),
            None => format!("{}/{}", prefix, self.plural),
        }
    }
}

/// Kinds known out of the box
pub fn static_kinds() -> BTreeMap<String, KindSpec> {
    [
        ("Deployment", KindSpec::new("apps/v1", "deployments", true)),
        ("StatefulSet", KindSpec::new("apps/v1", "statefulsets", true)),
        ("DaemonSet", KindSpec::new("apps/v1", "daemonsets", true)),
        ("Job", KindSpec::new("batch/v1", "jobs", true)),
        ("CronJob", KindSpec::new("batch/v1", "cronjobs", true)),
        (
            "DeploymentConfig",
            KindSpec::new("apps.openshift.io/v1", "deploymentconfigs", true),
        ),
        (
            "BuildConfig",
            KindSpec::new("build.openshift.io/v1", "buildconfigs", true),
        ),
        ("ConfigMap", KindSpec::new("v1", "configmaps", true)),
        (
            "Node",
            KindSpec::new("v1", "nodes", false).with_behavior(KindBehavior::NodeCapacity),
        ),
    ]
    .into_iter()
    .map(|(kind, spec)| (kind.to_string(), spec))
    .collect()
}

/// Resolve requested kinds against the static catalogue extended by `custom`.
///
/// Unknown kinds are dropped. A custom entry overrides the coordinates of a
/// static kind but keeps its behavior.
pub fn resolve_kinds(
    include: &[String],
    custom: &BTreeMap<String, KindSpec>,
) -> BTreeMap<String, KindSpec> {
    let catalogue = static_kinds();
    let mut resolved = BTreeMap::new();

    for kind in include {
        let spec = match (custom.get(kind), catalogue.get(kind)) {
            (Some(custom), Some(known)) => custom.clone().with_behavior(known.behavior),
            (Some(custom), None) => custom.clone(),
            (None, Some(known)) => known.clone(),
            (None, None) => {
                tracing::warn!(kind = %kind, "unknown kind requested, ignoring");
                continue;
            }
        };
        resolved.insert(kind.clone(), spec);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_paths() {
        let deploy = KindSpec::new("apps/v1", "deployments", true);
        assert_eq!(deploy.collection_path(None), "/apis/apps/v1/deployments");
        assert_eq!(
            deploy.collection_path(Some("team-a")),
            "/apis/apps/v1/namespaces/team-a/deployments"
        );

        let nodes = KindSpec::new("v1", "nodes", false);
        assert_eq!(nodes.collection_path(None), "/api/v1/nodes");
        assert_eq!(nodes.group_version(), (None, "v1"));
    }

    #[test]
    fn test_node_behavior() {
        let kinds = static_kinds();
        assert_eq!(kinds["Node"].behavior, KindBehavior::NodeCapacity);
        assert!(!kinds["Node"].namespaced);
        assert_eq!(kinds["Deployment"].behavior, KindBehavior::Workload);
    }

    #[test]
    fn test_resolve_drops_unknown() {
        let include = vec!["Deployment".to_string(), "Bogus".to_string()];
        let resolved = resolve_kinds(&include, &BTreeMap::new());
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key("Deployment"));
    }

    #[test]
    fn test_resolve_custom_kinds() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "Route".to_string(),
            KindSpec::new("route.openshift.io/v1", "routes", true),
        );
        custom.insert("Node".to_string(), KindSpec::new("v1", "nodes", false));

        let include = vec!["Route".to_string(), "Node".to_string()];
        let resolved = resolve_kinds(&include, &custom);

        assert_eq!(
            resolved["Route"].collection_path(None),
            "/apis/route.openshift.io/v1/routes"
        );
        assert_eq!(resolved["Node"].behavior, KindBehavior::NodeCapacity);
    }
}
