//! Manifest normalization
//!
//! Strips fields the API server mutates on its own (status, bookkeeping
//! metadata, tool annotations) so that only user-meaningful changes alter
//! the content hash of a stored manifest.

use serde_json::Value;

/// Top-level keys removed entirely
const REMOVE_TOP_LEVEL: &[&str] = &["status"];

/// Metadata fields that churn on every server-side write
const STRIP_METADATA_FIELDS: &[&str] = &[
    "managedFields",
    "creationTimestamp",
    "resourceVersion",
    "uid",
    "generation",
];

/// Annotation prefixes injected by kubectl, the deployment controller and OpenShift
const SYSTEM_ANNOTATION_PREFIXES: &[&str] = &[
    "kubectl.kubernetes.io/",
    "deployment.kubernetes.io/",
    "openshift.io/generated-by",
];

/// Return a normalized copy of a raw resource object.
///
/// The input is never modified. Applying `normalize` to its own output
/// yields the same value.
pub fn normalize(raw: &Value) -> Value {
    let mut base = raw.clone();

    let Some(obj) = base.as_object_mut() else {
        return base;
    };

    for key in REMOVE_TOP_LEVEL {
        obj.remove(*key);
    }

    if let Some(meta) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in STRIP_METADATA_FIELDS {
            meta.remove(*field);
        }

        let filtered = meta
            .get_mut("annotations")
            .and_then(Value::as_object_mut)
            .map(|annotations| {
                annotations.retain(|key, _| !is_system_annotation(key));
                annotations.is_empty()
            });

        // Drop the key when nothing survives, so "no annotations" and
        // "only system annotations" hash identically.
        if filtered != Some(false) {
            meta.remove("annotations");
        }
    }

    base
}

fn is_system_annotation(key: &str) -> bool {
    SYSTEM_ANNOTATION_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}
