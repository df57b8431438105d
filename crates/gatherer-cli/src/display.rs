//! Output helpers
//!
//! Commands that act on several clusters print one JSON object keyed by
//! cluster name; a single cluster prints its value bare.

use miette::IntoDiagnostic;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Print per-cluster results as pretty JSON
pub fn print_by_cluster<T: Serialize>(results: Vec<(String, T)>) -> Result<()> {
    let value = by_cluster(results)?;
    let json = serde_json::to_string_pretty(&value).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

fn by_cluster<T: Serialize>(mut results: Vec<(String, T)>) -> Result<Value> {
    if results.len() == 1 {
        if let Some((_, value)) = results.pop() {
            return Ok(serde_json::to_value(value).into_diagnostic()?);
        }
    }

    let mut map = Map::new();
    for (cluster, value) in results {
        map.insert(cluster, serde_json::to_value(value).into_diagnostic()?);
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_cluster_is_bare() {
        let value = by_cluster(vec![("prod".to_string(), json!({"total": 3}))]).unwrap();
        assert_eq!(value, json!({"total": 3}));
    }

    #[test]
    fn test_multiple_clusters_are_keyed() {
        let value = by_cluster(vec![
            ("prod".to_string(), json!(1)),
            ("lab".to_string(), json!(2)),
        ])
        .unwrap();
        assert_eq!(value, json!({"prod": 1, "lab": 2}));
    }
}
