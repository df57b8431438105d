//! Integration tests for CLI commands

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Helper to run data-gatherer
fn gatherer(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_data-gatherer"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("DATA_GATHERER_CONFIG")
        .output()
        .expect("Failed to execute data-gatherer")
}

/// Write a config whose storage lives inside `dir`
fn write_config(dir: &Path) -> PathBuf {
    let config = format!(
        r#"
clusters:
  - name: prod
    kubeconfig: {dir}/kubeconfig
  - name: lab
    credentials:
      host: https://api.lab.example:6443
      token: not-a-real-token
storage:
  base_dir: {dir}/clusters
logging:
  level: warn
  format: text
"#,
        dir = dir.display()
    );
    let path = dir.join("config.yaml");
    std::fs::write(&path, config).unwrap();
    path
}

mod kinds_command {
    use super::*;

    #[test]
    fn test_kinds_json() {
        let output = gatherer(&["kinds", "--json"]);
        assert!(output.status.success());

        let json: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
        assert_eq!(json["Deployment"]["api_version"], "apps/v1");
        assert_eq!(json["Node"]["namespaced"], false);
        assert_eq!(json["Node"]["behavior"], "node_capacity");
    }

    #[test]
    fn test_kinds_table() {
        let output = gatherer(&["kinds"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("DeploymentConfig"));
        assert!(stdout.contains("apps.openshift.io/v1"));
    }
}

mod config_errors {
    use super::*;

    #[test]
    fn test_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let output = gatherer(&["status", "--all-clusters", "--config", missing.to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_unknown_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let config = config.to_str().unwrap();
        let output = gatherer(&["status", "--cluster", "nope", "--config", config]);
        assert_eq!(output.status.code(), Some(2));
    }
}

mod store_commands {
    use super::*;

    #[test]
    fn test_status_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let config = config.to_str().unwrap();
        let output = gatherer(&["status", "--cluster", "prod", "--config", config]);
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_init_then_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let config = config.to_str().unwrap();

        let output = gatherer(&["init", "--all-clusters", "--config", config]);
        assert!(output.status.success());
        assert!(dir.path().join("clusters/prod/data.db").exists());
        assert!(dir.path().join("clusters/lab/manifests").is_dir());
        assert!(dir.path().join("clusters/lab/reports").is_dir());

        let output = gatherer(&["status", "--cluster", "prod", "--config", config]);
        assert!(output.status.success());
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["total"], 0);
        assert_eq!(json["active"], 0);
        assert!(json["last_sync"].is_null());

        let output = gatherer(&["status", "--all-clusters", "--config", config]);
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert!(json.get("prod").is_some());
        assert!(json.get("lab").is_some());
    }

    #[test]
    fn test_nodes_empty_after_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let config = config.to_str().unwrap();

        assert!(gatherer(&["init", "--cluster", "lab", "--config", config]).status.success());
        let output = gatherer(&["nodes", "--cluster", "lab", "--config", config]);
        assert!(output.status.success());
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json, serde_json::json!([]));
    }

    #[test]
    fn test_sync_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let config = config.to_str().unwrap();
        let output = gatherer(&["sync", "--cluster", "prod", "--config", config]);
        assert_eq!(output.status.code(), Some(3));
        assert!(!dir.path().join("clusters/prod/data.db").exists());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("not initialized"));
    }

    #[test]
    fn test_sync_with_unknown_kind_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let output = gatherer(&[
            "sync",
            "--cluster",
            "lab",
            "--kind",
            "NotAKind",
            "--config",
            config.to_str().unwrap(),
        ]);
        assert_eq!(output.status.code(), Some(4));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("no resolvable kinds"));
    }
}
