//! API client factory
//!
//! Builds a `kube::Client` from either a kubeconfig reference or explicit
//! credentials. Explicit credentials are rendered into a single-context
//! kubeconfig so both paths share kube's own TLS and auth handling.

use gatherer_core::{ClusterConfig, ClusterCredentials, ClusterSource};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::{Map, Value, json};

use crate::error::Result;

/// Connect to the cluster described by `cluster`
pub async fn connect(cluster: &ClusterConfig) -> Result<Client> {
    let (kubeconfig, options) = match &cluster.source {
        ClusterSource::Kubeconfig { path, context } => {
            tracing::debug!(cluster = %cluster.name, path = %path.display(), "loading kubeconfig");
            let options = KubeConfigOptions {
                context: context.clone(),
                ..Default::default()
            };
            (Kubeconfig::read_from(path)?, options)
        }
        ClusterSource::Credentials(creds) => {
            tracing::debug!(
                cluster = %cluster.name,
                host = %creds.host,
                "using explicit credentials"
            );
            (
                credentials_kubeconfig(&cluster.name, creds)?,
                KubeConfigOptions::default(),
            )
        }
    };

    let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
    Ok(Client::try_from(config)?)
}

/// Render explicit credentials as a one-context kubeconfig
pub fn credentials_kubeconfig(name: &str, creds: &ClusterCredentials) -> Result<Kubeconfig> {
    let mut cluster = Map::new();
    cluster.insert("server".into(), json!(creds.host));
    if !creds.verify_ssl {
        cluster.insert("insecure-skip-tls-verify".into(), json!(true));
    }
    if let Some(ca) = &creds.ca_file {
        cluster.insert("certificate-authority".into(), json!(ca.display().to_string()));
    }

    let mut user = Map::new();
    if let Some(token) = &creds.token {
        user.insert("token".into(), json!(token));
    }
    if let Some(username) = &creds.username {
        user.insert("username".into(), json!(username));
    }
    if let Some(password) = &creds.password {
        user.insert("password".into(), json!(password));
    }
    if let Some(cert) = &creds.cert_file {
        user.insert("client-certificate".into(), json!(cert.display().to_string()));
    }
    if let Some(key) = &creds.key_file {
        user.insert("client-key".into(), json!(key.display().to_string()));
    }

    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": name, "cluster": Value::Object(cluster) }],
        "users": [{ "name": name, "user": Value::Object(user) }],
        "contexts": [{ "name": name, "context": { "cluster": name, "user": name } }],
        "current-context": name,
    });

    let yaml = serde_yaml::to_string(&document)?;
    Ok(Kubeconfig::from_yaml(&yaml)?)
}
