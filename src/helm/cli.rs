//! `helm` binary backend

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::invoker::invoke;
use super::{Helm, ReleaseRequest, RepositoryRequest};
use crate::error::{Error, Result};

/// Shells out to the `helm` binary
///
/// Repository commands rewrite Helm's shared `repositories.yaml` and index
/// cache, so they run one at a time. Release commands touch only their own
/// release and run concurrently.
pub struct HelmCli {
    binary: String,
    timeout: Duration,
    repo_lock: Mutex<()>,
}

impl HelmCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            repo_lock: Mutex::new(()),
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<String> {
        invoke(&self.binary, &args, self.timeout).await
    }
}

#[async_trait]
impl Helm for HelmCli {
    #[instrument(skip(self, request), fields(release = %request.release, namespace = %request.namespace))]
    async fn install_or_upgrade(&self, request: &ReleaseRequest) -> Result<String> {
        let output = self.run(install_args(request)).await?;
        info!(chart = %request.chart, version = %request.version, "Helm upgrade --install succeeded");
        Ok(output)
    }

    #[instrument(skip(self))]
    async fn uninstall(&self, release: &str, namespace: &str) -> Result<String> {
        match self.run(uninstall_args(release, namespace)).await {
            Ok(output) => {
                info!("Helm uninstall succeeded");
                Ok(output)
            }
            Err(Error::CommandFailed { output, .. }) if is_release_not_found(&output) => {
                Err(Error::ReleaseNotFound {
                    release: release.to_string(),
                    namespace: namespace.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, request), fields(name = %request.name, url = %request.url))]
    async fn repo_add(&self, request: &RepositoryRequest) -> Result<String> {
        let _guard = self.repo_lock.lock().await;
        self.run(repo_add_args(request)).await
    }

    #[instrument(skip(self))]
    async fn repo_update(&self) -> Result<String> {
        let _guard = self.repo_lock.lock().await;
        self.run(vec!["repo".to_string(), "update".to_string()]).await
    }

    #[instrument(skip(self))]
    async fn repo_remove(&self, name: &str) -> Result<String> {
        let _guard = self.repo_lock.lock().await;
        self.run(vec![
            "repo".to_string(),
            "remove".to_string(),
            name.to_string(),
        ])
        .await
    }
}

fn install_args(request: &ReleaseRequest) -> Vec<String> {
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        request.release.clone(),
        request.chart.clone(),
        "--namespace".to_string(),
        request.namespace.clone(),
        "-f".to_string(),
        request.values_file.display().to_string(),
        "--version".to_string(),
        request.version.clone(),
    ];
    if request.create_namespace {
        args.push("--create-namespace".to_string());
    }
    args
}

fn uninstall_args(release: &str, namespace: &str) -> Vec<String> {
    vec![
        "uninstall".to_string(),
        release.to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ]
}

fn repo_add_args(request: &RepositoryRequest) -> Vec<String> {
    let mut args = vec![
        "repo".to_string(),
        "add".to_string(),
        request.name.clone(),
        request.url.clone(),
        "--force-update".to_string(),
    ];
    if let Some(creds) = &request.credentials {
        args.extend([
            "--username".to_string(),
            creds.username.clone(),
            "--password".to_string(),
            creds.password.clone(),
        ]);
    }
    args
}

/// Helm reports a missing release as `Error: uninstall: Release not loaded: <name>: release: not found`
fn is_release_not_found(output: &str) -> bool {
    output.contains("release: not found")
}
