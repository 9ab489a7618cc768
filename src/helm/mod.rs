//! Helm integration
//!
//! The reconcilers talk to Helm through the [`Helm`] trait. [`HelmCli`]
//! shells out to the `helm` binary; [`RecordingHelm`] keeps calls in memory
//! so the state machines can be tested without a cluster.

mod cli;
pub mod invoker;
mod recorder;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::crd::Credentials;
use crate::error::Result;

pub use cli::HelmCli;
pub use recorder::{HelmCall, Operation, RecordingHelm};

/// Default deadline for a single Helm invocation
pub const DEFAULT_HELM_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Arguments for `helm upgrade --install`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub release: String,
    pub namespace: String,
    /// Chart in `repo/chart` form
    pub chart: String,
    pub version: String,
    pub values_file: PathBuf,
    pub create_namespace: bool,
}

/// Arguments for `helm repo add`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryRequest {
    pub name: String,
    pub url: String,
    pub credentials: Option<Credentials>,
}

/// Operations the operator needs from Helm
///
/// Each call returns Helm's combined output on success. Implementations do
/// not retry; retry policy belongs to the reconcilers.
#[async_trait]
pub trait Helm: Send + Sync {
    async fn install_or_upgrade(&self, request: &ReleaseRequest) -> Result<String>;

    /// Fails with [`crate::Error::ReleaseNotFound`] when there is nothing to remove
    async fn uninstall(&self, release: &str, namespace: &str) -> Result<String>;

    async fn repo_add(&self, request: &RepositoryRequest) -> Result<String>;

    /// Refresh the index of every registered repository
    async fn repo_update(&self) -> Result<String>;

    async fn repo_remove(&self, name: &str) -> Result<String>;
}
