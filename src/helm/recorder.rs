//! In-memory Helm backend for tests

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Helm, ReleaseRequest, RepositoryRequest};
use crate::error::{Error, Result};

/// A Helm call captured by [`RecordingHelm`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelmCall {
    InstallOrUpgrade {
        release: String,
        namespace: String,
        chart: String,
        version: String,
        create_namespace: bool,
        /// Contents of the values file at the time of the call
        values: String,
    },
    Uninstall {
        release: String,
        namespace: String,
    },
    RepoAdd(RepositoryRequest),
    RepoUpdate,
    RepoRemove {
        name: String,
    },
}

/// Which operation a scripted failure applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    InstallOrUpgrade,
    Uninstall,
    RepoAdd,
    RepoUpdate,
    RepoRemove,
}

/// Records every call and fails the operations it is told to fail
///
/// Installed releases are tracked so that uninstalling an unknown release
/// answers [`Error::ReleaseNotFound`] the way Helm does.
#[derive(Default)]
pub struct RecordingHelm {
    calls: Mutex<Vec<HelmCall>>,
    failing: Mutex<HashSet<Operation>>,
    releases: Mutex<HashSet<(String, String)>>,
}

impl RecordingHelm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `operation` fail with a command error
    pub fn fail(&self, operation: Operation) {
        lock(&self.failing).insert(operation);
    }

    /// Let `operation` succeed again
    pub fn recover(&self, operation: Operation) {
        lock(&self.failing).remove(&operation);
    }

    pub fn calls(&self) -> Vec<HelmCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn has_release(&self, release: &str, namespace: &str) -> bool {
        lock(&self.releases).contains(&(release.to_string(), namespace.to_string()))
    }

    fn record(&self, call: HelmCall) -> Result<()> {
        let operation = call.operation();
        let command = format!("helm {:?}", operation);
        lock(&self.calls).push(call);

        if lock(&self.failing).contains(&operation) {
            return Err(Error::CommandFailed {
                command,
                status: "exit status: 1".to_string(),
                output: format!("Error: injected {:?} failure", operation),
            });
        }
        Ok(())
    }
}

impl HelmCall {
    pub fn operation(&self) -> Operation {
        match self {
            HelmCall::InstallOrUpgrade { .. } => Operation::InstallOrUpgrade,
            HelmCall::Uninstall { .. } => Operation::Uninstall,
            HelmCall::RepoAdd(_) => Operation::RepoAdd,
            HelmCall::RepoUpdate => Operation::RepoUpdate,
            HelmCall::RepoRemove { .. } => Operation::RepoRemove,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Helm for RecordingHelm {
    async fn install_or_upgrade(&self, request: &ReleaseRequest) -> Result<String> {
        let values = tokio::fs::read_to_string(&request.values_file).await?;
        self.record(HelmCall::InstallOrUpgrade {
            release: request.release.clone(),
            namespace: request.namespace.clone(),
            chart: request.chart.clone(),
            version: request.version.clone(),
            create_namespace: request.create_namespace,
            values,
        })?;
        lock(&self.releases).insert((request.release.clone(), request.namespace.clone()));
        Ok(format!("Release \"{}\" has been upgraded.", request.release))
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<String> {
        self.record(HelmCall::Uninstall {
            release: release.to_string(),
            namespace: namespace.to_string(),
        })?;
        let key = (release.to_string(), namespace.to_string());
        if !lock(&self.releases).remove(&key) {
            return Err(Error::ReleaseNotFound {
                release: key.0,
                namespace: key.1,
            });
        }
        Ok(format!("release \"{}\" uninstalled", release))
    }

    async fn repo_add(&self, request: &RepositoryRequest) -> Result<String> {
        self.record(HelmCall::RepoAdd(request.clone()))?;
        Ok(format!("\"{}\" has been added to your repositories", request.name))
    }

    async fn repo_update(&self) -> Result<String> {
        self.record(HelmCall::RepoUpdate)?;
        Ok("Update Complete. Happy Helming!".to_string())
    }

    async fn repo_remove(&self, name: &str) -> Result<String> {
        self.record(HelmCall::RepoRemove {
            name: name.to_string(),
        })?;
        Ok(format!("\"{}\" has been removed from your repositories", name))
    }
}
