//! Repository reconciliation
//!
//! Registration is best-effort. Helm failures are logged and swallowed so a
//! repository with bad credentials never wedges its own reconcile loop, and
//! `status.processed` latches to true after the first attempt either way.

use std::sync::Arc;

use kube::runtime::reflector::ObjectRef;
use tracing::{debug, error, info, instrument, warn};

use super::store::ObjectStore;
use crate::crd::{Repository, RepositoryStatus};
use crate::error::Result;
use crate::helm::{Helm, RepositoryRequest};

/// Result of a single Repository reconcile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepositoryOutcome {
    /// Handed to Helm and latched as processed
    Registered,
    /// Already latched, nothing to do
    AlreadyRegistered,
    /// The object is gone and removal was attempted
    Removed,
}

pub struct RepositoryReconciler<S> {
    store: S,
    helm: Arc<dyn Helm>,
}

impl<S: ObjectStore<Repository>> RepositoryReconciler<S> {
    pub fn new(store: S, helm: Arc<dyn Helm>) -> Self {
        Self { store, helm }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile the Repository identified by `key`
    ///
    /// Only failing to read the object or to persist the latch is an error.
    #[instrument(skip(self), fields(name = %key.name))]
    pub async fn reconcile(&self, key: &ObjectRef<Repository>) -> Result<RepositoryOutcome> {
        let Some(repo) = self.store.get(key).await? else {
            info!("Repository resource deleted");
            return Ok(self.teardown(key).await);
        };

        if repo.is_processed() {
            debug!("Repository already registered");
            return Ok(RepositoryOutcome::AlreadyRegistered);
        }

        info!(url = %repo.spec.url, "Registering Helm repository");
        let request = RepositoryRequest {
            name: key.name.clone(),
            url: repo.spec.url.clone(),
            credentials: repo.spec.credentials(),
        };
        match self.helm.repo_add(&request).await {
            Ok(output) => info!(output = %output, "Added Helm repository"),
            Err(e) => error!("Failed to add Helm repository: {}", e),
        }

        // Refresh runs whether or not the add succeeded.
        match self.helm.repo_update().await {
            Ok(output) => debug!(output = %output, "Helm repositories updated"),
            Err(e) => error!("Failed to update Helm repositories: {}", e),
        }

        self.store
            .patch_status(key, &RepositoryStatus { processed: true })
            .await
            .map_err(|e| {
                error!("Failed to update Repository status: {}", e);
                e
            })?;
        info!("Helm repository reconciled");

        Ok(RepositoryOutcome::Registered)
    }

    /// Remove a deleted Repository from Helm, ignoring failures
    #[instrument(skip(self), fields(name = %key.name))]
    pub async fn teardown(&self, key: &ObjectRef<Repository>) -> RepositoryOutcome {
        match self.helm.repo_remove(&key.name).await {
            Ok(_) => info!("Removed Helm repository"),
            Err(e) => warn!("Failed to remove Helm repository: {}", e),
        }
        RepositoryOutcome::Removed
    }
}
