//! DeployChart reconciliation
//!
//! Drives a Helm release toward the DeployChart spec:
//!
//! - object gone: `helm uninstall`, no status write
//! - never applied, or spec fingerprint differs from `lastAppliedHash`:
//!   `helm upgrade --install`, then `Succeeded` with the new hash
//! - fingerprint unchanged: nothing
//!
//! Failed applies are returned to the controller so the key is retried.
//! `lastAppliedHash` is only ever written together with `Succeeded`.

use std::path::PathBuf;
use std::sync::Arc;

use kube::{runtime::reflector::ObjectRef, ResourceExt};
use serde_json::json;
use tempfile::TempDir;
use tracing::{debug, error, info, instrument, warn};

use super::fingerprint::fingerprint;
use super::store::ObjectStore;
use crate::crd::{DeployChart, DeployChartStatus, DeployState};
use crate::error::{Error, Result};
use crate::helm::{Helm, ReleaseRequest};
use crate::values::{self, ValuesMode};

const VALUES_FILE: &str = "values.yaml";

/// What happens to a DeployChart's status when an apply fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Leave status untouched and let the controller retry
    #[default]
    Retry,
    /// Persist `Deploying` before an apply and `Failed` with the error
    /// message after a failed one, then retry. Retries that fail the same
    /// way leave status as it is.
    Record,
}

/// Settings for [`DeployChartReconciler`]
#[derive(Clone, Debug, Default)]
pub struct DeployChartConfig {
    pub failure_policy: FailurePolicy,
    pub values_mode: ValuesMode,
    /// Parent for per-apply values directories, the system temp dir if unset
    pub scratch_dir: Option<PathBuf>,
}

/// Result of a single DeployChart reconcile
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The release was installed or upgraded to the spec with this fingerprint
    Deployed { hash: String },
    /// The spec matches the last applied one
    Unchanged,
    /// The object is gone and its release was uninstalled
    Uninstalled,
    /// The object is gone and Helm had no release to remove
    NotInstalled,
}

pub struct DeployChartReconciler<S> {
    store: S,
    helm: Arc<dyn Helm>,
    config: DeployChartConfig,
}

impl<S: ObjectStore<DeployChart>> DeployChartReconciler<S> {
    pub fn new(store: S, helm: Arc<dyn Helm>, config: DeployChartConfig) -> Self {
        Self {
            store,
            helm,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile the DeployChart identified by `key`
    #[instrument(skip(self), fields(name = %key.name, namespace = ?key.namespace))]
    pub async fn reconcile(&self, key: &ObjectRef<DeployChart>) -> Result<DeployOutcome> {
        let Some(chart) = self.store.get(key).await? else {
            info!("DeployChart resource deleted, uninstalling Helm release");
            return self.teardown(key).await;
        };

        let hash = fingerprint(&chart.spec).map_err(|e| {
            error!("Failed to calculate spec hash: {}", e);
            e
        })?;

        let status = chart.current_status();
        if status.processed && status.last_applied_hash == hash {
            debug!("Spec unchanged since last apply");
            return Ok(DeployOutcome::Unchanged);
        }

        info!(chart = %chart.spec.chart, "Deploying or upgrading chart");

        // Status writes retrigger the watch. Retrying a recorded failure
        // writes nothing unless the outcome changes.
        let record = self.config.failure_policy == FailurePolicy::Record;
        let retrying = status.state == DeployState::Failed;

        if record && !retrying {
            let deploying = DeployChartStatus {
                state: DeployState::Deploying,
                message: format!("Deploying {}", chart.spec.chart),
                ..status.clone()
            };
            self.store.patch_status(key, &deploying).await?;
        }

        if let Err(e) = self.apply(key, &chart).await {
            error!("Failed to deploy Helm chart: {}", e);
            if record {
                let message = e.to_string();
                if retrying && status.message == message {
                    debug!("Deploy failure already recorded in status");
                } else {
                    let failed = DeployChartStatus {
                        state: DeployState::Failed,
                        message,
                        ..status
                    };
                    if let Err(persist) = self.store.patch_status(key, &failed).await {
                        warn!("Failed to record deploy failure in status: {}", persist);
                    }
                }
            }
            return Err(e);
        }

        let succeeded = DeployChartStatus {
            processed: true,
            state: DeployState::Succeeded,
            message: format!("Deployed {}", chart.spec.chart),
            last_applied_hash: hash.clone(),
        };
        self.store.patch_status(key, &succeeded).await?;
        info!("Helm deploy succeeded");

        Ok(DeployOutcome::Deployed { hash })
    }

    /// Uninstall the release belonging to a deleted DeployChart
    ///
    /// A release Helm does not know about counts as already uninstalled.
    #[instrument(skip(self), fields(name = %key.name, namespace = ?key.namespace))]
    pub async fn teardown(&self, key: &ObjectRef<DeployChart>) -> Result<DeployOutcome> {
        let namespace = key.namespace.as_deref().unwrap_or("default");
        match self.helm.uninstall(&key.name, namespace).await {
            Ok(_) => {
                info!("Helm uninstall succeeded");
                Ok(DeployOutcome::Uninstalled)
            }
            Err(Error::ReleaseNotFound { .. }) => {
                info!("No Helm release to uninstall");
                Ok(DeployOutcome::NotInstalled)
            }
            Err(e) => {
                error!("Failed to uninstall Helm chart on delete: {}", e);
                Err(e)
            }
        }
    }

    /// Render values into a private directory and run `helm upgrade --install`
    ///
    /// The directory is removed when this returns, fails or is cancelled.
    async fn apply(&self, key: &ObjectRef<DeployChart>, chart: &DeployChart) -> Result<String> {
        let release = chart.name_any();
        let namespace = chart
            .namespace()
            .or_else(|| key.namespace.clone())
            .unwrap_or_else(|| "default".to_string());

        let scratch = self.scratch_dir(&release)?;
        let values_file = scratch.path().join(VALUES_FILE);
        let payload = self.render_values(chart, &release, &namespace)?;
        tokio::fs::write(&values_file, payload).await?;

        let request = ReleaseRequest {
            release,
            namespace,
            chart: chart.spec.chart.reference(),
            version: chart.spec.chart.version.clone(),
            values_file,
            create_namespace: true,
        };
        self.helm.install_or_upgrade(&request).await
    }

    fn scratch_dir(&self, release: &str) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("helm-values-{}-", release);
        builder.prefix(&prefix);
        let dir = match &self.config.scratch_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn render_values(&self, chart: &DeployChart, release: &str, namespace: &str) -> Result<Vec<u8>> {
        match self.config.values_mode {
            ValuesMode::Verbatim => Ok(values::to_yaml(&chart.spec.values)?.into_bytes()),
            ValuesMode::Template => {
                let variables = json!({
                    "release": { "name": release, "namespace": namespace },
                    "chart": {
                        "repo": chart.spec.chart.repo,
                        "name": chart.spec.chart.chart,
                        "version": chart.spec.chart.version,
                    },
                });
                values::render(&chart.spec.values, &variables)
            }
        }
    }
}
