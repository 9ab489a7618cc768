//! Controller loops for DeployChart and Repository resources
//!
//! Wires the reconcilers into the kube-rs controller runtime. The runtime
//! serializes reconciles per object and requeues failed keys through
//! [`error_policy`].

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event as FinalizerEvent},
        reflector::ObjectRef,
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{error, info, instrument, warn};

use super::deploy_chart::{DeployChartConfig, DeployChartReconciler, DeployOutcome};
use super::events::{publish, EVENT_TYPE_NORMAL, EVENT_TYPE_WARNING};
use super::finalizers::{is_being_deleted, DEPLOY_CHART_FINALIZER, REPOSITORY_FINALIZER};
use super::repository::{RepositoryOutcome, RepositoryReconciler};
use super::store::KubeStore;
use crate::crd::{DeployChart, Repository};
use crate::error::{Error, Result};
use crate::helm::Helm;

/// Shared state for both controllers
pub struct ControllerState {
    pub client: Client,
    pub deploy_charts: DeployChartReconciler<KubeStore>,
    pub repositories: RepositoryReconciler<KubeStore>,
}

impl ControllerState {
    pub fn new(client: Client, helm: Arc<dyn Helm>, config: DeployChartConfig) -> Self {
        let store = KubeStore::new(client.clone());
        Self {
            deploy_charts: DeployChartReconciler::new(store.clone(), Arc::clone(&helm), config),
            repositories: RepositoryReconciler::new(store, helm),
            client,
        }
    }
}

/// Main entry point to start both controllers
///
/// With `watch_namespace` set, only DeployCharts in that namespace are
/// reconciled. Repositories are cluster-scoped and always watched.
pub async fn run_controllers(
    state: Arc<ControllerState>,
    watch_namespace: Option<String>,
) -> Result<()> {
    let client = state.client.clone();
    let deploy_charts: Api<DeployChart> = match &watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let repositories: Api<Repository> = Api::all(client.clone());

    info!("Starting DeployChart and Repository controllers");

    // Verify CRDs exist
    let probe = ListParams::default().limit(1);
    if let Err(e) = deploy_charts.list(&probe).await {
        error!("DeployChart CRD not found. Please install the CRDs first: {:?}", e);
        return Err(Error::ConfigError("DeployChart CRD not installed".to_string()));
    }
    if let Err(e) = repositories.list(&probe).await {
        error!("Repository CRD not found. Please install the CRDs first: {:?}", e);
        return Err(Error::ConfigError("Repository CRD not installed".to_string()));
    }

    let deploy_chart_controller = Controller::new(deploy_charts, Config::default())
        .shutdown_on_signal()
        .run(reconcile_deploy_chart, error_policy, Arc::clone(&state))
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => info!("Reconciled DeployChart {}", obj),
                Err(e) => error!("DeployChart reconcile error: {:?}", e),
            }
        });

    let repository_controller = Controller::new(repositories, Config::default())
        .shutdown_on_signal()
        .run(reconcile_repository, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => info!("Reconciled Repository {}", obj),
                Err(e) => error!("Repository reconcile error: {:?}", e),
            }
        });

    futures::join!(deploy_chart_controller, repository_controller);
    info!("Controllers stopped");

    Ok(())
}

/// Reconcile entry point for DeployChart
///
/// Called whenever a DeployChart is created, updated or marked for deletion.
#[instrument(skip(obj, ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile_deploy_chart(obj: Arc<DeployChart>, ctx: Arc<ControllerState>) -> Result<Action> {
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<DeployChart> = Api::namespaced(ctx.client.clone(), &namespace);

    info!(
        "Reconciling DeployChart {}/{} (deleting: {})",
        namespace,
        obj.name_any(),
        is_being_deleted(obj.as_ref())
    );

    finalizer(&api, DEPLOY_CHART_FINALIZER, obj, |event| async {
        match event {
            FinalizerEvent::Apply(chart) => apply_deploy_chart(&ctx, &chart).await,
            FinalizerEvent::Cleanup(chart) => cleanup_deploy_chart(&ctx, &chart).await,
        }
    })
    .await
    .map_err(Error::from)
}

async fn apply_deploy_chart(ctx: &ControllerState, chart: &DeployChart) -> Result<Action> {
    let key = ObjectRef::from_obj(chart);
    match ctx.deploy_charts.reconcile(&key).await {
        Ok(DeployOutcome::Deployed { .. }) => {
            publish(
                &ctx.client,
                chart,
                EVENT_TYPE_NORMAL,
                "Deployed",
                &format!("Deployed {}", chart.spec.chart),
            )
            .await;
            Ok(Action::await_change())
        }
        Ok(_) => Ok(Action::await_change()),
        Err(e) => {
            publish(&ctx.client, chart, EVENT_TYPE_WARNING, "DeployFailed", &e.to_string()).await;
            Err(e)
        }
    }
}

async fn cleanup_deploy_chart(ctx: &ControllerState, chart: &DeployChart) -> Result<Action> {
    let key = ObjectRef::from_obj(chart);
    match ctx.deploy_charts.teardown(&key).await {
        Ok(_) => Ok(Action::await_change()),
        Err(e) => {
            publish(&ctx.client, chart, EVENT_TYPE_WARNING, "UninstallFailed", &e.to_string())
                .await;
            Err(e)
        }
    }
}

/// Reconcile entry point for Repository
#[instrument(skip(obj, ctx), fields(name = %obj.name_any()))]
async fn reconcile_repository(obj: Arc<Repository>, ctx: Arc<ControllerState>) -> Result<Action> {
    let api: Api<Repository> = Api::all(ctx.client.clone());

    info!(
        "Reconciling Repository {} (deleting: {})",
        obj.name_any(),
        is_being_deleted(obj.as_ref())
    );

    finalizer(&api, REPOSITORY_FINALIZER, obj, |event| async {
        match event {
            FinalizerEvent::Apply(repo) => apply_repository(&ctx, &repo).await,
            FinalizerEvent::Cleanup(repo) => cleanup_repository(&ctx, &repo).await,
        }
    })
    .await
    .map_err(Error::from)
}

async fn apply_repository(ctx: &ControllerState, repo: &Repository) -> Result<Action> {
    let key = ObjectRef::from_obj(repo);
    if ctx.repositories.reconcile(&key).await? == RepositoryOutcome::Registered {
        publish(
            &ctx.client,
            repo,
            EVENT_TYPE_NORMAL,
            "Registered",
            &format!("Registered Helm repository {}", repo.spec.url),
        )
        .await;
    }
    Ok(Action::await_change())
}

async fn cleanup_repository(ctx: &ControllerState, repo: &Repository) -> Result<Action> {
    let key = ObjectRef::from_obj(repo);
    ctx.repositories.teardown(&key).await;
    Ok(Action::await_change())
}

/// Error policy determines how to handle reconciliation errors
fn error_policy<K: ResourceExt>(obj: Arc<K>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    if let Some(output) = error.command_output() {
        warn!("Helm output for {}: {}", obj.name_any(), output);
    }
    error!("Reconciliation error for {}: {:?}", obj.name_any(), error);

    // Use shorter retry for retriable errors
    let retry_duration = if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    };

    Action::requeue(retry_duration)
}
