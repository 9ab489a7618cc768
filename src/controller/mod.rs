//! Controller module for DeployChart and Repository reconciliation
//! This module contains the controller loops, the per-kind state machines,
//! and the store abstraction they read and write through.

mod deploy_chart;
pub mod events;
pub mod fingerprint;
mod finalizers;
mod reconciler;
mod repository;
pub mod store;

pub use deploy_chart::{DeployChartConfig, DeployChartReconciler, DeployOutcome, FailurePolicy};
pub use finalizers::{DEPLOY_CHART_FINALIZER, REPOSITORY_FINALIZER};
pub use fingerprint::fingerprint;
pub use reconciler::{run_controllers, ControllerState};
pub use repository::{RepositoryOutcome, RepositoryReconciler};
pub use store::{KubeStore, MemoryStore, ObjectStore, StatusResource};
