//! Custom Resource Definitions for HappyHelm
//!
//! This module defines the Kubernetes CRDs the operator reconciles.

mod deploy_chart;
mod repository;
pub mod types;

#[cfg(test)]
mod tests;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

pub use deploy_chart::{DeployChart, DeployChartSpec, DeployChartStatus};
pub use repository::{Credentials, Repository, RepositorySpec, RepositoryStatus};
pub use types::*;

/// Every CRD served by the operator, in installation order
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![Repository::crd(), DeployChart::crd()]
}
