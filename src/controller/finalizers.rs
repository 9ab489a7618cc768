//! Finalizer names
//!
//! kube-rs only reconciles objects that still exist, so both kinds carry a
//! finalizer. Deletion then arrives as a cleanup event while the object is
//! still readable, and the finalizer is released once the Helm side has
//! been torn down.

use kube::ResourceExt;

/// Finalizer protecting DeployChart resources until their release is uninstalled
pub const DEPLOY_CHART_FINALIZER: &str = "deploychart.helm.k8s.ir/finalizer";

/// Finalizer protecting Repository resources until removal from Helm was attempted
pub const REPOSITORY_FINALIZER: &str = "repository.helm.k8s.ir/finalizer";

/// Check if a deletion has been requested
///
/// A deletion timestamp indicates the user has requested deletion,
/// but finalizers are preventing the actual removal.
pub fn is_being_deleted<K: ResourceExt>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}
