//! Repository Custom Resource Definition
//!
//! A Repository registers an upstream chart source with Helm. It is
//! cluster-scoped because Helm's repository list is global to the operator.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "helm.k8s.ir",
    version = "v1alpha1",
    kind = "Repository",
    status = "RepositoryStatus",
    shortname = "hr",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".spec.url"}"#,
    printcolumn = r#"{"name":"Processed","type":"boolean","jsonPath":".status.processed"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySpec {
    pub url: String,

    #[serde(default)]
    pub has_credentials: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl RepositorySpec {
    /// Basic-auth credentials, only when `hasCredentials` is set
    pub fn credentials(&self) -> Option<Credentials> {
        self.has_credentials.then(|| Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

/// Observed state of a Repository
///
/// `processed` is a one-way latch: once the repository has been handed to
/// Helm it is never registered again, whether or not Helm accepted it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatus {
    #[serde(default)]
    pub processed: bool,
}

impl Repository {
    pub fn is_processed(&self) -> bool {
        self.status.as_ref().map(|s| s.processed).unwrap_or(false)
    }
}

/// Username and password for a chart repository
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
