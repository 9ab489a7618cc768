//! DeployChart Custom Resource Definition
//!
//! A DeployChart declares a Helm release: which chart to install from which
//! repository, at which version, with which values. The release is named
//! after the resource and installed into the resource's namespace.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{preserve_unknown_fields, ChartRef, DeployState};

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "helm.k8s.ir",
    version = "v1alpha1",
    kind = "DeployChart",
    namespaced,
    status = "DeployChartStatus",
    shortname = "dc",
    printcolumn = r#"{"name":"Chart","type":"string","jsonPath":".spec.chart.chart"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.chart.version"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeployChartSpec {
    pub chart: ChartRef,

    /// Helm values, passed through to the chart unchanged
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: serde_json::Map<String, serde_json::Value>,
}

/// Observed state of a DeployChart
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployChartStatus {
    /// Set once the release has been applied at least once
    #[serde(default)]
    pub processed: bool,

    #[serde(default)]
    pub state: DeployState,

    #[serde(default)]
    pub message: String,

    /// Fingerprint of the spec at the last successful apply
    #[serde(default)]
    pub last_applied_hash: String,
}

impl DeployChart {
    /// Status as last persisted, or the initial Pending status
    pub fn current_status(&self) -> DeployChartStatus {
        self.status.clone().unwrap_or_default()
    }
}
