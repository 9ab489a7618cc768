//! Shared types for the DeployChart and Repository resources

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a DeployChart release
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum DeployState {
    /// Observed but not yet applied
    #[default]
    Pending,

    /// An install or upgrade is in flight
    Deploying,

    /// The most recent apply succeeded
    Succeeded,

    /// The most recent apply failed (only written by the `record` failure policy)
    Failed,
}

impl std::fmt::Display for DeployState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployState::Pending => write!(f, "Pending"),
            DeployState::Deploying => write!(f, "Deploying"),
            DeployState::Succeeded => write!(f, "Succeeded"),
            DeployState::Failed => write!(f, "Failed"),
        }
    }
}

/// Reference to a chart in a registered repository
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    /// Name of the Repository the chart is pulled from
    pub repo: String,

    /// Chart name within the repository
    pub chart: String,

    /// Chart version to install
    pub version: String,
}

impl ChartRef {
    /// Chart reference in the `repo/chart` form Helm expects
    pub fn reference(&self) -> String {
        format!("{}/{}", self.repo, self.chart)
    }
}

impl std::fmt::Display for ChartRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.repo, self.chart, self.version)
    }
}

/// Schema for free-form objects whose fields the API server must keep as-is
pub(crate) fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}
