//! Error types for the HappyHelm operator

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while reconciling DeployChart and Repository resources
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Finalizer error: {0}")]
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("Failed to encode spec: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("Failed to serialize values: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("Failed to render values template: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}, output: {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("`{command}` timed out after {timeout:?}, output: {output}")]
    CommandTimedOut {
        command: String,
        timeout: Duration,
        output: String,
    },

    #[error("Release {release} not found in namespace {namespace}")]
    ReleaseNotFound { release: String, namespace: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Whether a quick requeue is likely to succeed
    ///
    /// Transient API and process failures are retried soon; encoding and
    /// template errors only go away once the user edits the resource.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_)
            | Error::Io(_)
            | Error::CommandSpawn { .. }
            | Error::CommandFailed { .. }
            | Error::CommandTimedOut { .. } => true,
            Error::FinalizerError(inner) => match inner.as_ref() {
                kube::runtime::finalizer::Error::ApplyFailed(e)
                | kube::runtime::finalizer::Error::CleanupFailed(e) => e.is_retriable(),
                _ => true,
            },
            Error::Encoding(_)
            | Error::Serialization(_)
            | Error::Template(_)
            | Error::ReleaseNotFound { .. }
            | Error::ConfigError(_) => false,
        }
    }

    /// Captured output of a failed external command, if any
    pub fn command_output(&self) -> Option<&str> {
        match self {
            Error::CommandFailed { output, .. } | Error::CommandTimedOut { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}

impl From<kube::runtime::finalizer::Error<Error>> for Error {
    fn from(error: kube::runtime::finalizer::Error<Error>) -> Self {
        Error::FinalizerError(Box::new(error))
    }
}
