//! Error types for the host-alias operator

use thiserror::Error;

/// Errors raised while bootstrapping or serving the operator.
///
/// The reconcile path never returns these: failures inside a trigger
/// invocation are classified and logged where they happen.
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API or client construction error
    #[error("Kubernetes error: {0}")]
    KubeError(#[from] kube::Error),

    /// Local kubeconfig could not be loaded
    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(#[from] kube::config::KubeconfigError),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration parsed but failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
