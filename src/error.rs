//! Error types shared across the synchronizer.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// A Kubernetes API call failed (pod listing, client bootstrap).
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// The service watch stream itself failed.
    #[error("service watch error: {0}")]
    WatchError(#[from] kube::runtime::watcher::Error),

    /// The XC API could not be reached (connect failure, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The XC API answered with a status the operation cannot act on.
    /// Existence in particular must never be inferred from such a response.
    #[error("XC {operation} for origin pool {name} returned {status}: {body}")]
    ApiError {
        operation: &'static str,
        name: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// The service declares no port with an assigned node port, so there is
    /// no listening port to give the origin pool.
    #[error("service {service} has no node port assigned")]
    MissingNodePort { service: String },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),
}
