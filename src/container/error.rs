//! Error types for container runtime operations.

use thiserror::Error;

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors that can occur while talking to the container runtime.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The Docker daemon is not reachable.
    #[error("Docker not available: {reason}")]
    DockerNotAvailable {
        /// Reason why Docker is unavailable.
        reason: String,
        /// Platform-appropriate remediation hints.
        hints: Vec<String>,
    },

    /// Failed to pull the image.
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePullFailed {
        /// Image reference.
        image: String,
        /// Reason for failure.
        reason: String,
        /// Platform-appropriate remediation hints.
        hints: Vec<String>,
    },

    /// Failed to create the container.
    #[error("Failed to create container '{name}': {reason}")]
    CreationFailed {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to start the container.
    #[error("Failed to start container '{name}': {reason}")]
    StartFailed {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// An exec session could not be created or attached.
    #[error("Failed to exec in container '{id}': {reason}")]
    ExecFailed {
        /// Container id.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// A file could not be transferred into the container.
    #[error("Failed to copy '{src}' into container: {reason}")]
    CopyFailed {
        /// Source path or URL.
        src: String,
        /// Reason for failure.
        reason: String,
    },

    /// The log stream closed before the awaited pattern appeared.
    #[error("Log stream for container '{id}' ended before '{pattern}' appeared")]
    LogPatternNotFound {
        /// Container id.
        id: String,
        /// The substring that was awaited.
        pattern: String,
    },

    /// Any other error surfaced by the runtime client, passed through verbatim.
    #[error("Container runtime error: {0}")]
    Runtime(#[from] bollard::errors::Error),

    /// I/O error reading a local file for transfer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
