//! Error types for the ingestion pipeline.
//!
//! Three kinds, per the pipeline's failure model: configuration errors
//! (detected before any I/O, user-facing, carry remediation hints),
//! transport errors (container runtime / HTTP failures, passed through
//! verbatim), and invariant violations (programming-contract breaches that
//! are not user-recoverable). Nothing here retries.

use thiserror::Error;

use crate::container::ContainerError;
use crate::source::SourceParseError;

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that can occur while ingesting a database source.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The source string itself could not be parsed.
    #[error(transparent)]
    Source(#[from] SourceParseError),

    /// The source URL scheme does not match the chosen location kind.
    #[error("scheme {scheme:?} is not valid for this source; valid schemes: {}", valid.join(", "))]
    InvalidScheme {
        /// The offending scheme.
        scheme: String,
        /// Schemes the location strategy accepts.
        valid: Vec<String>,
        /// Remediation hints.
        hints: Vec<String>,
    },

    /// The file extension matches no mechanism and no extractor.
    #[error("unsupported file extension {extension:?}; supported: {supported}")]
    UnsupportedExtension {
        /// The offending extension.
        extension: String,
        /// Comma-joined list of supported extensions.
        supported: String,
        /// Remediation hints.
        hints: Vec<String>,
    },

    /// An explicitly requested mechanism name matched nothing.
    #[error("unknown online mechanism {name:?}; known mechanisms: {}", known.join(", "))]
    UnknownMechanism {
        /// The requested name.
        name: String,
        /// Registered mechanism names.
        known: Vec<String>,
    },

    /// The source file does not exist (filesystem stat or HTTP HEAD failed).
    #[error("database source not found: {location}")]
    SourceMissing {
        /// Where the source was looked for.
        location: String,
    },

    /// Refusing to clone into a non-empty working directory.
    #[error("current directory is not empty, refusing to clone {url} into it")]
    CloneTargetNotEmpty {
        /// The repository that was about to be cloned.
        url: String,
    },

    /// Cloning the source repository failed.
    #[error("failed to clone {url}: {reason}")]
    CloneFailed {
        /// The repository URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// A programming-contract violation: the pipeline was driven out of
    /// order or a derived value that must be non-empty is empty.
    #[error("invariant violation: {message}")]
    Invariant {
        /// What contract was broken.
        message: String,
    },

    /// Container runtime failure, passed through verbatim.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// The SQL query collaborator reported a failure.
    #[error("SQL execution failed: {reason}")]
    Sql {
        /// Underlying failure.
        reason: String,
    },

    /// Host-side I/O failure (git clone target inspection and the like).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Shorthand for an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// True for programming-contract violations, so tests can assert on
    /// kind instead of on process abort.
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant { .. })
    }

    /// Remediation hints attached to configuration errors.
    pub fn hints(&self) -> &[String] {
        match self {
            Self::InvalidScheme { hints, .. } | Self::UnsupportedExtension { hints, .. } => hints,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_kind_is_distinguishable() {
        let err = IngestError::invariant("filename is empty");
        assert!(err.is_invariant());
        assert!(err.hints().is_empty());

        let err = IngestError::SourceMissing {
            location: "x".to_string(),
        };
        assert!(!err.is_invariant());
    }

    #[test]
    fn test_config_errors_carry_hints() {
        let err = IngestError::UnsupportedExtension {
            extension: "xyz".to_string(),
            supported: "bak, mdf".to_string(),
            hints: vec!["Pass --use with a .bak file".to_string()],
        };
        assert_eq!(err.hints().len(), 1);
        assert!(err.to_string().contains("xyz"));
    }
}
