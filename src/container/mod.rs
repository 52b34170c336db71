//! Container control surface over a Docker-compatible runtime.
//!
//! Wraps [`bollard`] with the handful of operations the ingestion pipeline
//! needs: image pull, container create/start/stop/remove, command execution
//! with stdout/stderr capture, file transfer into the container filesystem,
//! and a blocking log-pattern wait used for engine readiness detection.
//!
//! This module knows nothing about databases. Every operation propagates the
//! runtime client's error verbatim; retry policy belongs to the caller.

pub mod detect;
pub mod error;
pub mod spec;

mod controller;

pub use controller::{ContainerController, connect_docker};
pub use detect::{DockerDetection, DockerStatus, Platform, check_docker};
pub use error::{ContainerError, Result};
pub use spec::{ContainerHandle, ExecOutput, ExecSpec, RunSpec};
