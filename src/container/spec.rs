//! Value types passed to the container control surface.

use std::fmt;

/// Opaque identifier for a created container, as assigned by the runtime.
///
/// The controller owns handle creation; callers hold it only for the duration
/// of the work they do against that container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    /// Wrap a runtime-assigned container id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw runtime id.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short id is enough for logs
        for c in self.0.chars().take(12) {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Everything needed to create and start one engine container.
///
/// Immutable once handed to [`ContainerController::create_and_start`].
///
/// [`ContainerController::create_and_start`]: crate::container::ContainerController::create_and_start
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Image reference, e.g. `mcr.microsoft.com/mssql/server:2022-latest`.
    pub image: String,
    /// Container name; empty lets the runtime pick one.
    pub name: String,
    /// Host port the engine's internal port is bound to.
    pub port: u16,
    /// Port the engine listens on inside the container.
    pub port_internal: u16,
    /// Hostname inside the container.
    pub hostname: String,
    /// Target CPU architecture, e.g. `amd64`.
    pub architecture: String,
    /// Target OS, e.g. `linux`.
    pub os: String,
    /// Environment variables, `NAME=value` form.
    pub env: Vec<String>,
    /// Optional command override.
    pub command: Option<Vec<String>>,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            image: String::new(),
            name: String::new(),
            port: 1433,
            port_internal: 1433,
            hostname: String::new(),
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            env: Vec::new(),
            command: None,
        }
    }
}

impl RunSpec {
    /// The `os/arch` platform string the runtime expects.
    pub fn platform(&self) -> String {
        format!("{}/{}", self.os, self.architecture)
    }
}

/// One in-container command invocation. Side-effect free as a value.
#[derive(Debug, Clone, Default)]
pub struct ExecSpec {
    /// Command argv.
    pub cmd: Vec<String>,
    /// User to run as; empty uses the image default.
    pub user: Option<String>,
    /// Extra environment variables, `NAME=value` form.
    pub env: Option<Vec<String>>,
}

impl ExecSpec {
    /// An exec spec with just an argv.
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            user: None,
            env: None,
        }
    }

    /// Run as a specific user.
    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Add extra environment variables.
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = Some(env);
        self
    }
}

/// Captured output of one exec session.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Demultiplexed standard output.
    pub stdout: Vec<u8>,
    /// Demultiplexed standard error.
    pub stderr: Vec<u8>,
    /// Exit code, when the runtime reported one.
    pub exit_code: Option<i64>,
}

impl ExecOutput {
    /// Stdout as lossy UTF-8.
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as lossy UTF-8.
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// True when the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
