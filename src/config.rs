//! Engine container configuration, resolved from the environment.
//!
//! Everything has a sensible default except the SA password, which the
//! engine refuses to start without. `.env` files are loaded by `main`
//! before resolution runs.

use thiserror::Error;

use crate::container::RunSpec;

/// Default engine image.
pub const DEFAULT_IMAGE: &str = "mcr.microsoft.com/mssql/server:2022-latest";
/// Log line that marks the engine as ready for connections.
pub const READY_LOG_PATTERN: &str = "Recovery is complete";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {key}")]
    MissingRequired { key: String },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Engine container settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Image reference to run.
    pub image: String,
    /// Container name; empty lets the runtime assign one.
    pub container_name: String,
    /// Host port bound to the engine's listener.
    pub port: u16,
    /// Hostname inside the container.
    pub hostname: String,
    /// Login used for ingestion queries.
    pub username: String,
    /// SA password handed to the engine on first start.
    pub password: String,
    /// Whether the user accepted the engine's EULA.
    pub accept_eula: bool,
    /// Target CPU architecture.
    pub architecture: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            container_name: String::new(),
            port: 1433,
            hostname: String::new(),
            username: "sa".to_string(),
            password: String::new(),
            accept_eula: false,
            architecture: "amd64".to_string(),
        }
    }
}

impl EngineConfig {
    /// Resolve from the environment. `MSSQL_SA_PASSWORD` is required.
    pub fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let password = optional_env("MSSQL_SA_PASSWORD")?
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "MSSQL_SA_PASSWORD".to_string(),
            })?;

        Ok(Self {
            image: optional_env("SQLDOCK_IMAGE")?.unwrap_or(defaults.image),
            container_name: optional_env("SQLDOCK_CONTAINER_NAME")?
                .unwrap_or(defaults.container_name),
            port: parse_optional_env("SQLDOCK_PORT", defaults.port)?,
            hostname: optional_env("SQLDOCK_HOSTNAME")?.unwrap_or(defaults.hostname),
            username: optional_env("SQLDOCK_USERNAME")?.unwrap_or(defaults.username),
            password,
            accept_eula: optional_env("SQLDOCK_ACCEPT_EULA")?
                .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "y" | "yes"))
                .unwrap_or(defaults.accept_eula),
            architecture: optional_env("SQLDOCK_ARCHITECTURE")?
                .unwrap_or(defaults.architecture),
        })
    }

    /// The container run request this configuration describes.
    pub fn to_run_spec(&self) -> RunSpec {
        RunSpec {
            image: self.image.clone(),
            name: self.container_name.clone(),
            port: self.port,
            hostname: self.hostname.clone(),
            architecture: self.architecture.clone(),
            env: vec![
                "ACCEPT_EULA=Y".to_string(),
                format!("MSSQL_SA_PASSWORD={}", self.password),
            ],
            ..RunSpec::default()
        }
    }
}

/// Read an environment variable, treating "not set" as `None` and any other
/// failure (non-UTF-8) as an error.
fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Read and parse an environment variable, falling back to `default` when
/// it is not set.
fn parse_optional_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_env(key)? {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
