//! The SQL boundary: an opaque query collaborator.
//!
//! The pipeline never interprets SQL; it hands statements to a
//! [`QueryRunner`] and treats any error as fatal.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::container::{ContainerController, ContainerHandle, ExecSpec};
use crate::ingest::error::{IngestError, Result};

/// Executes one SQL statement or script against the target engine.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Run the statement; any error is fatal to the ingestion.
    async fn query(&self, text: &str) -> Result<()>;
}

/// Paths where the engine image ships its command-line SQL client.
const SQLCMD_PATHS: [&str; 2] = [
    "/opt/mssql-tools18/bin/sqlcmd",
    "/opt/mssql-tools/bin/sqlcmd",
];

/// Production runner: execs `sqlcmd` inside the engine container.
pub struct SqlcmdQueryRunner {
    controller: ContainerController,
    handle: ContainerHandle,
    username: String,
    password: String,
}

impl SqlcmdQueryRunner {
    pub fn new(
        controller: ContainerController,
        handle: ContainerHandle,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            handle,
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl QueryRunner for SqlcmdQueryRunner {
    async fn query(&self, text: &str) -> Result<()> {
        let mut last_reason = String::new();

        for path in SQLCMD_PATHS {
            let spec = ExecSpec::new([
                path,
                "-S",
                "localhost",
                "-U",
                &self.username,
                "-P",
                &self.password,
                "-C",
                "-b",
                "-Q",
                text,
            ]);

            let output = self.controller.exec(&self.handle, &spec).await?;
            match output.exit_code {
                Some(0) => return Ok(()),
                // 126/127: the client binary is missing at this path, try the next
                Some(126) | Some(127) => {
                    last_reason = format!("{path} not found in container");
                    continue;
                }
                code => {
                    return Err(IngestError::Sql {
                        reason: format!(
                            "sqlcmd exited with {code:?}: {}",
                            output.stderr_str().trim()
                        ),
                    });
                }
            }
        }

        Err(IngestError::Sql { reason: last_reason })
    }
}

/// Test runner that records every statement and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingQueryRunner {
    statements: Mutex<Vec<String>>,
}

impl RecordingQueryRunner {
    /// Statements issued so far.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().expect("query lock poisoned").clone()
    }
}

#[async_trait]
impl QueryRunner for RecordingQueryRunner {
    async fn query(&self, text: &str) -> Result<()> {
        self.statements
            .lock()
            .expect("query lock poisoned")
            .push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_runner_captures_statements() {
        let runner = RecordingQueryRunner::default();
        runner.query("SELECT 1").await.unwrap();
        runner.query("SELECT 2").await.unwrap();
        assert_eq!(runner.statements(), vec!["SELECT 1", "SELECT 2"]);
    }
}
