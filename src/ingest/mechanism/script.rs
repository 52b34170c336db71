//! Script: run a staged `.sql` file as-is.

use async_trait::async_trait;

use crate::container::ExecSpec;
use crate::ingest::error::{IngestError, Result};
use crate::ingest::mechanism::{
    BACKUP_FOLDER, BringOnlineOptions, Mechanism, MechanismContext,
};

pub struct Script;

#[async_trait]
impl Mechanism for Script {
    fn name(&self) -> &'static str {
        "script"
    }

    fn file_types(&self) -> &'static [&'static str] {
        &["sql"]
    }

    fn staging_folder(&self) -> &'static str {
        BACKUP_FOLDER
    }

    async fn bring_online(
        &self,
        ctx: &MechanismContext<'_>,
        _database_name: &str,
        options: &BringOnlineOptions,
    ) -> Result<()> {
        if options.filename.is_empty() {
            return Err(IngestError::invariant("filename is required for script"));
        }

        ctx.progress
            .info(&format!("Running script {}", options.filename));

        // The staged file's contents go to the query callback untransformed.
        let staged = format!("{}/{}", self.staging_folder(), options.filename);
        let contents = ctx
            .controller
            .exec(ctx.handle, &ExecSpec::new(["cat", &staged]))
            .await?;

        ctx.query.query(&contents.stdout_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_identity() {
        let script = Script;
        assert_eq!(script.name(), "script");
        assert_eq!(script.file_types(), &["sql"]);
        assert_eq!(script.staging_folder(), "/var/opt/mssql/backup");
    }
}
