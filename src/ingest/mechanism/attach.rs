//! Attach: register existing `.mdf`/`.ldf` files as a database.

use async_trait::async_trait;

use crate::container::ExecSpec;
use crate::ingest::error::{IngestError, Result};
use crate::ingest::mechanism::{
    BringOnlineOptions, DATA_FOLDER, Mechanism, MechanismContext,
};

pub struct Attach;

#[async_trait]
impl Mechanism for Attach {
    fn name(&self) -> &'static str {
        "attach"
    }

    fn file_types(&self) -> &'static [&'static str] {
        &["mdf"]
    }

    fn staging_folder(&self) -> &'static str {
        DATA_FOLDER
    }

    async fn bring_online(
        &self,
        ctx: &MechanismContext<'_>,
        database_name: &str,
        options: &BringOnlineOptions,
    ) -> Result<()> {
        if options.filename.is_empty() {
            return Err(IngestError::invariant("filename is required for attach"));
        }

        ctx.progress
            .info(&format!("Attaching database {database_name}"));

        let data_path = format!("{}/{}", self.staging_folder(), options.filename);
        set_file_permissions(ctx, &data_path).await?;

        let log_path = match &options.log_filename {
            Some(log_filename) if !log_filename.is_empty() => {
                let log_path = format!("{}/{log_filename}", self.staging_folder());
                set_file_permissions(ctx, &log_path).await?;
                Some(log_path)
            }
            _ => None,
        };

        ctx.query
            .query(&attach_statement(database_name, &data_path, log_path.as_deref()))
            .await
    }
}

/// `CREATE DATABASE .. FOR ATTACH` with one FILENAME clause per physical file.
fn attach_statement(database_name: &str, data_path: &str, log_path: Option<&str>) -> String {
    match log_path {
        Some(log_path) => format!(
            "SET NOCOUNT ON; CREATE DATABASE [{database_name}] \
             ON (FILENAME = '{data_path}'), (FILENAME = '{log_path}') FOR ATTACH;"
        ),
        None => format!(
            "SET NOCOUNT ON; CREATE DATABASE [{database_name}] \
             ON (FILENAME = '{data_path}') FOR ATTACH;"
        ),
    }
}

/// Hand a physical file to the engine user before attach touches it.
async fn set_file_permissions(ctx: &MechanismContext<'_>, path: &str) -> Result<()> {
    for cmd in [
        vec!["chown", "mssql:root", path],
        vec!["chmod", "o-r", path],
        vec!["chmod", "u+rw", path],
        vec!["chmod", "g+r", path],
    ] {
        ctx.controller.exec(ctx.handle, &ExecSpec::new(cmd)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_identity() {
        let attach = Attach;
        assert_eq!(attach.name(), "attach");
        assert_eq!(attach.file_types(), &["mdf"]);
        assert_eq!(attach.staging_folder(), "/var/opt/mssql/data");
    }

    #[test]
    fn test_single_file_attach_statement() {
        let sql = attach_statement("Northwind", "/var/opt/mssql/data/data.mdf", None);
        assert_eq!(
            sql,
            "SET NOCOUNT ON; CREATE DATABASE [Northwind] \
             ON (FILENAME = '/var/opt/mssql/data/data.mdf') FOR ATTACH;"
        );
    }

    #[test]
    fn test_two_file_attach_statement() {
        let sql = attach_statement(
            "Northwind",
            "/var/opt/mssql/data/data.mdf",
            Some("/var/opt/mssql/data/data.ldf"),
        );
        assert!(sql.contains(
            "(FILENAME = '/var/opt/mssql/data/data.mdf'), (FILENAME = '/var/opt/mssql/data/data.ldf')"
        ));
        assert!(sql.ends_with("FOR ATTACH;"));
    }

    #[test]
    fn test_escaped_name_stays_inside_brackets() {
        // A name containing ']' arrives pre-escaped; the statement must not
        // close the bracket early.
        let sql = attach_statement("We]]ird", "/var/opt/mssql/data/w.mdf", None);
        assert!(sql.contains("CREATE DATABASE [We]]ird]"));
    }
}
