//! Restore: reconstruct a database from a `.bak` backup file.

use async_trait::async_trait;

use crate::ingest::error::{IngestError, Result};
use crate::ingest::mechanism::{
    BACKUP_FOLDER, BringOnlineOptions, Mechanism, MechanismContext,
};

pub struct Restore;

#[async_trait]
impl Mechanism for Restore {
    fn name(&self) -> &'static str {
        "restore"
    }

    fn file_types(&self) -> &'static [&'static str] {
        &["bak"]
    }

    fn staging_folder(&self) -> &'static str {
        BACKUP_FOLDER
    }

    async fn bring_online(
        &self,
        ctx: &MechanismContext<'_>,
        database_name: &str,
        options: &BringOnlineOptions,
    ) -> Result<()> {
        if options.filename.is_empty() {
            return Err(IngestError::invariant("filename is required for restore"));
        }
        if database_name.is_empty() {
            return Err(IngestError::invariant(
                "database name is required for restore",
            ));
        }

        ctx.progress
            .info(&format!("Restoring database {database_name}"));

        ctx.query
            .query(&restore_statement(
                self.staging_folder(),
                &options.filename,
                database_name,
            ))
            .await
    }
}

/// Reads the backup's file list and builds a `RESTORE DATABASE .. WITH MOVE`
/// statement dynamically, relocating every logical file to the data folder.
fn restore_statement(backup_folder: &str, filename: &str, database_name: &str) -> String {
    format!(
        r#"SET NOCOUNT ON;

-- Build a SQL Statement to restore any .bak file to the Linux filesystem
DECLARE @sql NVARCHAR(max)

-- This table definition works since SQL Server 2017, therefore
-- works for all SQL Server containers (which started in 2017)
DECLARE @fileListTable TABLE (
    [LogicalName]           NVARCHAR(128),
    [PhysicalName]          NVARCHAR(260),
    [Type]                  CHAR(1),
    [FileGroupName]         NVARCHAR(128),
    [Size]                  NUMERIC(20,0),
    [MaxSize]               NUMERIC(20,0),
    [FileID]                BIGINT,
    [CreateLSN]             NUMERIC(25,0),
    [DropLSN]               NUMERIC(25,0),
    [UniqueID]              UNIQUEIDENTIFIER,
    [ReadOnlyLSN]           NUMERIC(25,0),
    [ReadWriteLSN]          NUMERIC(25,0),
    [BackupSizeInBytes]     BIGINT,
    [SourceBlockSize]       INT,
    [FileGroupID]           INT,
    [LogGroupGUID]          UNIQUEIDENTIFIER,
    [DifferentialBaseLSN]   NUMERIC(25,0),
    [DifferentialBaseGUID]  UNIQUEIDENTIFIER,
    [IsReadOnly]            BIT,
    [IsPresent]             BIT,
    [TDEThumbprint]         VARBINARY(32),
    [SnapshotURL]           NVARCHAR(360)
)

INSERT INTO @fileListTable
EXEC('RESTORE FILELISTONLY FROM DISK = ''{backup_folder}/{filename}''')
SET @sql = 'RESTORE DATABASE [{database_name}] FROM DISK = ''{backup_folder}/{filename}'' WITH '
SELECT @sql = @sql + char(13) + ' MOVE ''' + LogicalName + ''' TO ''/var/opt/mssql/data/' + LogicalName + '.' + RIGHT(PhysicalName,CHARINDEX('\',PhysicalName)) + ''','
FROM @fileListTable
WHERE IsPresent = 1
SET @sql = SUBSTRING(@sql, 1, LEN(@sql)-1)
EXEC(@sql)"#
    )
}
