//! DacFx: import a `.bacpac`/`.dacpac` export package via sqlpackage.

use async_trait::async_trait;

use crate::container::ExecSpec;
use crate::ingest::error::{IngestError, Result};
use crate::ingest::mechanism::{
    BACKUP_FOLDER, BringOnlineOptions, Mechanism, MechanismContext,
};

const DOTNET_ROOT: &str = "/opt/dotnet";
const DOTNET_BIN: &str = "/opt/dotnet/dotnet";
const SQLPACKAGE_BIN: &str = "/home/mssql/.dotnet/tools/sqlpackage";

pub struct DacFx;

#[async_trait]
impl Mechanism for DacFx {
    fn name(&self) -> &'static str {
        "dacfx"
    }

    fn file_types(&self) -> &'static [&'static str] {
        &["bacpac", "dacpac"]
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
            return Err(IngestError::invariant("filename is required for dacfx"));
        }

        install_sqlpackage(ctx).await?;

        // A package import cannot target the login's current default
        // database, so point the login at master first.
        ctx.query
            .query(&format!(
                "ALTER LOGIN [{}] WITH DEFAULT_DATABASE = [master]",
                options.username
            ))
            .await?;

        ctx.progress
            .info(&format!("Importing database {database_name}"));

        let source = format!("{}/{}", self.staging_folder(), options.filename);
        let import = run(
            ctx,
            [
                SQLPACKAGE_BIN,
                "/Diagnostics:true",
                "/Action:import",
                &format!("/SourceFile:{source}"),
                "/TargetServerName:localhost",
                &format!("/TargetDatabaseName:{database_name}"),
                "/TargetTrustServerCertificate:true",
                &format!("/TargetUser:{}", options.username),
                &format!("/TargetPassword:{}", options.password),
            ],
        )
        .await?;

        if import.stderr.is_empty() {
            // Import succeeded, the source package is no longer needed.
            run_as_root(ctx, ["rm", &source]).await?;
        }

        Ok(())
    }
}

/// Install dotnet and sqlpackage inside the container, skipping whichever
/// is already present.
async fn install_sqlpackage(ctx: &MechanismContext<'_>) -> Result<()> {
    install_dotnet(ctx).await?;

    let probe = run(ctx, [SQLPACKAGE_BIN, "/version"]).await?;
    if !probe.stderr.is_empty() {
        ctx.progress.info("Installing sqlpackage");
        run(ctx, [DOTNET_BIN, "tool", "install", "-g", "microsoft.sqlpackage"]).await?;
    }

    Ok(())
}

async fn install_dotnet(ctx: &MechanismContext<'_>) -> Result<()> {
    let probe = run(ctx, [DOTNET_BIN, "--version"]).await?;
    if probe.stderr.is_empty() {
        return Ok(());
    }

    ctx.progress.info("Installing the dotnet runtime");

    run(
        ctx,
        ["wget", "https://dot.net/v1/dotnet-install.sh", "-O", "/tmp/dotnet-install.sh"],
    )
    .await?;
    run(ctx, ["chmod", "+x", "/tmp/dotnet-install.sh"]).await?;
    run(ctx, ["/tmp/dotnet-install.sh", "--install-dir", DOTNET_ROOT]).await?;

    // The engine image has no /home/mssql, which breaks every tool that
    // wants to create a ~/.toolname folder.
    run_as_root(ctx, ["mkdir", "-p", "/home/mssql"]).await?;
    run_as_root(ctx, ["chown", "mssql:root", "/home/mssql"]).await?;

    append_line(ctx, "export DOTNET_ROOT=/opt/dotnet", "/home/mssql/.bashrc").await?;
    append_line(
        ctx,
        "export PATH=$PATH:$DOTNET_ROOT:/home/mssql/.dotnet/tools",
        "/home/mssql/.bashrc",
    )
    .await?;

    Ok(())
}

async fn append_line(ctx: &MechanismContext<'_>, text: &str, file: &str) -> Result<()> {
    run(ctx, ["/bin/bash", "-c", &format!("echo '{text}' >> {file}")]).await?;
    Ok(())
}

async fn run<'a>(
    ctx: &MechanismContext<'_>,
    cmd: impl IntoIterator<Item = &'a str>,
) -> Result<crate::container::ExecOutput> {
    let spec = ExecSpec::new(cmd).with_env(vec![format!("DOTNET_ROOT={DOTNET_ROOT}")]);
    Ok(ctx.controller.exec(ctx.handle, &spec).await?)
}

async fn run_as_root<'a>(
    ctx: &MechanismContext<'_>,
    cmd: impl IntoIterator<Item = &'a str>,
) -> Result<crate::container::ExecOutput> {
    let spec = ExecSpec::new(cmd).as_user("root");
    Ok(ctx.controller.exec(ctx.handle, &spec).await?)
}
