//! Git clone: fetch a sample-database repository into the working directory.
//!
//! The only mechanism that works host-side: it clones the source repository
//! into the current directory so its contents (scripts, projects) are
//! available locally. Refuses to run in a non-empty directory unless that
//! directory is already a clone of the same remote.

use async_trait::async_trait;
use tokio::process::Command;

use crate::ingest::error::{IngestError, Result};
use crate::ingest::mechanism::{
    BACKUP_FOLDER, BringOnlineOptions, Mechanism, MechanismContext,
};

pub struct GitClone;

#[async_trait]
impl Mechanism for GitClone {
    fn name(&self) -> &'static str {
        "git"
    }

    fn file_types(&self) -> &'static [&'static str] {
        &["git"]
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
            return Err(IngestError::invariant("repository URL is required for git"));
        }
        let url = &options.filename;

        let mut entries = std::fs::read_dir(".")?;
        if entries.next().is_some() {
            if already_cloned(url).await? {
                ctx.progress.info("Repository already cloned, continuing");
                return Ok(());
            }
            // Destructive-overwrite guard
            return Err(IngestError::CloneTargetNotEmpty { url: url.clone() });
        }

        ctx.progress.info(&format!("Cloning {url}"));

        let status = Command::new("git")
            .args(["clone", url, "."])
            .status()
            .await?;
        if !status.success() {
            return Err(IngestError::CloneFailed {
                url: url.clone(),
                reason: format!("git exited with {status}"),
            });
        }

        ctx.progress.info("Repository cloned successfully");
        Ok(())
    }
}

/// True when the current directory is already a clone whose `origin`
/// remote matches `url`.
async fn already_cloned(url: &str) -> Result<bool> {
    if !std::path::Path::new(".git").exists() {
        return Ok(false);
    }

    let output = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
        .await?;
    if !output.status.success() {
        return Ok(false);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim() == url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_identity() {
        let git = GitClone;
        assert_eq!(git.name(), "git");
        assert_eq!(git.file_types(), &["git"]);
    }
}
