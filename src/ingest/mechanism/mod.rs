//! Online mechanism strategies: turning a staged file into a live database.
//!
//! Each mechanism owns its in-container staging folder, the SQL/shell steps
//! to bring the payload online, and the file extensions it accepts. Selection
//! goes through an explicit [`MechanismRegistry`]: an explicit user-specified
//! name wins, otherwise the file extension decides.

mod attach;
mod dacfx;
mod git;
mod restore;
mod script;

use std::sync::Arc;

use async_trait::async_trait;

pub use attach::Attach;
pub use dacfx::DacFx;
pub use git::GitClone;
pub use restore::Restore;
pub use script::Script;

use crate::container::{ContainerController, ContainerHandle};
use crate::ingest::error::Result;
use crate::ingest::progress::Progress;
use crate::ingest::query::QueryRunner;

/// Engine data folder; attach targets live here.
pub const DATA_FOLDER: &str = "/var/opt/mssql/data";
/// Engine backup folder; everything else is staged here.
pub const BACKUP_FOLDER: &str = "/var/opt/mssql/backup";

/// Inputs a mechanism needs beyond the database name.
#[derive(Debug, Clone, Default)]
pub struct BringOnlineOptions {
    /// Staged filename inside the staging folder.
    pub filename: String,
    /// Companion log filename, set only when extraction produced two files.
    pub log_filename: Option<String>,
    /// Target login, for mechanisms that must authenticate.
    pub username: String,
    /// Target password.
    pub password: String,
}

/// Collaborators a mechanism works against for one ingestion.
pub struct MechanismContext<'a> {
    pub controller: &'a ContainerController,
    pub handle: &'a ContainerHandle,
    pub query: &'a dyn QueryRunner,
    pub progress: &'a dyn Progress,
}

/// One strategy for making a staged payload a live database.
#[async_trait]
pub trait Mechanism: Send + Sync {
    /// Stable name, usable as an explicit `--mechanism` override.
    fn name(&self) -> &'static str;

    /// File extensions this mechanism consumes directly.
    fn file_types(&self) -> &'static [&'static str];

    /// In-container folder sources for this mechanism are staged into.
    fn staging_folder(&self) -> &'static str;

    /// Make the payload live. `database_name` arrives identifier-escaped,
    /// ready for use inside `[...]` brackets.
    async fn bring_online(
        &self,
        ctx: &MechanismContext<'_>,
        database_name: &str,
        options: &BringOnlineOptions,
    ) -> Result<()>;
}

/// Explicit registry of mechanisms.
pub struct MechanismRegistry {
    mechanisms: Vec<Arc<dyn Mechanism>>,
}

impl MechanismRegistry {
    /// The standard set.
    pub fn standard() -> Self {
        Self {
            mechanisms: vec![
                Arc::new(Attach),
                Arc::new(Restore),
                Arc::new(DacFx),
                Arc::new(Script),
                Arc::new(GitClone),
            ],
        }
    }

    /// Select a mechanism: an explicit name wins over extension matching.
    pub fn select(&self, explicit: Option<&str>, extension: &str) -> Option<Arc<dyn Mechanism>> {
        if let Some(name) = explicit
            && let Some(mechanism) = self.by_name(name)
        {
            return Some(mechanism);
        }
        self.by_extension(extension)
    }

    /// Look up a mechanism by name.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Mechanism>> {
        self.mechanisms.iter().find(|m| m.name() == name).cloned()
    }

    /// Look up a mechanism by file extension.
    pub fn by_extension(&self, extension: &str) -> Option<Arc<dyn Mechanism>> {
        self.mechanisms
            .iter()
            .find(|m| m.file_types().contains(&extension))
            .cloned()
    }

    /// Every extension any registered mechanism consumes.
    pub fn file_types(&self) -> Vec<&'static str> {
        self.mechanisms
            .iter()
            .flat_map(|m| m.file_types().iter().copied())
            .collect()
    }

    /// Names of all registered mechanisms.
    pub fn names(&self) -> Vec<&'static str> {
        self.mechanisms.iter().map(|m| m.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_fallback_selection() {
        let registry = MechanismRegistry::standard();
        assert_eq!(registry.select(None, "bak").unwrap().name(), "restore");
        assert_eq!(registry.select(None, "mdf").unwrap().name(), "attach");
        assert_eq!(registry.select(None, "bacpac").unwrap().name(), "dacfx");
        assert_eq!(registry.select(None, "dacpac").unwrap().name(), "dacfx");
        assert_eq!(registry.select(None, "sql").unwrap().name(), "script");
        assert_eq!(registry.select(None, "git").unwrap().name(), "git");
    }

    #[test]
    fn test_explicit_name_wins_over_extension() {
        let registry = MechanismRegistry::standard();
        // Conflicting extension: .bak would pick restore, the name wins.
        let selected = registry.select(Some("attach"), "bak").unwrap();
        assert_eq!(selected.name(), "attach");
    }

    #[test]
    fn test_unknown_name_falls_back_to_extension() {
        let registry = MechanismRegistry::standard();
        let selected = registry.select(Some("bogus"), "bak").unwrap();
        assert_eq!(selected.name(), "restore");
    }

    #[test]
    fn test_no_match_yields_none() {
        let registry = MechanismRegistry::standard();
        assert!(registry.select(None, "xyz").is_none());
        assert!(registry.by_name("bogus").is_none());
    }

    #[test]
    fn test_staging_folders() {
        let registry = MechanismRegistry::standard();
        assert_eq!(registry.by_name("attach").unwrap().staging_folder(), DATA_FOLDER);
        for name in ["restore", "dacfx", "script", "git"] {
            assert_eq!(
                registry.by_name(name).unwrap().staging_folder(),
                BACKUP_FOLDER,
                "{name} stages into the backup folder"
            );
        }
    }

    #[test]
    fn test_file_types_cover_all_mechanisms() {
        let registry = MechanismRegistry::standard();
        let types = registry.file_types();
        for ext in ["mdf", "bak", "bacpac", "dacpac", "sql", "git"] {
            assert!(types.contains(&ext), "{ext} missing");
        }
    }
}
