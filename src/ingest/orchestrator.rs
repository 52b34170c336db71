//! The ingestion pipeline: validate, stage, extract, bring online, set the
//! default database.
//!
//! Strictly sequential; one ingestion per container lifecycle. Terminal
//! failure at any stage aborts the remaining stages with no rollback of
//! already-staged files (the caller discards the container on failure).

use std::sync::Arc;

use crate::container::{ContainerController, ContainerHandle};
use crate::ingest::error::{IngestError, Result};
use crate::ingest::extract::ExtractorRegistry;
use crate::ingest::location::{self, Location};
use crate::ingest::mechanism::{
    BACKUP_FOLDER, BringOnlineOptions, DATA_FOLDER, Mechanism, MechanismContext,
    MechanismRegistry,
};
use crate::ingest::progress::{Progress, TracingProgress};
use crate::ingest::query::QueryRunner;
use crate::source::SourceDescriptor;

/// Pipeline state. Each operation requires the state its predecessor left
/// behind; driving the pipeline out of order is an invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Created,
    Validated,
    Staged,
    Extracted,
    Online,
    DefaultDatabaseSet,
}

/// Caller-tunable knobs for one ingestion.
pub struct IngestSettings {
    /// Explicit mechanism name; wins over file-extension matching.
    pub mechanism: Option<String>,
    /// Progress reporter.
    pub progress: Box<dyn Progress>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            mechanism: None,
            progress: Box::new(TracingProgress),
        }
    }
}

/// One ingestion: a source descriptor composed with location, extractor and
/// mechanism strategies over a borrowed container controller.
pub struct Ingestor<'a> {
    controller: &'a ContainerController,
    descriptor: SourceDescriptor,
    location: Box<dyn Location>,
    mechanisms: MechanismRegistry,
    extractors: ExtractorRegistry,
    explicit_mechanism: Option<String>,
    mechanism: Option<Arc<dyn Mechanism>>,
    progress: Box<dyn Progress>,
    options: BringOnlineOptions,
    handle: Option<ContainerHandle>,
    state: IngestState,
}

impl<'a> Ingestor<'a> {
    /// Parse the source and select initial strategies. No I/O happens here.
    pub fn new(
        source: &str,
        controller: &'a ContainerController,
        settings: IngestSettings,
    ) -> Result<Self> {
        let descriptor = SourceDescriptor::parse(source)?;
        let location = location::for_descriptor(&descriptor);
        let mechanisms = MechanismRegistry::standard();
        let extractors = ExtractorRegistry::standard();

        let mechanism = mechanisms.select(
            settings.mechanism.as_deref(),
            &descriptor.file_extension,
        );

        Ok(Self {
            controller,
            descriptor,
            location,
            mechanisms,
            extractors,
            explicit_mechanism: settings.mechanism,
            mechanism,
            progress: settings.progress,
            options: BringOnlineOptions::default(),
            handle: None,
            state: IngestState::Created,
        })
    }

    /// The parsed source.
    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    /// Current pipeline state.
    pub fn state(&self) -> IngestState {
        self.state
    }

    /// The derived database name.
    pub fn database_name(&self) -> &str {
        &self.descriptor.database_name
    }

    /// True for sources fetched over the network.
    pub fn is_remote(&self) -> bool {
        !self.location.is_local()
    }

    /// Name of the selected mechanism, once one is resolved.
    pub fn online_method(&self) -> Option<&'static str> {
        self.mechanism.as_ref().map(|m| m.name())
    }

    /// Whether this source needs a decompression step.
    pub fn extraction_needed(&self) -> bool {
        self.extractors
            .by_extension(&self.descriptor.file_extension)
            .is_some()
    }

    /// Comma-joined list of every supported file extension, for hints.
    pub fn valid_file_extensions(&self) -> String {
        let mut extensions = self.mechanisms.file_types();
        extensions.extend(self.extractors.file_types());
        extensions.join(", ")
    }

    /// Whether the source actually exists (stat or HTTP HEAD).
    pub async fn source_exists(&self) -> bool {
        self.location.exists().await
    }

    /// Check scheme, extension and mechanism name before any network or
    /// container call. Configuration errors raised here carry hints.
    pub fn validate(&mut self) -> Result<()> {
        self.expect_state(IngestState::Created, "validate")?;

        if let Some(name) = &self.explicit_mechanism
            && self.mechanisms.by_name(name).is_none()
        {
            return Err(IngestError::UnknownMechanism {
                name: name.clone(),
                known: self.mechanisms.names().iter().map(|n| n.to_string()).collect(),
            });
        }

        if !self.descriptor.is_local
            && !self
                .location
                .valid_schemes()
                .contains(&self.descriptor.scheme.as_str())
        {
            return Err(IngestError::InvalidScheme {
                scheme: self.descriptor.scheme.clone(),
                valid: self
                    .location
                    .valid_schemes()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                hints: vec![
                    "Use an http:// or https:// URL, or a local file path".to_string(),
                ],
            });
        }

        if self.mechanism.is_none() && !self.extraction_needed() {
            return Err(IngestError::UnsupportedExtension {
                extension: self.descriptor.file_extension.clone(),
                supported: self.valid_file_extensions(),
                hints: vec![
                    format!(
                        "Point --use at a file with one of these extensions: {}",
                        self.valid_file_extensions()
                    ),
                    "Or pick an online mechanism explicitly with --mechanism".to_string(),
                ],
            });
        }

        self.state = IngestState::Validated;
        Ok(())
    }

    /// Stage the source into the container.
    pub async fn stage(&mut self, handle: &ContainerHandle) -> Result<()> {
        self.expect_state(IngestState::Validated, "stage")?;

        self.handle = Some(handle.clone());

        // The git mechanism works host-side; nothing to stage in-container.
        if self.online_method() == Some("git") {
            self.options.filename = self.descriptor.location.clone();
            self.state = IngestState::Staged;
            return Ok(());
        }

        let dest_folder = if self.extraction_needed() {
            // Archives land in the backup folder; extraction writes the
            // payload into the data folder afterwards.
            BACKUP_FOLDER
        } else {
            match &self.mechanism {
                Some(mechanism) => mechanism.staging_folder(),
                None => {
                    return Err(IngestError::invariant(
                        "no mechanism selected before staging",
                    ));
                }
            }
        };

        let verb = if self.is_remote() { "Downloading" } else { "Copying" };
        self.progress
            .info(&format!("{verb} {}", self.descriptor.filename));

        self.location
            .copy_to_container(self.controller, handle, dest_folder)
            .await?;

        if self.descriptor.filename.is_empty() {
            return Err(IngestError::invariant("staged filename is empty"));
        }
        self.options.filename = self.descriptor.filename.clone();

        self.state = IngestState::Staged;
        Ok(())
    }

    /// Run the extraction step and re-select the mechanism by the extracted
    /// data file's extension when none was chosen explicitly.
    pub async fn extract(&mut self) -> Result<()> {
        self.expect_state(IngestState::Staged, "extract")?;

        let extractor = self
            .extractors
            .by_extension(&self.descriptor.file_extension)
            .ok_or_else(|| {
                IngestError::invariant(format!(
                    "no extractor registered for extension {:?}",
                    self.descriptor.file_extension
                ))
            })?;
        let handle = self.expect_handle()?;

        if !extractor.is_installed(self.controller, &handle).await {
            self.progress.info("Installing extraction tool");
            extractor.install(self.controller, &handle).await?;
        }

        self.progress
            .info(&format!("Extracting {}", self.options.filename));

        let files = extractor
            .extract(self.controller, &handle, &self.options.filename, DATA_FOLDER)
            .await?;

        if files.data_file.is_empty() {
            return Err(IngestError::invariant(
                "archive contained no attachable data file",
            ));
        }

        self.options.filename = files.data_file;
        self.options.log_filename = if files.log_file.is_empty() {
            None
        } else {
            Some(files.log_file)
        };

        if self.explicit_mechanism.is_none() {
            let extension = extension_of(&self.options.filename);
            self.mechanism = self.mechanisms.by_extension(&extension);
        }

        self.state = IngestState::Extracted;
        Ok(())
    }

    /// Make the staged payload a live database, then point the login's
    /// default database at it.
    pub async fn bring_online(
        &mut self,
        query: &dyn QueryRunner,
        username: &str,
        password: &str,
    ) -> Result<()> {
        match self.state {
            IngestState::Staged if self.extraction_needed() => {
                return Err(IngestError::invariant(
                    "extract must run before bring_online for this source",
                ));
            }
            IngestState::Staged | IngestState::Extracted => {}
            other => {
                return Err(IngestError::invariant(format!(
                    "bring_online called in state {other:?}"
                )));
            }
        }

        let mechanism = self.mechanism.clone().ok_or_else(|| {
            IngestError::invariant("no mechanism resolved before bring_online")
        })?;
        if self.options.filename.is_empty() {
            return Err(IngestError::invariant(
                "filename is empty, was stage() called?",
            ));
        }
        let handle = self.expect_handle()?;

        self.options.username = username.to_string();
        self.options.password = password.to_string();

        let ctx = MechanismContext {
            controller: self.controller,
            handle: &handle,
            query,
            progress: self.progress.as_ref(),
        };

        mechanism
            .bring_online(
                &ctx,
                &self.descriptor.database_name_as_identifier,
                &self.options,
            )
            .await?;

        self.state = IngestState::Online;

        // Always the last step, run unconditionally after a successful
        // online transition; git has no database to point at.
        if mechanism.name() != "git" {
            query
                .query(&default_database_statement(
                    username,
                    &self.descriptor.database_name_as_non_identifier,
                ))
                .await?;
        }

        self.state = IngestState::DefaultDatabaseSet;
        Ok(())
    }

    /// Drive the whole pipeline for one source.
    pub async fn run(
        &mut self,
        handle: &ContainerHandle,
        query: &dyn QueryRunner,
        username: &str,
        password: &str,
    ) -> Result<()> {
        // Callers may have validated already, to fail before pulling images.
        if self.state == IngestState::Created {
            self.validate()?;
        }

        if !self.source_exists().await {
            return Err(IngestError::SourceMissing {
                location: self.descriptor.location.clone(),
            });
        }

        self.stage(handle).await?;
        if self.extraction_needed() {
            self.extract().await?;
        }
        self.bring_online(query, username, password).await
    }

    fn expect_state(&self, expected: IngestState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(IngestError::invariant(format!(
                "{operation} called in state {:?}, expected {expected:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn expect_handle(&self) -> Result<ContainerHandle> {
        self.handle
            .clone()
            .ok_or_else(|| IngestError::invariant("no container handle, was stage() called?"))
    }
}

/// `ALTER LOGIN .. WITH DEFAULT_DATABASE` targeting the ingested database.
fn default_database_statement(username: &str, database_name_non_identifier: &str) -> String {
    format!(
        "ALTER LOGIN [{username}] WITH DEFAULT_DATABASE = [{database_name_non_identifier}]"
    )
}

/// Lower-cased extension of a filename, without the dot.
fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => filename[idx + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::progress::RecordingProgress;
    use pretty_assertions::assert_eq;

    fn controller() -> ContainerController {
        // The HTTP transport is constructed lazily, with no socket probe;
        // these tests never issue a runtime call.
        ContainerController::new(
            bollard::Docker::connect_with_http(
                "http://localhost:2375",
                4,
                bollard::API_DEFAULT_VERSION,
            )
            .expect("client construction"),
        )
    }

    #[test]
    fn test_scenario_a_remote_bak_selects_restore() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "https://example.com/sample.bak",
            &controller,
            IngestSettings::default(),
        )
        .unwrap();

        ingestor.validate().unwrap();
        assert_eq!(ingestor.state(), IngestState::Validated);
        assert_eq!(ingestor.database_name(), "sample");
        assert_eq!(ingestor.online_method(), Some("restore"));
        assert!(ingestor.is_remote());
        assert!(!ingestor.extraction_needed());
        assert_eq!(
            ingestor.mechanism.as_ref().unwrap().staging_folder(),
            "/var/opt/mssql/backup"
        );
    }

    #[test]
    fn test_scenario_b_archive_defers_mechanism_selection() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "backup.7z,Northwind",
            &controller,
            IngestSettings::default(),
        )
        .unwrap();

        ingestor.validate().unwrap();
        assert_eq!(ingestor.database_name(), "Northwind");
        assert!(ingestor.extraction_needed());
        // No mechanism consumes .7z directly; selection happens after
        // extraction reveals the data file.
        assert_eq!(ingestor.online_method(), None);

        // Post-extraction re-selection by data-file extension.
        let registry = MechanismRegistry::standard();
        let reselected = registry.by_extension(&extension_of("data.mdf")).unwrap();
        assert_eq!(reselected.name(), "attach");
    }

    #[test]
    fn test_ftp_scheme_rejected_before_any_io() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "ftp://example.com/sample.bak",
            &controller,
            IngestSettings::default(),
        )
        .unwrap();

        let err = ingestor.validate().unwrap_err();
        match err {
            IngestError::InvalidScheme { scheme, valid, .. } => {
                assert_eq!(scheme, "ftp");
                assert_eq!(valid, vec!["https", "http"]);
            }
            other => panic!("expected InvalidScheme, got {other}"),
        }
        assert_eq!(ingestor.state(), IngestState::Created);
    }

    #[test]
    fn test_unsupported_extension_rejected_with_hints() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "https://example.com/sample.xyz",
            &controller,
            IngestSettings::default(),
        )
        .unwrap();

        let err = ingestor.validate().unwrap_err();
        assert!(!err.hints().is_empty());
        assert!(matches!(err, IngestError::UnsupportedExtension { .. }));
    }

    #[test]
    fn test_unknown_explicit_mechanism_rejected() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "https://example.com/sample.bak",
            &controller,
            IngestSettings {
                mechanism: Some("bogus".to_string()),
                progress: Box::new(RecordingProgress::default()),
            },
        )
        .unwrap();

        let err = ingestor.validate().unwrap_err();
        assert!(matches!(err, IngestError::UnknownMechanism { .. }));
    }

    #[test]
    fn test_explicit_mechanism_beats_extension() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "https://example.com/sample.bak",
            &controller,
            IngestSettings {
                mechanism: Some("attach".to_string()),
                progress: Box::new(RecordingProgress::default()),
            },
        )
        .unwrap();

        ingestor.validate().unwrap();
        assert_eq!(ingestor.online_method(), Some("attach"));
    }

    #[tokio::test]
    async fn test_stage_before_validate_is_invariant_violation() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "https://example.com/sample.bak",
            &controller,
            IngestSettings::default(),
        )
        .unwrap();

        let handle = ContainerHandle::new("deadbeef");
        let err = ingestor.stage(&handle).await.unwrap_err();
        assert!(err.is_invariant());
    }

    #[tokio::test]
    async fn test_bring_online_before_stage_is_invariant_violation() {
        let controller = controller();
        let mut ingestor = Ingestor::new(
            "https://example.com/sample.bak",
            &controller,
            IngestSettings::default(),
        )
        .unwrap();
        ingestor.validate().unwrap();

        let query = crate::ingest::query::RecordingQueryRunner::default();
        let err = ingestor.bring_online(&query, "sa", "pw").await.unwrap_err();
        assert!(err.is_invariant());
    }

    #[test]
    fn test_default_database_statement_targets_escaped_name() {
        assert_eq!(
            default_database_statement("sa", "sample"),
            "ALTER LOGIN [sa] WITH DEFAULT_DATABASE = [sample]"
        );
        assert_eq!(
            default_database_statement("sa", "We]]ird"),
            "ALTER LOGIN [sa] WITH DEFAULT_DATABASE = [We]]ird]"
        );
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("data.MDF"), "mdf");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of("a.b.ldf"), "ldf");
    }

    #[test]
    fn test_valid_file_extensions_union() {
        let controller = controller();
        let ingestor = Ingestor::new(
            "https://example.com/sample.bak",
            &controller,
            IngestSettings::default(),
        )
        .unwrap();

        let extensions = ingestor.valid_file_extensions();
        for ext in ["mdf", "bak", "bacpac", "dacpac", "sql", "git", "7z", "tar"] {
            assert!(extensions.contains(ext), "{ext} missing from {extensions}");
        }
    }
}
