//! Extractor strategies for archive formats that bundle data and log files.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::container::{ContainerController, ContainerHandle, ExecSpec};
use crate::ingest::error::Result;
use crate::ingest::mechanism::BACKUP_FOLDER;

/// Filenames an extraction step produced: the data file, and the log file
/// when the archive contained one (empty otherwise, single-file attach).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFiles {
    pub data_file: String,
    pub log_file: String,
}

/// Unpacks one archive format inside the container.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// File extensions this extractor consumes.
    fn file_types(&self) -> &'static [&'static str];

    /// Whether the extraction tool is already present in the container.
    /// Callers must check this before `install`; install is not idempotent.
    async fn is_installed(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
    ) -> bool;

    /// Download and unpack the extraction tool itself into the container.
    async fn install(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
    ) -> Result<()>;

    /// Extract `src_file` (staged in the backup folder) into `dest_folder`
    /// and classify the resulting data/log files.
    async fn extract(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
        src_file: &str,
        dest_folder: &str,
    ) -> Result<ExtractedFiles>;
}

/// Explicit registry of extractors, keyed by file extension.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// The standard set: 7-zip archives and tarballs.
    pub fn standard() -> Self {
        Self {
            extractors: vec![Arc::new(SevenZip), Arc::new(TarBall)],
        }
    }

    /// Look up the extractor for a file extension.
    pub fn by_extension(&self, extension: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors
            .iter()
            .find(|e| e.file_types().contains(&extension))
            .cloned()
    }

    /// Every extension any registered extractor consumes.
    pub fn file_types(&self) -> Vec<&'static str> {
        self.extractors
            .iter()
            .flat_map(|e| e.file_types().iter().copied())
            .collect()
    }
}

const SEVEN_ZIP_DIR: &str = "/opt/7-zip";
const SEVEN_ZIP_BIN: &str = "/opt/7-zip/7zz";
const SEVEN_ZIP_URL: &str = "https://7-zip.org/a/7z2201-linux-x64.tar.xz";

/// 7-zip archives bundling an `.mdf` / `.ldf` pair.
pub struct SevenZip;

#[async_trait]
impl Extractor for SevenZip {
    fn file_types(&self) -> &'static [&'static str] {
        &["7z"]
    }

    async fn is_installed(
        &self,
        _controller: &ContainerController,
        _handle: &ContainerHandle,
    ) -> bool {
        // Always reports not-installed, so install runs on every ingestion;
        // see DESIGN.md.
        false
    }

    async fn install(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
    ) -> Result<()> {
        controller
            .exec(handle, &ExecSpec::new(["mkdir", "-p", SEVEN_ZIP_DIR]))
            .await?;
        controller
            .exec(
                handle,
                &ExecSpec::new(["wget", "-O", "/opt/7-zip/7-zip.tar", SEVEN_ZIP_URL]),
            )
            .await?;
        controller
            .exec(
                handle,
                &ExecSpec::new(["tar", "xvf", "/opt/7-zip/7-zip.tar", "-C", SEVEN_ZIP_DIR]),
            )
            .await?;
        controller
            .exec(handle, &ExecSpec::new(["chmod", "u+x", SEVEN_ZIP_BIN]))
            .await?;
        Ok(())
    }

    async fn extract(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
        src_file: &str,
        dest_folder: &str,
    ) -> Result<ExtractedFiles> {
        let archive = format!("{BACKUP_FOLDER}/{src_file}");

        controller
            .exec(
                handle,
                &ExecSpec::new([
                    SEVEN_ZIP_BIN,
                    "x",
                    "-aoa",
                    &format!("-o{dest_folder}"),
                    &archive,
                ]),
            )
            .await?;

        let listing = controller
            .exec(
                handle,
                &ExecSpec::new([SEVEN_ZIP_BIN, "l", "-ba", "-slt", &archive]),
            )
            .await?;

        let mut files = ExtractedFiles::default();
        for path in listed_paths(&listing.stdout_str()) {
            if files.data_file.is_empty() && path.to_ascii_lowercase().ends_with(".mdf") {
                files.data_file = path.clone();
            }
            if files.log_file.is_empty() && path.to_ascii_lowercase().ends_with(".ldf") {
                files.log_file = path.clone();
            }
        }

        Ok(files)
    }
}

/// Scan `7zz l -slt` output for `Path = <value>` entries.
fn listed_paths(listing: &str) -> Vec<String> {
    let re = Regex::new(r"Path\s*=\s*(\S+)").expect("static regex");
    re.captures_iter(listing)
        .map(|c| c[1].to_string())
        .collect()
}

/// Plain tarballs. The engine image ships `tar`, so there is nothing to
/// install; extraction is a placeholder.
pub struct TarBall;

#[async_trait]
impl Extractor for TarBall {
    fn file_types(&self) -> &'static [&'static str] {
        &["tar"]
    }

    async fn is_installed(
        &self,
        _controller: &ContainerController,
        _handle: &ContainerHandle,
    ) -> bool {
        true
    }

    async fn install(
        &self,
        _controller: &ContainerController,
        _handle: &ContainerHandle,
    ) -> Result<()> {
        Ok(())
    }

    async fn extract(
        &self,
        _controller: &ContainerController,
        _handle: &ContainerHandle,
        _src_file: &str,
        _dest_folder: &str,
    ) -> Result<ExtractedFiles> {
        Ok(ExtractedFiles::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_selects_by_extension() {
        let registry = ExtractorRegistry::standard();
        assert!(registry.by_extension("7z").is_some());
        assert!(registry.by_extension("tar").is_some());
        assert!(registry.by_extension("bak").is_none());
        assert_eq!(registry.file_types(), vec!["7z", "tar"]);
    }

    #[test]
    fn test_listed_paths_scans_slt_output() {
        let listing = "\
Path = data.mdf
Size = 8388608
Path = data.ldf
Size = 1048576
Path = readme.txt
";
        assert_eq!(listed_paths(listing), vec!["data.mdf", "data.ldf", "readme.txt"]);
    }

    #[test]
    fn test_listed_paths_tolerates_spacing() {
        assert_eq!(listed_paths("Path=a.mdf\nPath  =  b.ldf"), vec!["a.mdf", "b.ldf"]);
        assert!(listed_paths("no entries here").is_empty());
    }

    #[test]
    fn test_classification_takes_first_match() {
        let mut files = ExtractedFiles::default();
        for path in listed_paths("Path = one.mdf\nPath = two.mdf\nPath = one.ldf") {
            if files.data_file.is_empty() && path.ends_with(".mdf") {
                files.data_file = path.clone();
            }
            if files.log_file.is_empty() && path.ends_with(".ldf") {
                files.log_file = path.clone();
            }
        }
        assert_eq!(files.data_file, "one.mdf");
        assert_eq!(files.log_file, "one.ldf");
    }
}
