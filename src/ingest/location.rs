//! Location strategies: where the source file lives and how it gets into
//! the container filesystem.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::container::{ContainerController, ContainerHandle, ExecSpec};
use crate::ingest::error::Result;
use crate::source::SourceDescriptor;

/// Knows how to test for and stage one database source.
#[async_trait]
pub trait Location: Send + Sync {
    /// True for filesystem sources.
    fn is_local(&self) -> bool;

    /// URL schemes this location kind accepts.
    fn valid_schemes(&self) -> &'static [&'static str];

    /// Whether the source actually exists (stat or HTTP HEAD).
    async fn exists(&self) -> bool;

    /// Stage the source into `dest_folder` inside the container.
    async fn copy_to_container(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
        dest_folder: &str,
    ) -> Result<()>;
}

/// Select the location strategy for a parsed source.
pub fn for_descriptor(descriptor: &SourceDescriptor) -> Box<dyn Location> {
    if descriptor.is_local {
        Box::new(LocalSource {
            path: PathBuf::from(&descriptor.location),
        })
    } else {
        Box::new(RemoteSource {
            url: descriptor.location.clone(),
        })
    }
}

/// A source on the local filesystem.
pub struct LocalSource {
    path: PathBuf,
}

#[async_trait]
impl Location for LocalSource {
    fn is_local(&self) -> bool {
        true
    }

    fn valid_schemes(&self) -> &'static [&'static str] {
        &["", "file"]
    }

    async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }

    async fn copy_to_container(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
        dest_folder: &str,
    ) -> Result<()> {
        controller.copy_file(handle, &self.path, dest_folder).await?;

        let filename = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        // In-container path, always '/'
        let staged = format!("{dest_folder}/{filename}");

        // Hand the file to the engine user: owner rw, group r, others none.
        controller
            .exec(handle, &ExecSpec::new(["chown", "mssql:root", &staged]))
            .await?;
        controller
            .exec(handle, &ExecSpec::new(["chmod", "640", &staged]))
            .await?;

        Ok(())
    }
}

/// A source reachable over HTTP(S).
pub struct RemoteSource {
    url: String,
}

#[async_trait]
impl Location for RemoteSource {
    fn is_local(&self) -> bool {
        false
    }

    fn valid_schemes(&self) -> &'static [&'static str] {
        &["https", "http"]
    }

    async fn exists(&self) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
        {
            Ok(client) => client,
            Err(_) => return false,
        };

        match client.head(&self.url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn copy_to_container(
        &self,
        controller: &ContainerController,
        handle: &ContainerHandle,
        dest_folder: &str,
    ) -> Result<()> {
        // No host-side staging: the download runs inside the container.
        controller
            .download_file(handle, &self.url, dest_folder)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceDescriptor;

    #[test]
    fn test_factory_picks_local_for_paths() {
        let d = SourceDescriptor::parse("./sample.bak").unwrap();
        let location = for_descriptor(&d);
        assert!(location.is_local());
        assert!(location.valid_schemes().contains(&"file"));
    }

    #[test]
    fn test_factory_picks_remote_for_https() {
        let d = SourceDescriptor::parse("https://example.com/sample.bak").unwrap();
        let location = for_descriptor(&d);
        assert!(!location.is_local());
        assert_eq!(location.valid_schemes(), &["https", "http"]);
    }

    #[tokio::test]
    async fn test_local_exists_stats_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("present.bak");
        std::fs::write(&file, b"x").unwrap();

        let there = LocalSource { path: file };
        assert!(there.exists().await);

        let missing = LocalSource {
            path: dir.path().join("absent.bak"),
        };
        assert!(!missing.exists().await);
    }
}
