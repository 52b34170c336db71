//! Database ingestion: take a source (local path or URL to a backup, data
//! file, package, script, archive or repository) and turn it into a live
//! database inside a running engine container.
//!
//! The pipeline is assembled from three strategy families:
//! - [`Location`]: where the source lives and how it reaches the container
//! - [`Extractor`]: optional decompression of archive sources
//! - [`Mechanism`]: how the staged payload becomes a live database
//!
//! [`Ingestor`] sequences them: validate, stage, extract, bring online, set
//! the login's default database.

pub mod error;
pub mod extract;
pub mod location;
pub mod mechanism;
pub mod orchestrator;
pub mod progress;
pub mod query;

pub use error::{IngestError, Result};
pub use extract::{ExtractedFiles, Extractor, ExtractorRegistry};
pub use location::{Location, for_descriptor};
pub use mechanism::{
    BACKUP_FOLDER, BringOnlineOptions, DATA_FOLDER, Mechanism, MechanismContext,
    MechanismRegistry,
};
pub use orchestrator::{IngestSettings, IngestState, Ingestor};
pub use progress::{Progress, TracingProgress};
pub use query::{QueryRunner, SqlcmdQueryRunner};
