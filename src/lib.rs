//! sqldock: provision a SQL Server engine in a container and ingest a
//! database source into it.
//!
//! The crate is split along its two halves:
//! - [`container`]: a thin control surface over a Docker-compatible runtime
//! - [`ingest`]: the pipeline that turns a source (backup, data file,
//!   package, script, archive or repository) into a live database
//!
//! [`source`] parses the user-facing source string, [`config`] resolves the
//! engine container settings, and [`cli`] wires it all into subcommands.

pub mod cli;
pub mod config;
pub mod container;
pub mod ingest;
pub mod source;
