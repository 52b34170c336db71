//! Source descriptor parsing.
//!
//! Turns a user-supplied database source string (URL or path, optionally
//! suffixed with `,databaseName`) into the fields the ingestion pipeline
//! selects strategies by: scheme, local/remote classification, file
//! extension, and the derived database name with its T-SQL escaped forms.
//!
//! Pure string work, no I/O.

use thiserror::Error;
use url::Url;

/// A source string that could not be parsed.
#[derive(Debug, Error)]
#[error("invalid database source {input:?}: {reason}")]
pub struct SourceParseError {
    /// The offending input.
    pub input: String,
    /// What went wrong.
    pub reason: String,
}

/// Parsed form of a `--use` database source.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// The input as given.
    pub raw: String,
    /// The source with path separators normalized and any `,databaseName`
    /// override removed; what location strategies fetch.
    pub location: String,
    /// URL scheme; empty for a plain local path.
    pub scheme: String,
    /// True when the source lives on the local filesystem.
    pub is_local: bool,
    /// Filename component of the source path.
    pub filename: String,
    /// Lower-cased extension of `filename`, without the dot.
    pub file_extension: String,
    /// Explicit override after the comma, else filename sans extension.
    pub database_name: String,
    /// `database_name` escaped for use inside `[...]` brackets:
    /// every `'` doubled, then every `]` doubled.
    pub database_name_as_identifier: String,
    /// `database_name` with only every `]` doubled.
    pub database_name_as_non_identifier: String,
}

impl SourceDescriptor {
    /// Parse a source string.
    pub fn parse(raw: &str) -> Result<Self, SourceParseError> {
        // Normalize separators so URL parsing succeeds uniformly for inputs
        // that came from Windows shells.
        let mut normalized = raw.replace('\\', "/");

        // A bare filename means the current directory.
        if !normalized.contains('/') {
            normalized = format!("./{normalized}");
        }

        let scheme = match Url::parse(&normalized) {
            Ok(parsed) => parsed.scheme().to_string(),
            Err(url::ParseError::RelativeUrlWithoutBase) => String::new(),
            Err(e) => {
                return Err(SourceParseError {
                    input: raw.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        // A scheme shorter than 3 chars is a Windows drive letter, not a
        // protocol.
        let is_local = scheme == "file" || scheme.len() < 3;

        // The parser's view of a URL path is percent-encoded; the override
        // and the derived database name must keep the literal input text, so
        // the path component comes from the normalized string instead.
        let path_part = if scheme.len() < 3 {
            normalized.clone()
        } else {
            match normalized.split_once("://") {
                Some((_, rest)) => match rest.find('/') {
                    Some(idx) => rest[idx..].to_string(),
                    None => String::new(),
                },
                None => String::new(),
            }
        };

        // Everything after the first comma in the path is the explicit
        // database name override, embedded commas and brackets included.
        let (true_path, override_name) = match path_part.split_once(',') {
            Some((before, after)) => (before.to_string(), Some(after.to_string())),
            None => (path_part, None),
        };

        let location = match &override_name {
            Some(name) => normalized.replacen(&format!(",{name}"), "", 1),
            None => normalized,
        };

        // Query and fragment never belong to the filename.
        let filename = true_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        let file_extension = match filename.rfind('.') {
            Some(idx) => filename[idx + 1..].to_ascii_lowercase(),
            None => String::new(),
        };

        let database_name = match override_name {
            Some(name) => name,
            None => match filename.rfind('.') {
                Some(idx) => filename[..idx].to_string(),
                None => filename.clone(),
            },
        };

        let database_name_as_identifier = escape_identifier(&database_name);
        let database_name_as_non_identifier = escape_non_identifier(&database_name);

        Ok(Self {
            raw: raw.to_string(),
            location,
            scheme,
            is_local,
            filename,
            file_extension,
            database_name,
            database_name_as_identifier,
            database_name_as_non_identifier,
        })
    }
}

/// Escape a database name for use inside `[...]` T-SQL brackets: single
/// quotes doubled, then closing brackets doubled. Apply exactly once.
fn escape_identifier(name: &str) -> String {
    name.replace('\'', "''").replace(']', "]]")
}

/// Escape a database name for non-identifier positions: only closing
/// brackets doubled.
fn escape_non_identifier(name: &str) -> String {
    name.replace(']', "]]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remote_bak_no_override() {
        let d = SourceDescriptor::parse("https://example.com/sample.bak").unwrap();
        assert_eq!(d.scheme, "https");
        assert!(!d.is_local);
        assert_eq!(d.filename, "sample.bak");
        assert_eq!(d.file_extension, "bak");
        assert_eq!(d.database_name, "sample");
        assert_eq!(d.location, "https://example.com/sample.bak");
    }

    #[test]
    fn test_override_wins_over_filename() {
        let d = SourceDescriptor::parse("https://example.com/sample.bak,Northwind").unwrap();
        assert_eq!(d.database_name, "Northwind");
        assert_eq!(d.filename, "sample.bak");
        assert_eq!(d.file_extension, "bak");
        assert_eq!(d.location, "https://example.com/sample.bak");
    }

    #[test]
    fn test_remote_override_with_space_stays_literal() {
        let d = SourceDescriptor::parse("https://example.com/sample.bak,My Database").unwrap();
        assert_eq!(d.database_name, "My Database");
        assert_eq!(d.filename, "sample.bak");
        assert_eq!(d.location, "https://example.com/sample.bak");
    }

    #[test]
    fn test_remote_path_is_not_percent_encoded() {
        let d = SourceDescriptor::parse("https://example.com/my backup.bak").unwrap();
        assert_eq!(d.filename, "my backup.bak");
        assert_eq!(d.database_name, "my backup");
    }

    #[test]
    fn test_query_string_excluded_from_filename() {
        let d = SourceDescriptor::parse("https://example.com/sample.bak?token=abc").unwrap();
        assert_eq!(d.filename, "sample.bak");
        assert_eq!(d.database_name, "sample");
    }

    #[test]
    fn test_override_keeps_embedded_commas_and_brackets() {
        let d = SourceDescriptor::parse("https://example.com/db.bak,My,Odd]Name").unwrap();
        assert_eq!(d.database_name, "My,Odd]Name");
        assert_eq!(d.database_name_as_identifier, "My,Odd]]Name");
        assert_eq!(d.database_name_as_non_identifier, "My,Odd]]Name");
    }

    #[test]
    fn test_bare_filename_is_local() {
        let d = SourceDescriptor::parse("backup.7z,Northwind").unwrap();
        assert!(d.is_local);
        assert_eq!(d.scheme, "");
        assert_eq!(d.filename, "backup.7z");
        assert_eq!(d.file_extension, "7z");
        assert_eq!(d.database_name, "Northwind");
    }

    #[test]
    fn test_windows_path_and_drive_letter() {
        let d = SourceDescriptor::parse(r"c:\backups\AdventureWorks.mdf").unwrap();
        assert!(d.is_local, "drive letter must not count as a scheme");
        assert_eq!(d.filename, "AdventureWorks.mdf");
        assert_eq!(d.file_extension, "mdf");
        assert_eq!(d.database_name, "AdventureWorks");
    }

    #[test]
    fn test_file_scheme_is_local() {
        let d = SourceDescriptor::parse("file:///tmp/demo.bak").unwrap();
        assert!(d.is_local);
        assert_eq!(d.scheme, "file");
        assert_eq!(d.database_name, "demo");
    }

    #[test]
    fn test_ftp_is_not_local() {
        let d = SourceDescriptor::parse("ftp://example.com/sample.bak").unwrap();
        assert!(!d.is_local);
        assert_eq!(d.scheme, "ftp");
    }

    #[test]
    fn test_extension_lowercased() {
        let d = SourceDescriptor::parse("./Sample.BAK").unwrap();
        assert_eq!(d.file_extension, "bak");
        assert_eq!(d.database_name, "Sample");
    }

    #[test]
    fn test_no_filename_yields_empty_database_name() {
        let d = SourceDescriptor::parse("https://example.com").unwrap();
        assert_eq!(d.database_name, "");

        let d = SourceDescriptor::parse("https://example.com,").unwrap();
        assert_eq!(d.database_name, "");
    }

    #[test]
    fn test_multi_dot_filename_strips_one_suffix() {
        let d = SourceDescriptor::parse("https://example.com/my.backup.v2.bak").unwrap();
        assert_eq!(d.file_extension, "bak");
        assert_eq!(d.database_name, "my.backup.v2");
    }

    #[test]
    fn test_identifier_escaping() {
        let d = SourceDescriptor::parse("a.bak,It's]Mine").unwrap();
        assert_eq!(d.database_name, "It's]Mine");
        assert_eq!(d.database_name_as_identifier, "It''s]]Mine");
        assert_eq!(d.database_name_as_non_identifier, "It's]]Mine");
    }

    #[test]
    fn test_escape_helpers() {
        assert_eq!(escape_identifier("a'b]c"), "a''b]]c");
        assert_eq!(escape_non_identifier("a'b]c"), "a'b]]c");
        // Doubling is not idempotent: callers must escape exactly once.
        assert_eq!(escape_non_identifier("a]]c"), "a]]]]c");
    }
}
