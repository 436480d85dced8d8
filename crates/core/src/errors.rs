//! Error types for the svnvcs core library.
//!
//! [`SvnError`] describes faults of the wrapped `svn` client, [`VcsError`] is
//! the closed taxonomy the adapter hands to its callers, and [`ConfigError`]
//! covers configuration loading.

use std::sync::OnceLock;

use regex_lite::Regex;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Adapter errors
// ---------------------------------------------------------------------------

/// Errors returned by every [`SvnVcs`](crate::SvnVcs) operation.
///
/// Backend faults never escape as raw [`SvnError`]s: they are either mapped to
/// one of the specific variants or wrapped in [`VcsError::Backend`].
#[derive(Debug, Error)]
pub enum VcsError {
    /// A branch with this name already exists.
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    /// A tag with this name already exists.
    #[error("tag '{0}' already exists")]
    TagExists(String),

    /// The branch exists but the file does not (at the given revision).
    #[error("file '{path}' not found at revision {revision}")]
    FileNotFound { path: String, revision: String },

    /// The branch itself does not exist in the repository.
    #[error("branch '{branch}' not found in {repo}")]
    BranchNotFound { repo: String, branch: String },

    /// Any other fault reported by the svn client.
    #[error("svn backend error: {0}")]
    Backend(#[source] SvnError),

    /// A fault that did not come from the svn client (local I/O, bad input).
    #[error("{context}")]
    Unexpected {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl VcsError {
    /// Wrap a non-backend fault, keeping it as the error source.
    pub fn unexpected<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Unexpected {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Returns `true` for errors that originated in the svn client.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

// ---------------------------------------------------------------------------
// SVN errors
// ---------------------------------------------------------------------------

/// svn: item already exists (copy destination, mkdir target).
pub const SVN_ERR_ITEM_EXISTS: u32 = 160020;
/// svn: path not found in the repository filesystem.
pub const SVN_ERR_PATH_NOT_FOUND: u32 = 160013;
/// svn: path is not a working copy.
pub const SVN_ERR_NOT_WORKING_COPY: u32 = 155007;
/// svn: URL does not exist in the requested revision.
pub const SVN_ERR_URL_NONEXISTENT: u32 = 170000;
/// svn: one or more command-line targets do not exist.
pub const SVN_ERR_TARGETS_MISSING: u32 = 200009;
/// svn: merge stopped because conflicts were produced in an earlier range.
pub const SVN_ERR_MERGE_CONFLICTS_PRODUCED: u32 = 155015;

/// Errors from SVN CLI operations.
#[derive(Debug, Error)]
pub enum SvnError {
    /// The `svn` binary was not found on `$PATH`.
    #[error("svn binary not found: {0}")]
    BinaryNotFound(String),

    /// An `svn` command exited with a non-zero status.
    #[error("svn command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Could not parse the XML output produced by `svn`.
    #[error("failed to parse svn XML output: {0}")]
    XmlParseError(String),

    /// The command succeeded but printed something we could not interpret.
    #[error("unexpected svn output: {0}")]
    UnexpectedOutput(String),

    /// Generic I/O wrapper.
    #[error("svn I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SvnError {
    /// Numeric svn error and warning codes (`E160013`, `W170000`, ...) found
    /// in the command's stderr, in order of appearance.
    pub fn codes(&self) -> Vec<u32> {
        match self {
            Self::CommandFailed { stderr, .. } => extract_codes(stderr),
            _ => Vec::new(),
        }
    }

    pub fn has_code(&self, code: u32) -> bool {
        self.codes().contains(&code)
    }

    /// The item being created already exists.
    pub fn is_item_exists(&self) -> bool {
        self.has_code(SVN_ERR_ITEM_EXISTS)
    }

    /// The addressed path or URL does not exist.
    pub fn is_not_found(&self) -> bool {
        let codes = self.codes();
        [
            SVN_ERR_PATH_NOT_FOUND,
            SVN_ERR_URL_NONEXISTENT,
            SVN_ERR_TARGETS_MISSING,
        ]
        .iter()
        .any(|c| codes.contains(c))
    }
}

fn code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b[EW](\d{6}):").ok())
        .as_ref()
}

fn extract_codes(stderr: &str) -> Vec<u32> {
    let Some(pattern) = code_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(stderr)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn failed(stderr: &str) -> SvnError {
        SvnError::CommandFailed {
            exit_code: 1,
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_error_display_messages() {
        let err = VcsError::BranchExists("feature".into());
        assert_eq!(err.to_string(), "branch 'feature' already exists");

        let err = VcsError::FileNotFound {
            path: "a.txt".into(),
            revision: "HEAD".into(),
        };
        assert_eq!(err.to_string(), "file 'a.txt' not found at revision HEAD");

        let err = ConfigError::InvalidValue {
            field: "svn.url".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("svn.url"));
    }

    #[test]
    fn test_codes_extracted_from_stderr() {
        let err = failed(
            "svn: warning: W170000: URL 'file:///r/trunk/x' non-existent in revision 3\n\
             svn: E200009: Could not display info for all targets because some targets don't exist\n",
        );
        assert_eq!(err.codes(), vec![170000, 200009]);
        assert!(err.is_not_found());
        assert!(!err.is_item_exists());
    }

    #[test]
    fn test_item_exists_detected() {
        let err = failed("svn: E160020: Path 'branches/feature' already exists\n");
        assert!(err.is_item_exists());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_codes_empty_for_non_command_errors() {
        let err = SvnError::BinaryNotFound("svn".into());
        assert!(err.codes().is_empty());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_backend_error_keeps_cause() {
        let err = VcsError::Backend(failed("svn: E170013: Unable to connect\n"));
        assert!(err.is_backend());
        let source = err.source().map(ToString::to_string).unwrap_or_default();
        assert!(source.contains("E170013"));
    }

    #[test]
    fn test_unexpected_is_not_backend() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = VcsError::unexpected("failed to write a.txt", io);
        assert!(!err.is_backend());
        assert_eq!(err.to_string(), "failed to write a.txt");
        assert!(err.source().is_some());
    }
}
