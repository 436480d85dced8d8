//! Backend-agnostic domain types returned by the adapter.
//!
//! These mirror the generic VCS abstraction: commits, merge results, diff
//! entries and tags carry no Subversion-specific detail apart from using
//! revision numbers as commit ids.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A change successfully applied to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub revision_id: String,
    pub message: String,
    pub author: String,
}

impl Commit {
    /// Sentinel for "the commit produced no revision" (nothing to send).
    pub const EMPTY: Commit = Commit {
        revision_id: String::new(),
        message: String::new(),
        author: String::new(),
    };

    pub fn new(
        revision_id: impl Into<String>,
        message: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            revision_id: revision_id.into(),
            message: message.into(),
            author: author.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

// ---------------------------------------------------------------------------
// Merge result
// ---------------------------------------------------------------------------

/// Outcome of [`SvnVcs::merge`](crate::SvnVcs::merge).
///
/// A merge succeeds exactly when no file conflicted; the constructor keeps
/// the two fields consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    success: bool,
    conflicting_files: Vec<String>,
}

impl MergeResult {
    pub fn from_conflicts(conflicting_files: Vec<String>) -> Self {
        Self {
            success: conflicting_files.is_empty(),
            conflicting_files,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Conflicting paths relative to the working-copy root, in the order the
    /// merge reported them.
    pub fn conflicting_files(&self) -> &[String] {
        &self.conflicting_files
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Kind of change a file underwent between two branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Delete,
    Modify,
    Unknown,
}

impl ChangeType {
    /// Map the `item` attribute of `svn diff --summarize --xml`.
    pub fn from_svn_item(item: &str) -> Self {
        match item {
            "added" => Self::Add,
            "deleted" => Self::Delete,
            "modified" => Self::Modify,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Delete => write!(f, "delete"),
            Self::Modify => write!(f, "modify"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One file that differs between two branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub file_path: String,
    pub change_type: ChangeType,
    pub unified_diff: Option<String>,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// A named, immutable pointer to the commit it was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub message: String,
    pub author: String,
    pub related_commit: Commit,
}

// ---------------------------------------------------------------------------
// Change lists and history walking
// ---------------------------------------------------------------------------

/// One logical file change of a multi-file commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListNode {
    pub file_path: String,
    pub content: String,
    pub log_message: String,
}

impl ChangeListNode {
    pub fn new(
        file_path: impl Into<String>,
        content: impl Into<String>,
        log_message: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
            log_message: log_message.into(),
        }
    }
}

/// Separator placed between the log messages of a multi-file commit.
pub const CHANGE_LIST_MESSAGE_SEPARATOR: &str = "\n";

/// Direction to walk a branch's history in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkDirection {
    /// Oldest first.
    Asc,
    /// Newest first.
    Desc,
}
