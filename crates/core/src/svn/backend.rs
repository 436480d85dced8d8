//! The narrow contract the adapter needs from a Subversion client.
//!
//! [`SvnClient`](super::SvnClient) implements it on top of the `svn` binary;
//! tests substitute scripted implementations.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::parser::{SvnDiffEntry, SvnListEntry, SvnLogEntry};
use crate::errors::SvnError;

/// A revision selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Revision {
    Head,
    Number(i64),
}

impl Revision {
    /// Parse a revision id as used by the generic abstraction. `None` and
    /// `"HEAD"` select the latest revision.
    pub fn parse(id: Option<&str>) -> Result<Self, std::num::ParseIntError> {
        match id.map(str::trim) {
            None => Ok(Self::Head),
            Some(s) if s.eq_ignore_ascii_case("head") => Ok(Self::Head),
            Some(s) => s.trim_start_matches('r').parse::<i64>().map(Self::Number),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => write!(f, "HEAD"),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for Revision {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// Node kind of a repository path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    None,
    File,
    Dir,
}

impl NodeKind {
    pub fn from_svn(kind: &str) -> Self {
        match kind {
            "file" => Self::File,
            "dir" => Self::Dir,
            _ => Self::None,
        }
    }

    pub fn exists(self) -> bool {
        self != Self::None
    }
}

/// What a newly committed revision looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub revision: i64,
    pub author: String,
}

/// Which part of a path conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Text,
    Property,
    Tree,
}

/// A conflict detected while merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDescription {
    /// Path relative to the working-copy root, `/`-separated.
    pub path: String,
    pub kind: ConflictKind,
}

/// How the merge engine should treat a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Leave the conflict in place and keep merging.
    Postpone,
    /// Keep the working copy's file as it was before the merge.
    MineFull,
    /// Take the incoming file.
    TheirsFull,
    /// Keep the file as the merge left it, markers included.
    Working,
    /// Revert to the common ancestor.
    Base,
}

impl ConflictChoice {
    /// Value for `svn resolve --accept`.
    pub fn as_accept_arg(self) -> &'static str {
        match self {
            Self::Postpone => "postpone",
            Self::MineFull => "mine-full",
            Self::TheirsFull => "theirs-full",
            Self::Working => "working",
            Self::Base => "base",
        }
    }
}

/// Conflict callback handed to [`SvnBackend::merge`].
pub type ConflictHandler<'a> = dyn FnMut(&ConflictDescription) -> ConflictChoice + Send + 'a;

/// Username/password pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// HTTP proxy used for `http://` / `https://` repositories.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Operations of the wrapped Subversion client.
///
/// URLs are absolute. Working-copy paths are local directories.
#[async_trait]
pub trait SvnBackend: Send + Sync {
    /// Whether `path` holds an initialised working copy.
    async fn is_working_copy(&self, path: &Path) -> Result<bool, SvnError>;

    async fn checkout(&self, url: &str, path: &Path, revision: Revision) -> Result<(), SvnError>;

    /// Point an existing working copy at `url`, keeping unchanged files.
    async fn switch(&self, url: &str, path: &Path, revision: Revision) -> Result<(), SvnError>;

    /// Server-side copy of `src_url@revision` to `dst_url`, creating parents.
    async fn copy(
        &self,
        src_url: &str,
        revision: Revision,
        dst_url: &str,
        message: &str,
    ) -> Result<CommitInfo, SvnError>;

    /// Create directories (and their parents) in one commit.
    async fn mkdir(&self, urls: &[String], message: &str) -> Result<CommitInfo, SvnError>;

    async fn delete(&self, url: &str, message: &str) -> Result<CommitInfo, SvnError>;

    /// Merge `src_url` over `start:end` into the working copy at `wc`.
    ///
    /// Every conflict is reported to `on_conflict`; the returned choice is
    /// applied before the call returns.
    async fn merge(
        &self,
        src_url: &str,
        start: Revision,
        end: Revision,
        wc: &Path,
        on_conflict: &mut ConflictHandler<'_>,
    ) -> Result<(), SvnError>;

    /// Commit everything under `wc`. `None` when there was nothing to commit.
    async fn commit(&self, wc: &Path, message: &str) -> Result<Option<CommitInfo>, SvnError>;

    /// Discard all local changes under `wc`, unversioned files included.
    async fn revert(&self, wc: &Path) -> Result<(), SvnError>;

    /// Schedule `path` (and unversioned parents) for addition.
    async fn add(&self, wc: &Path, path: &Path) -> Result<(), SvnError>;

    async fn cat(&self, url: &str, revision: Revision) -> Result<Vec<u8>, SvnError>;

    /// Kind of `url` at `revision`; [`NodeKind::None`] when it does not exist.
    async fn node_kind(&self, url: &str, revision: Revision) -> Result<NodeKind, SvnError>;

    async fn list(&self, url: &str) -> Result<Vec<SvnListEntry>, SvnError>;

    /// Log of `url` (pegged at `peg`) over `start:end`, in that order.
    async fn log(
        &self,
        url: &str,
        peg: Revision,
        start: Revision,
        end: Revision,
        limit: Option<usize>,
        stop_on_copy: bool,
    ) -> Result<Vec<SvnLogEntry>, SvnError>;

    /// Files that differ between `old_url@HEAD` and `new_url@HEAD`.
    async fn diff_summarize(&self, old_url: &str, new_url: &str)
        -> Result<Vec<SvnDiffEntry>, SvnError>;

    /// Unified diff between `old_url@HEAD` and `new_url@HEAD`.
    async fn diff(&self, old_url: &str, new_url: &str) -> Result<String, SvnError>;

    /// Repository root URL (without trailing `/`) of the repository holding `url`.
    async fn repository_root(&self, url: &str) -> Result<String, SvnError>;

    fn set_credentials(&mut self, credentials: Option<Credentials>);

    fn set_proxy(&mut self, proxy: Option<ProxySettings>);
}
