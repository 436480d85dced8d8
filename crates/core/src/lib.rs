//! svnvcs core library.
//!
//! A Subversion backend for a generic version-control abstraction: branches,
//! merges, tags, diffs, history and file content of a repository laid out as
//! `trunk/`, `branches/` and `tags/`. All version-control work is delegated to
//! the `svn` command-line client; this crate builds URLs, manages scratch
//! working copies, sequences checkout, merge and commit, and maps client
//! faults onto [`VcsError`].

pub mod config;
pub mod errors;
pub mod layout;
pub mod models;
pub mod svn;
pub mod vcs;
pub mod workspace;

// Re-exports for convenience.
pub use config::AdapterConfig;
pub use errors::{ConfigError, SvnError, VcsError};
pub use layout::RepoLayout;
pub use models::{
    ChangeListNode, ChangeType, Commit, DiffEntry, MergeResult, Tag, WalkDirection,
    CHANGE_LIST_MESSAGE_SEPARATOR,
};
pub use svn::{SvnBackend, SvnClient};
pub use vcs::{SvnVcs, SVN_VCS_TYPE};
pub use workspace::{LockedWorkingCopy, RepositoryWorkspace};
