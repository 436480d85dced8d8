//! Repository path conventions.
//!
//! The default branch lives at `trunk/`, named branches under `branches/`
//! and tags under `tags/`, all relative to one repository URL fixed at
//! construction.

use crate::errors::ConfigError;

/// Path of the default branch, relative to the repository URL.
pub const TRUNK_PATH: &str = "trunk/";
/// Prefix of named branches.
pub const BRANCHES_PATH: &str = "branches/";
/// Prefix of tags.
pub const TAGS_PATH: &str = "tags/";

const SUPPORTED_SCHEMES: &[&str] = &["file://", "http://", "https://", "svn://", "svn+ssh://"];

/// Resolves branch, tag and file names to repository URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    root: String,
}

impl RepoLayout {
    /// Normalise `repo_url` (forward slashes, trailing `/`) and check that it
    /// uses a scheme the svn client understands.
    pub fn new(repo_url: &str) -> Result<Self, ConfigError> {
        let mut root = repo_url.trim().replace('\\', "/");
        let lower = root.to_ascii_lowercase();
        let Some(scheme) = SUPPORTED_SCHEMES.iter().find(|s| lower.starts_with(**s)) else {
            return Err(ConfigError::InvalidValue {
                field: "svn.url".into(),
                detail: format!("unsupported repository URL '{}'", repo_url),
            });
        };
        if root.len() == scheme.len() {
            return Err(ConfigError::InvalidValue {
                field: "svn.url".into(),
                detail: format!("repository URL '{}' has no path", repo_url),
            });
        }
        if !root.ends_with('/') {
            root.push('/');
        }
        Ok(Self { root })
    }

    /// Repository URL, always ending in `/`.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Repository-relative path of a branch; `None` is trunk.
    pub fn branch_path(&self, branch: Option<&str>) -> String {
        match branch {
            None => TRUNK_PATH.to_string(),
            Some(name) => format!("{}{}", BRANCHES_PATH, name),
        }
    }

    pub fn branch_url(&self, branch: Option<&str>) -> String {
        format!("{}{}", self.root, self.branch_path(branch))
    }

    pub fn branches_url(&self) -> String {
        format!("{}{}", self.root, BRANCHES_PATH)
    }

    pub fn trunk_url(&self) -> String {
        format!("{}{}", self.root, TRUNK_PATH)
    }

    pub fn tags_url(&self) -> String {
        format!("{}{}", self.root, TAGS_PATH)
    }

    pub fn tag_url(&self, name: &str) -> String {
        format!("{}{}{}", self.root, TAGS_PATH, name)
    }

    /// URL of `file_path` inside a branch.
    pub fn file_url(&self, branch: Option<&str>, file_path: &str) -> String {
        join_url(&self.branch_url(branch), file_path)
    }

    /// Human-readable branch name for error messages.
    pub fn display_branch(branch: Option<&str>) -> String {
        branch.unwrap_or("trunk").to_string()
    }
}

/// Join a URL and a relative path with exactly one `/` between them.
pub fn join_url(base: &str, path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path)
}
