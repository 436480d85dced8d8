//! The Subversion adapter.
//!
//! [`SvnVcs`] maps branch, merge, tag, diff, history and file-content
//! operations onto a repository laid out as `trunk/`, `branches/<name>` and
//! `tags/<name>`. Branch arguments are `Option<&str>`: `None` is trunk.
//!
//! Operations that only touch URLs talk to the backend directly; the others
//! borrow a scratch working copy from the [`RepositoryWorkspace`] for the
//! duration of the call.

mod branches;
mod content;
mod history;
mod merge;
mod tags;
mod translate;

use std::path::Path;

use tracing::{debug, info};

use crate::config::AdapterConfig;
use crate::errors::{ConfigError, SvnError, VcsError};
use crate::layout::{RepoLayout, BRANCHES_PATH, TAGS_PATH, TRUNK_PATH};
use crate::models::Commit;
use crate::svn::{Credentials, ProxySettings, Revision, SvnBackend, SvnClient};
use crate::workspace::{LockedWorkingCopy, RepositoryWorkspace, DEFAULT_MAX_WORKING_COPIES};

pub(crate) use translate::parse_revision;

/// Identifier reported by [`SvnVcs::vcs_type`].
pub const SVN_VCS_TYPE: &str = "svn";

/// Subversion implementation of the generic VCS operations.
pub struct SvnVcs<B: SvnBackend = SvnClient> {
    backend: B,
    layout: RepoLayout,
    workspace: RepositoryWorkspace,
}

impl SvnVcs<SvnClient> {
    /// Adapter for `repo_url` driving the `svn` binary, with working copies
    /// kept under `workspace_home`.
    pub fn new(
        repo_url: &str,
        credentials: Option<Credentials>,
        workspace_home: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let layout = RepoLayout::new(repo_url)?;
        let client = SvnClient::new(layout.root(), credentials);
        Ok(Self::assemble(
            client,
            layout,
            workspace_home,
            DEFAULT_MAX_WORKING_COPIES,
        ))
    }

    /// Build the adapter from a loaded (and resolved) configuration.
    pub fn from_config(config: &AdapterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = RepoLayout::new(&config.svn.url)?;
        let mut client = SvnClient::new(layout.root(), config.svn.credentials());
        if let Some(proxy) = &config.proxy {
            client.set_proxy(Some(proxy.settings()));
        }
        Ok(Self::assemble(
            client,
            layout,
            &config.workspace.home,
            config.workspace.max_working_copies,
        ))
    }
}

impl<B: SvnBackend> SvnVcs<B> {
    /// Adapter over an arbitrary backend.
    pub fn with_backend(
        backend: B,
        repo_url: &str,
        workspace_home: impl AsRef<Path>,
        max_working_copies: usize,
    ) -> Result<Self, ConfigError> {
        let layout = RepoLayout::new(repo_url)?;
        Ok(Self::assemble(
            backend,
            layout,
            workspace_home,
            max_working_copies,
        ))
    }

    fn assemble(
        backend: B,
        layout: RepoLayout,
        workspace_home: impl AsRef<Path>,
        max_working_copies: usize,
    ) -> Self {
        let workspace =
            RepositoryWorkspace::new(workspace_home, layout.root(), max_working_copies);
        info!(url = %layout.root(), "svn adapter ready");
        Self {
            backend,
            layout,
            workspace,
        }
    }

    /// Repository URL the adapter was built for, ending in `/`.
    pub fn repo_url(&self) -> &str {
        self.layout.root()
    }

    pub fn vcs_type(&self) -> &'static str {
        SVN_VCS_TYPE
    }

    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    pub fn workspace(&self) -> &RepositoryWorkspace {
        &self.workspace
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Credentials used for every subsequent repository access.
    pub fn set_credentials(&mut self, username: &str, password: Option<&str>) {
        self.backend.set_credentials(Some(Credentials {
            username: username.to_string(),
            password: password.map(str::to_string),
        }));
    }

    /// Route `http://`/`https://` access through a proxy.
    pub fn set_proxy(&mut self, host: &str, port: u16, username: Option<&str>, password: Option<&str>) {
        self.backend.set_proxy(Some(ProxySettings {
            host: host.to_string(),
            port,
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        }));
    }

    /// Create `trunk/`, `branches/` and `tags/` in one commit.
    pub async fn create_layout(&self, message: &str) -> Result<Commit, VcsError> {
        let urls: Vec<String> = [TRUNK_PATH, BRANCHES_PATH, TAGS_PATH]
            .iter()
            .map(|p| format!("{}{}", self.layout.root(), p))
            .collect();
        let info = self
            .backend
            .mkdir(&urls, message)
            .await
            .map_err(VcsError::Backend)?;
        Ok(Commit::new(info.revision.to_string(), message, info.author))
    }

    /// Check `branch` out into a caller-owned directory, switching it when it
    /// already holds a working copy.
    pub async fn checkout(
        &self,
        branch: Option<&str>,
        target: &Path,
        revision: Option<&str>,
    ) -> Result<(), VcsError> {
        let revision = parse_revision(revision)?;
        let url = self.layout.branch_url(branch);
        match self.prepare(&url, target, revision).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.translate_branch_error(e, branch).await),
        }
    }

    /// Borrow a working copy and bring it to `branch` at `revision`.
    ///
    /// The copy comes back flagged corrupted. Callers clear the flag only
    /// once the working copy is clean again, so an operation that fails,
    /// panics or is cancelled half way leaves it to be emptied before reuse.
    pub(crate) async fn checked_out(
        &self,
        branch: Option<&str>,
        revision: Revision,
    ) -> Result<LockedWorkingCopy, VcsError> {
        let url = self.layout.branch_url(branch);
        let mut wc = self.workspace.lock().await?;
        wc.set_corrupted(true);
        if let Err(e) = self.prepare(&url, wc.folder(), revision).await {
            return Err(self.translate_branch_error(e, branch).await);
        }
        Ok(wc)
    }

    async fn prepare(&self, url: &str, path: &Path, revision: Revision) -> Result<(), SvnError> {
        if self.backend.is_working_copy(path).await? {
            debug!(%url, path = %path.display(), "switching working copy");
            self.backend.switch(url, path, revision).await
        } else {
            debug!(%url, path = %path.display(), "checking out working copy");
            self.backend.checkout(url, path, revision).await
        }
    }
}
