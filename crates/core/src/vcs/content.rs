//! Reading and writing individual files of a branch.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument};

use super::{parse_revision, SvnVcs};
use crate::errors::VcsError;
use crate::models::{ChangeListNode, Commit, CHANGE_LIST_MESSAGE_SEPARATOR};
use crate::svn::{NodeKind, Revision, SvnBackend};

impl<B: SvnBackend> SvnVcs<B> {
    /// Content of `path` on `branch` at `revision` (default HEAD), decoded as UTF-8.
    pub async fn get_file_content(
        &self,
        branch: Option<&str>,
        path: &str,
        revision: Option<&str>,
    ) -> Result<String, VcsError> {
        let revision = parse_revision(revision)?;
        let url = self.layout.file_url(branch, path);
        let bytes = match self.backend.cat(&url, revision).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.translate_file_error(e, branch, path, revision).await),
        };
        String::from_utf8(bytes)
            .map_err(|e| VcsError::unexpected(format!("'{}' is not valid UTF-8", path), e))
    }

    /// Write `content` to `path` on `branch` and commit it.
    ///
    /// Returns [`Commit::EMPTY`] when the file already had this content.
    pub async fn set_file_content(
        &self,
        branch: Option<&str>,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<Commit, VcsError> {
        self.commit_files(branch, &[(path, content)], message).await
    }

    /// Write several files to `branch` and commit them as one revision whose
    /// message joins the nodes' messages.
    pub async fn set_file_contents(
        &self,
        branch: Option<&str>,
        changes: &[ChangeListNode],
    ) -> Result<Commit, VcsError> {
        if changes.is_empty() {
            return Ok(Commit::EMPTY);
        }
        let message = changes
            .iter()
            .map(|c| c.log_message.as_str())
            .collect::<Vec<_>>()
            .join(CHANGE_LIST_MESSAGE_SEPARATOR);
        let files: Vec<(&str, &str)> = changes
            .iter()
            .map(|c| (c.file_path.as_str(), c.content.as_str()))
            .collect();
        self.commit_files(branch, &files, &message).await
    }

    /// Delete `path` from `branch` directly in the repository.
    pub async fn remove_file(
        &self,
        branch: Option<&str>,
        path: &str,
        message: &str,
    ) -> Result<Commit, VcsError> {
        let url = self.layout.file_url(branch, path);
        match self.backend.delete(&url, message).await {
            Ok(info) => Ok(Commit::new(info.revision.to_string(), message, info.author)),
            Err(e) => Err(self
                .translate_file_error(e, branch, path, Revision::Head)
                .await),
        }
    }

    /// Whether `path` is a file on `branch` at HEAD.
    pub async fn file_exists(&self, branch: Option<&str>, path: &str) -> Result<bool, VcsError> {
        let url = self.layout.file_url(branch, path);
        let kind = self
            .backend
            .node_kind(&url, Revision::Head)
            .await
            .map_err(VcsError::Backend)?;
        Ok(kind == NodeKind::File)
    }

    #[instrument(skip(self, branch, files, message), fields(files = files.len()))]
    async fn commit_files(
        &self,
        branch: Option<&str>,
        files: &[(&str, &str)],
        message: &str,
    ) -> Result<Commit, VcsError> {
        let mut wc = self.checked_out(branch, Revision::Head).await?;

        let mut added = Vec::new();
        for (path, content) in files {
            if let Some(new_file) = write_file(wc.folder(), path, content)? {
                added.push(new_file);
            }
        }

        for file in &added {
            self.backend
                .add(wc.folder(), file)
                .await
                .map_err(VcsError::Backend)?;
        }

        let commit = match self.backend.commit(wc.folder(), message).await {
            Ok(Some(info)) => {
                info!(revision = info.revision, "file changes committed");
                Commit::new(info.revision.to_string(), message, info.author)
            }
            Ok(None) => {
                debug!("nothing to commit");
                Commit::EMPTY
            }
            Err(e) => return Err(VcsError::Backend(e)),
        };
        wc.set_corrupted(false);
        Ok(commit)
    }
}

/// Resolve a branch-relative path inside the working copy, refusing paths
/// that would escape it.
fn local_path(root: &Path, path: &str) -> Result<PathBuf, VcsError> {
    let relative = path.replace('\\', "/");
    let relative = Path::new(relative.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.as_os_str().is_empty() || escapes {
        return Err(VcsError::unexpected(
            format!("invalid file path '{}'", path),
            "path must stay inside the branch",
        ));
    }
    Ok(root.join(relative))
}

/// Write one file, creating missing parents. Returns the local path when the
/// file is new and has to be scheduled for addition.
fn write_file(root: &Path, path: &str, content: &str) -> Result<Option<PathBuf>, VcsError> {
    let target = local_path(root, path)?;
    let is_new = !target.exists();
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            VcsError::unexpected(format!("failed to create directories for '{}'", path), e)
        })?;
    }
    std::fs::write(&target, content)
        .map_err(|e| VcsError::unexpected(format!("failed to write '{}'", path), e))?;
    Ok(is_new.then_some(target))
}
