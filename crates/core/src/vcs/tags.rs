//! Tags: cheap copies of a branch under `tags/`.

use tracing::{debug, info, instrument};

use super::{parse_revision, SvnVcs};
use crate::errors::{SvnError, VcsError};
use crate::layout::RepoLayout;
use crate::models::{Commit, Tag};
use crate::svn::{NodeKind, Revision, SvnBackend, SvnLogEntry};

impl<B: SvnBackend> SvnVcs<B> {
    /// Tag `branch` at `revision` (default HEAD) as `name`.
    #[instrument(skip(self, branch, message), fields(branch = %RepoLayout::display_branch(branch)))]
    pub async fn create_tag(
        &self,
        branch: Option<&str>,
        name: &str,
        message: &str,
        revision: Option<&str>,
    ) -> Result<Tag, VcsError> {
        let revision = parse_revision(revision)?;
        let tag_url = self.layout.tag_url(name);
        let exists = self
            .backend
            .node_kind(&tag_url, Revision::Head)
            .await
            .map_err(VcsError::Backend)?;
        if exists.exists() {
            return Err(VcsError::TagExists(name.to_string()));
        }

        let branch_url = self.layout.branch_url(branch);
        let info = match self
            .backend
            .copy(&branch_url, revision, &tag_url, message)
            .await
        {
            Ok(info) => info,
            Err(e) if e.is_item_exists() => return Err(VcsError::TagExists(name.to_string())),
            Err(e) => return Err(self.translate_branch_error(e, branch).await),
        };
        info!(revision = info.revision, "tag created");

        let related_commit = match self.last_change(&branch_url, revision).await {
            Ok(Some(entry)) => Commit::from(entry),
            Ok(None) => Commit::EMPTY,
            Err(e) => return Err(self.translate_branch_error(e, branch).await),
        };
        Ok(Tag {
            name: name.to_string(),
            message: message.to_string(),
            author: info.author,
            related_commit,
        })
    }

    /// All tags, sorted by name.
    pub async fn get_tags(&self) -> Result<Vec<Tag>, VcsError> {
        let entries = match self.backend.list(&self.layout.tags_url()).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(VcsError::Backend(e)),
        };
        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == NodeKind::Dir)
            .map(|e| e.name)
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        names.sort();

        let repo_root = self
            .backend
            .repository_root(self.layout.root())
            .await
            .map_err(VcsError::Backend)?;
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            tags.push(self.read_tag(&name, &repo_root).await?);
        }
        debug!(count = tags.len(), "read tags");
        Ok(tags)
    }

    /// Tags whose related commit is `revision`.
    pub async fn get_tags_on_revision(&self, revision: &str) -> Result<Vec<Tag>, VcsError> {
        let Revision::Number(wanted) = parse_revision(Some(revision))? else {
            return Err(VcsError::unexpected(
                "tags can only be looked up by revision number",
                format!("got '{}'", revision),
            ));
        };
        let wanted = wanted.to_string();
        let tags = self.get_tags().await?;
        Ok(tags
            .into_iter()
            .filter(|t| t.related_commit.revision_id == wanted)
            .collect())
    }

    /// Rebuild a [`Tag`] from the commit that created it.
    async fn read_tag(&self, name: &str, repo_root: &str) -> Result<Tag, VcsError> {
        let tag_url = self.layout.tag_url(name);
        let history = self
            .backend
            .log(&tag_url, Revision::Head, Revision::Head, Revision::Number(0), None, true)
            .await
            .map_err(VcsError::Backend)?;
        let Some(creation) = history.into_iter().last() else {
            return Err(VcsError::unexpected(
                format!("tag '{}' has no history", name),
                "svn log returned no entries",
            ));
        };

        let tag_path = tag_url.trim_end_matches('/');
        let copied_from = creation
            .changed_paths
            .iter()
            .filter(|p| p.copy_from_path.is_some())
            .find(|p| format!("{}{}", repo_root, p.path) == tag_path)
            .or_else(|| creation.changed_paths.iter().find(|p| p.copy_from_path.is_some()))
            .and_then(|p| Some((p.copy_from_path.clone()?, p.copy_from_rev?)));

        let related_commit = match copied_from {
            Some((from_path, from_rev)) => {
                let source_url = format!("{}{}", repo_root, from_path);
                self.last_change(&source_url, Revision::Number(from_rev))
                    .await
                    .map_err(VcsError::Backend)?
                    .map(Commit::from)
                    .unwrap_or(Commit::EMPTY)
            }
            None => Commit::new(
                creation.revision.to_string(),
                creation.message.clone(),
                creation.author.clone(),
            ),
        };

        Ok(Tag {
            name: name.to_string(),
            message: creation.message,
            author: creation.author,
            related_commit,
        })
    }

    /// Last commit that changed `url` at or before `revision`.
    async fn last_change(
        &self,
        url: &str,
        revision: Revision,
    ) -> Result<Option<SvnLogEntry>, SvnError> {
        let entries = self
            .backend
            .log(url, revision, revision, Revision::Number(0), Some(1), false)
            .await?;
        Ok(entries.into_iter().next())
    }
}
