//! Commit history of a branch.

use tracing::debug;

use super::{parse_revision, SvnVcs};
use crate::errors::VcsError;
use crate::models::{Commit, WalkDirection};
use crate::svn::{Revision, SvnBackend, SvnLogEntry};

impl From<SvnLogEntry> for Commit {
    fn from(entry: SvnLogEntry) -> Self {
        Commit::new(entry.revision.to_string(), entry.message, entry.author)
    }
}

impl<B: SvnBackend> SvnVcs<B> {
    /// Up to `limit` commits of `branch`, newest first. `0` means no limit.
    ///
    /// History ends at the commit that created the branch.
    pub async fn log(&self, branch: Option<&str>, limit: usize) -> Result<Vec<Commit>, VcsError> {
        let entries = self
            .branch_log(branch, Revision::Head, Revision::Number(0), limit, true)
            .await?;
        Ok(entries.into_iter().map(Commit::from).collect())
    }

    /// Log messages of the last `limit` commits of `branch`, newest first.
    pub async fn get_commit_messages(
        &self,
        branch: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, VcsError> {
        let entries = self
            .branch_log(branch, Revision::Head, Revision::Number(0), limit, true)
            .await?;
        Ok(entries.into_iter().map(|e| e.message).collect())
    }

    /// Commits of `branch` from `from` to `to`, both inclusive, oldest first.
    ///
    /// `from` defaults to the commit that created the branch, `to` to HEAD.
    pub async fn get_commits_range(
        &self,
        branch: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<Commit>, VcsError> {
        let start = match from {
            Some(id) => parse_revision(Some(id))?,
            None => Revision::Number(self.branch_first_commit(branch).await?.revision),
        };
        let end = parse_revision(to)?;
        let entries = self.branch_log(branch, start, end, 0, true).await?;
        Ok(entries.into_iter().map(Commit::from).collect())
    }

    /// Walk the history of `branch` from `start` in `direction`, returning at
    /// most `limit` commits (`0` means no limit).
    ///
    /// Walking [`WalkDirection::Asc`] runs from `start` (default: the commit
    /// that created the branch) up to HEAD; [`WalkDirection::Desc`] runs from
    /// `start` (default: HEAD) down to the first commit.
    pub async fn get_commits_walk(
        &self,
        branch: Option<&str>,
        start: Option<&str>,
        direction: WalkDirection,
        limit: usize,
    ) -> Result<Vec<Commit>, VcsError> {
        let (from, to) = match direction {
            WalkDirection::Asc => {
                let from = match start {
                    Some(id) => parse_revision(Some(id))?,
                    None => Revision::Number(self.branch_first_commit(branch).await?.revision),
                };
                (from, Revision::Head)
            }
            WalkDirection::Desc => {
                let from = parse_revision(start)?;
                let first = self.branch_first_commit(branch).await?.revision;
                (from, Revision::Number(first))
            }
        };
        let entries = self.branch_log(branch, from, to, limit, true).await?;
        Ok(entries.into_iter().map(Commit::from).collect())
    }

    /// The last commit that changed `branch`.
    pub async fn get_head_commit(&self, branch: Option<&str>) -> Result<Commit, VcsError> {
        let entries = self
            .branch_log(branch, Revision::Head, Revision::Number(0), 1, false)
            .await?;
        entries
            .into_iter()
            .next()
            .map(Commit::from)
            .ok_or_else(|| empty_history(branch))
    }

    /// The commit that created `branch` (oldest entry before the copy).
    pub(crate) async fn branch_first_commit(
        &self,
        branch: Option<&str>,
    ) -> Result<SvnLogEntry, VcsError> {
        let entries = self
            .branch_log(branch, Revision::Head, Revision::Number(0), 0, true)
            .await?;
        let first = entries.into_iter().last().ok_or_else(|| empty_history(branch))?;
        debug!(revision = first.revision, "found branch root");
        Ok(first)
    }

    async fn branch_log(
        &self,
        branch: Option<&str>,
        start: Revision,
        end: Revision,
        limit: usize,
        stop_on_copy: bool,
    ) -> Result<Vec<SvnLogEntry>, VcsError> {
        let url = self.layout.branch_url(branch);
        let limit = (limit > 0).then_some(limit);
        match self
            .backend
            .log(&url, Revision::Head, start, end, limit, stop_on_copy)
            .await
        {
            Ok(entries) => Ok(entries),
            Err(e) => Err(self.translate_branch_error(e, branch).await),
        }
    }
}

fn empty_history(branch: Option<&str>) -> VcsError {
    VcsError::unexpected(
        format!(
            "branch '{}' has no history",
            crate::layout::RepoLayout::display_branch(branch)
        ),
        "svn log returned no entries",
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::svn::fake::{log_entry, FakeBackend};
    use crate::svn::SvnChangedPath;

    fn trunk_history() -> FakeBackend {
        FakeBackend::new().with(|s| {
            s.logs.insert(
                format!("{}/trunk", REPO),
                vec![
                    log_entry(1, "admin", "layout"),
                    log_entry(2, "alice", "add a"),
                    log_entry(4, "bob", "edit a"),
                    log_entry(7, "alice", "add b"),
                ],
            );
        })
    }

    fn revisions(commits: &[Commit]) -> Vec<&str> {
        commits.iter().map(|c| c.revision_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_log_newest_first_with_limit() {
        let (vcs, _home) = adapter(trunk_history());
        let commits = vcs.log(None, 2).await.unwrap();
        assert_eq!(revisions(&commits), ["7", "4"]);
        assert_eq!(commits[0], Commit::new("7", "add b", "alice"));

        let all = vcs.log(None, 0).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_commit_messages() {
        let (vcs, _home) = adapter(trunk_history());
        let messages = vcs.get_commit_messages(None, 3).await.unwrap();
        assert_eq!(messages, ["add b", "edit a", "add a"]);
    }

    #[tokio::test]
    async fn test_range_defaults_to_whole_branch_ascending() {
        let (vcs, _home) = adapter(trunk_history());
        let commits = vcs.get_commits_range(None, None, None).await.unwrap();
        assert_eq!(revisions(&commits), ["1", "2", "4", "7"]);
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let (vcs, _home) = adapter(trunk_history());
        let commits = vcs
            .get_commits_range(None, Some("2"), Some("4"))
            .await
            .unwrap();
        assert_eq!(revisions(&commits), ["2", "4"]);
    }

    #[tokio::test]
    async fn test_walk_ascending_and_descending() {
        let (vcs, _home) = adapter(trunk_history());

        let asc = vcs
            .get_commits_walk(None, None, WalkDirection::Asc, 2)
            .await
            .unwrap();
        assert_eq!(revisions(&asc), ["1", "2"]);

        let desc = vcs
            .get_commits_walk(None, None, WalkDirection::Desc, 0)
            .await
            .unwrap();
        assert_eq!(revisions(&desc), ["7", "4", "2", "1"]);

        let desc_from = vcs
            .get_commits_walk(None, Some("4"), WalkDirection::Desc, 0)
            .await
            .unwrap();
        assert_eq!(revisions(&desc_from), ["4", "2", "1"]);
    }

    #[tokio::test]
    async fn test_branch_log_ends_at_branch_creation() {
        let mut created = log_entry(3, "carol", "branch feature");
        created.changed_paths.push(SvnChangedPath {
            action: "A".into(),
            path: "/branches/feature".into(),
            copy_from_path: Some("/trunk".into()),
            copy_from_rev: Some(2),
        });
        let backend = FakeBackend::new().with(|s| {
            s.logs.insert(
                format!("{}/branches/feature", REPO),
                vec![
                    log_entry(1, "admin", "layout"),
                    log_entry(2, "alice", "add a"),
                    created,
                    log_entry(5, "carol", "feature work"),
                ],
            );
        });
        let (vcs, _home) = adapter(backend);

        let commits = vcs.log(Some("feature"), 0).await.unwrap();
        assert_eq!(revisions(&commits), ["5", "3"]);
        let messages = vcs.get_commit_messages(Some("feature"), 10).await.unwrap();
        assert_eq!(messages, ["feature work", "branch feature"]);
        assert!(vcs
            .backend()
            .called("log file:///repo/branches/feature HEAD:0 stop-on-copy"));
    }

    #[tokio::test]
    async fn test_head_commit() {
        let (vcs, _home) = adapter(trunk_history());
        let head = vcs.get_head_commit(None).await.unwrap();
        assert_eq!(head.revision_id, "7");
    }

    #[tokio::test]
    async fn test_log_of_missing_branch() {
        let (vcs, _home) = adapter(trunk_history());
        let err = vcs.log(Some("ghost"), 10).await.unwrap_err();
        assert!(matches!(err, VcsError::BranchNotFound { .. }));
    }

    #[tokio::test]
    async fn test_bad_revision_id() {
        let (vcs, _home) = adapter(trunk_history());
        let err = vcs
            .get_commits_range(None, Some("seven"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::Unexpected { .. }));
    }
}
