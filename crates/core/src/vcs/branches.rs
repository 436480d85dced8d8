//! Branch creation, deletion, listing and comparison.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use super::SvnVcs;
use crate::errors::{SvnError, VcsError};
use crate::layout::{RepoLayout, TRUNK_PATH};
use crate::models::{ChangeType, DiffEntry};
use crate::svn::{relative_to, split_unified_diff, NodeKind, Revision, SvnBackend};

impl<B: SvnBackend> SvnVcs<B> {
    /// Create branch `dst` as a copy of `src` at HEAD.
    #[instrument(skip(self, src, message), fields(src = %RepoLayout::display_branch(src)))]
    pub async fn create_branch(
        &self,
        src: Option<&str>,
        dst: &str,
        message: &str,
    ) -> Result<(), VcsError> {
        let dst_url = self.layout.branch_url(Some(dst));
        // a copy onto an existing directory would nest inside it
        if self.branch_exists(Some(dst)).await? {
            return Err(VcsError::BranchExists(dst.to_string()));
        }

        let src_url = self.layout.branch_url(src);
        match self
            .backend
            .copy(&src_url, Revision::Head, &dst_url, message)
            .await
        {
            Ok(info) => {
                info!(revision = info.revision, "branch created");
                Ok(())
            }
            Err(e) if e.is_item_exists() => Err(VcsError::BranchExists(dst.to_string())),
            Err(e) => Err(self.translate_branch_error(e, src).await),
        }
    }

    /// Delete branch `name`.
    #[instrument(skip(self, message))]
    pub async fn delete_branch(&self, name: &str, message: &str) -> Result<(), VcsError> {
        let url = self.layout.branch_url(Some(name));
        match self.backend.delete(&url, message).await {
            Ok(info) => {
                info!(revision = info.revision, "branch deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(self.branch_not_found(Some(name))),
            Err(e) => Err(VcsError::Backend(e)),
        }
    }

    /// Names of all branches, `trunk` included when it exists.
    ///
    /// With a `path_filter` only branches below `branches/` whose name starts
    /// with the filter are returned; the filter may contain `/` to look into
    /// a branch folder such as `release/`.
    pub async fn get_branches(
        &self,
        path_filter: Option<&str>,
    ) -> Result<BTreeSet<String>, VcsError> {
        let filter = path_filter.unwrap_or_default().trim_start_matches('/');
        let (folder, prefix) = match filter.rfind('/') {
            Some(i) => filter.split_at(i + 1),
            None => ("", filter),
        };

        let url = format!("{}{}", self.layout.branches_url(), folder);
        let entries = match self.backend.list(&url).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                debug!(%url, "branch folder does not exist");
                Vec::new()
            }
            Err(e) => return Err(VcsError::Backend(e)),
        };

        let mut branches: BTreeSet<String> = entries
            .into_iter()
            .filter(|e| e.kind == NodeKind::Dir && e.name.starts_with(prefix))
            .map(|e| format!("{}{}", folder, e.name))
            .collect();

        if path_filter.is_none() && self.branch_exists(None).await? {
            branches.insert(TRUNK_PATH.trim_end_matches('/').to_string());
        }
        Ok(branches)
    }

    /// Files that differ between the heads of `src` and `dst`, as changes
    /// that would turn `dst` into `src`, each with its unified diff.
    pub async fn get_branches_diff(
        &self,
        src: Option<&str>,
        dst: Option<&str>,
    ) -> Result<Vec<DiffEntry>, VcsError> {
        let src_url = self.layout.branch_url(src);
        let dst_url = self.layout.branch_url(dst);

        let summary = match self.backend.diff_summarize(&dst_url, &src_url).await {
            Ok(summary) => summary,
            Err(e) => return Err(self.translate_diff_error(e, src, dst).await),
        };
        let text = match self.backend.diff(&dst_url, &src_url).await {
            Ok(text) => text,
            Err(e) => return Err(self.translate_diff_error(e, src, dst).await),
        };
        let sections = split_unified_diff(&text);

        let mut entries = Vec::new();
        for item in summary {
            let path = relative_to(&item.path, &dst_url)
                .or_else(|| relative_to(&item.path, &src_url))
                .unwrap_or_else(|| item.path.clone());
            if path.is_empty() {
                continue;
            }
            let unified_diff = sections.get(&path).cloned().or_else(|| {
                sections
                    .iter()
                    .find(|(key, _)| key.ends_with(&format!("/{}", path)))
                    .map(|(_, text)| text.clone())
            });
            entries.push(DiffEntry {
                file_path: path,
                change_type: ChangeType::from_svn_item(&item.item),
                unified_diff,
            });
        }
        debug!(count = entries.len(), "branches diff computed");
        Ok(entries)
    }

    async fn translate_diff_error(
        &self,
        err: SvnError,
        src: Option<&str>,
        dst: Option<&str>,
    ) -> VcsError {
        if !err.is_not_found() {
            return VcsError::Backend(err);
        }
        for branch in [src, dst] {
            if let Ok(false) = self.branch_exists(branch).await {
                return self.branch_not_found(branch);
            }
        }
        VcsError::Backend(err)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::svn::fake::FakeBackend;
    use crate::svn::{SvnDiffEntry, SvnListEntry};

    fn dir(name: &str) -> SvnListEntry {
        SvnListEntry {
            name: name.into(),
            kind: NodeKind::Dir,
        }
    }

    fn listed_branches() -> FakeBackend {
        FakeBackend::new().with(|s| {
            s.listings.insert(
                format!("{}/branches", REPO),
                vec![
                    dir("feature"),
                    dir("release"),
                    SvnListEntry {
                        name: "README".into(),
                        kind: NodeKind::File,
                    },
                ],
            );
            s.listings.insert(
                format!("{}/branches/release", REPO),
                vec![dir("1.0"), dir("2.0")],
            );
        })
    }

    #[tokio::test]
    async fn test_get_branches_includes_trunk() {
        let (vcs, _home) = adapter(listed_branches());
        let branches = vcs.get_branches(None).await.unwrap();
        let expected: BTreeSet<String> = ["feature", "release", "trunk"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(branches, expected);

        // stable across calls
        assert_eq!(vcs.get_branches(None).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_get_branches_with_filter() {
        let (vcs, _home) = adapter(listed_branches());

        let feat = vcs.get_branches(Some("feat")).await.unwrap();
        assert_eq!(feat.into_iter().collect::<Vec<_>>(), ["feature"]);

        let releases = vcs.get_branches(Some("release/")).await.unwrap();
        assert_eq!(
            releases.into_iter().collect::<Vec<_>>(),
            ["release/1.0", "release/2.0"]
        );
    }

    #[tokio::test]
    async fn test_get_branches_without_branch_folder() {
        let (vcs, _home) = adapter(FakeBackend::new());
        let branches = vcs.get_branches(None).await.unwrap();
        assert_eq!(branches.into_iter().collect::<Vec<_>>(), ["trunk"]);
    }

    #[tokio::test]
    async fn test_create_branch_copies_from_head() {
        let (vcs, _home) = adapter(FakeBackend::new());
        vcs.create_branch(None, "feature", "branch").await.unwrap();
        assert!(vcs
            .backend()
            .called("copy file:///repo/trunk@HEAD file:///repo/branches/feature"));
    }

    #[tokio::test]
    async fn test_create_existing_branch_is_refused_without_copy() {
        let backend = FakeBackend::new().with(|s| {
            s.nodes
                .insert(format!("{}/branches/feature", REPO), NodeKind::Dir);
        });
        let (vcs, _home) = adapter(backend);
        let err = vcs
            .create_branch(None, "feature", "branch")
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::BranchExists(ref name) if name == "feature"));
        assert!(!vcs.backend().called("copy"));
    }

    #[tokio::test]
    async fn test_create_branch_item_exists_race() {
        let backend = FakeBackend::new().with(|s| s.fail_copy = Some(160020));
        let (vcs, _home) = adapter(backend);
        let err = vcs
            .create_branch(None, "feature", "branch")
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::BranchExists(_)));
    }

    #[tokio::test]
    async fn test_create_branch_from_missing_source() {
        let backend = FakeBackend::new().with(|s| s.fail_copy = Some(160013));
        let (vcs, _home) = adapter(backend);
        let err = vcs
            .create_branch(Some("ghost"), "feature", "branch")
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::BranchNotFound { ref branch, .. } if branch == "ghost"));
    }

    #[tokio::test]
    async fn test_delete_branch() {
        let backend = FakeBackend::new().with(|s| {
            s.nodes
                .insert(format!("{}/branches/old", REPO), NodeKind::Dir);
        });
        let (vcs, _home) = adapter(backend);
        vcs.delete_branch("old", "cleanup").await.unwrap();
        assert!(vcs.backend().called("delete file:///repo/branches/old"));
    }

    #[tokio::test]
    async fn test_delete_missing_branch() {
        let backend = FakeBackend::new().with(|s| s.fail_delete = Some(160013));
        let (vcs, _home) = adapter(backend);
        let err = vcs.delete_branch("ghost", "cleanup").await.unwrap_err();
        assert!(matches!(err, VcsError::BranchNotFound { .. }));
    }

    #[tokio::test]
    async fn test_branches_diff() {
        let backend = FakeBackend::new().with(|s| {
            s.summaries = vec![
                SvnDiffEntry {
                    item: "modified".into(),
                    kind: "dir".into(),
                    props_changed: true,
                    path: "file:///repo/trunk".into(),
                },
                SvnDiffEntry {
                    item: "modified".into(),
                    kind: "file".into(),
                    props_changed: false,
                    path: "file:///repo/trunk/a.txt".into(),
                },
                SvnDiffEntry {
                    item: "added".into(),
                    kind: "file".into(),
                    props_changed: false,
                    path: "file:///repo/trunk/dir/my%20file.txt".into(),
                },
            ];
            s.unified_diff = "Index: a.txt\n===\n-1\n+2\nIndex: dir/my file.txt\n===\n+new\n".into();
        });
        let (vcs, _home) = adapter(backend);

        let entries = vcs.get_branches_diff(Some("feature"), None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_path, "a.txt");
        assert_eq!(entries[0].change_type, ChangeType::Modify);
        assert_eq!(
            entries[0].unified_diff.as_deref(),
            Some("Index: a.txt\n===\n-1\n+2\n")
        );
        assert_eq!(entries[1].file_path, "dir/my file.txt");
        assert_eq!(entries[1].change_type, ChangeType::Add);
        assert!(vcs
            .backend()
            .called("diff-summarize file:///repo/trunk file:///repo/branches/feature"));
    }
}
