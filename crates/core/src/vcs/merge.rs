//! Merging one branch into another inside a scratch working copy.

use tracing::{debug, info, instrument, warn};

use super::SvnVcs;
use crate::errors::VcsError;
use crate::layout::RepoLayout;
use crate::models::MergeResult;
use crate::svn::{ConflictChoice, ConflictDescription, Revision, SvnBackend};

impl<B: SvnBackend> SvnVcs<B> {
    /// Merge every change made on `src` since it was created into `dst` and
    /// commit the result with `message`.
    ///
    /// Conflicts are not errors: when any file conflicts nothing is
    /// committed, the working copy is reverted and the conflicting paths are
    /// returned. The working copy is only trusted again after a commit or a
    /// successful revert; otherwise it is re-provisioned before reuse, and a
    /// failed revert does not fail the merge.
    #[instrument(skip(self, src, dst, message), fields(src = %RepoLayout::display_branch(src), dst = %RepoLayout::display_branch(dst)))]
    pub async fn merge(
        &self,
        src: Option<&str>,
        dst: Option<&str>,
        message: &str,
    ) -> Result<MergeResult, VcsError> {
        let mut wc = self.checked_out(dst, Revision::Head).await?;

        let root = self.branch_first_commit(src).await?.revision;

        let src_url = self.layout.branch_url(src);
        let mut conflicts: Vec<String> = Vec::new();
        let mut on_conflict = |conflict: &ConflictDescription| {
            if !conflicts.contains(&conflict.path) {
                conflicts.push(conflict.path.clone());
            }
            ConflictChoice::Postpone
        };
        let merged = self
            .backend
            .merge(
                &src_url,
                Revision::Number(root),
                Revision::Head,
                wc.folder(),
                &mut on_conflict,
            )
            .await;
        if let Err(e) = merged {
            return Err(self.translate_branch_error(e, src).await);
        }

        if conflicts.is_empty() {
            match self.backend.commit(wc.folder(), message).await {
                Ok(Some(info)) => info!(revision = info.revision, "merge committed"),
                Ok(None) => debug!("merge produced no changes"),
                Err(e) => return Err(VcsError::Backend(e)),
            }
            wc.set_corrupted(false);
        } else {
            info!(count = conflicts.len(), "merge conflicted, reverting");
            match self.backend.revert(wc.folder()).await {
                Ok(()) => wc.set_corrupted(false),
                Err(e) => {
                    warn!(error = %e, folder = %wc.folder().display(), "revert after conflicted merge failed")
                }
            }
        }

        Ok(MergeResult::from_conflicts(conflicts))
    }
}
