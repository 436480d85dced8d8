//! Mapping of backend faults onto [`VcsError`].

use tracing::warn;

use super::SvnVcs;
use crate::errors::{SvnError, VcsError};
use crate::layout::RepoLayout;
use crate::svn::{Revision, SvnBackend};

/// Parse a revision id supplied by a caller. `None` means HEAD.
pub(crate) fn parse_revision(id: Option<&str>) -> Result<Revision, VcsError> {
    Revision::parse(id).map_err(|e| {
        VcsError::unexpected(
            format!("invalid revision id '{}'", id.unwrap_or_default()),
            e,
        )
    })
}

impl<B: SvnBackend> SvnVcs<B> {
    pub(crate) fn branch_not_found(&self, branch: Option<&str>) -> VcsError {
        VcsError::BranchNotFound {
            repo: self.layout.root().to_string(),
            branch: RepoLayout::display_branch(branch),
        }
    }

    /// Whether `branch` exists at HEAD.
    pub(crate) async fn branch_exists(&self, branch: Option<&str>) -> Result<bool, VcsError> {
        self.backend
            .node_kind(&self.layout.branch_url(branch), Revision::Head)
            .await
            .map(|kind| kind.exists())
            .map_err(VcsError::Backend)
    }

    /// Translate a fault of an operation addressing `branch` as a whole.
    pub(crate) async fn translate_branch_error(
        &self,
        err: SvnError,
        branch: Option<&str>,
    ) -> VcsError {
        if !err.is_not_found() {
            return VcsError::Backend(err);
        }
        match self.branch_exists(branch).await {
            Ok(false) => self.branch_not_found(branch),
            Ok(true) => VcsError::Backend(err),
            Err(probe) => {
                warn!(error = %probe, "branch existence probe failed");
                VcsError::Backend(err)
            }
        }
    }

    /// Translate a fault of an operation addressing one file of `branch`.
    ///
    /// "Not found" is ambiguous between a missing branch and a missing file;
    /// a probe of the branch URL decides which.
    pub(crate) async fn translate_file_error(
        &self,
        err: SvnError,
        branch: Option<&str>,
        path: &str,
        revision: Revision,
    ) -> VcsError {
        if !err.is_not_found() {
            return VcsError::Backend(err);
        }
        match self.branch_exists(branch).await {
            Ok(false) => self.branch_not_found(branch),
            Ok(true) => VcsError::FileNotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            },
            Err(probe) => {
                warn!(error = %probe, "branch existence probe failed");
                VcsError::Backend(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::svn::fake::{svn_error, FakeBackend};

    #[test]
    fn test_parse_revision() {
        assert_eq!(parse_revision(None).unwrap(), Revision::Head);
        assert_eq!(parse_revision(Some("12")).unwrap(), Revision::Number(12));
        let err = parse_revision(Some("abc")).unwrap_err();
        assert!(matches!(err, VcsError::Unexpected { .. }));
        assert!(err.to_string().contains("abc"));
    }

    #[tokio::test]
    async fn test_not_found_in_missing_branch() {
        let (vcs, _home) = adapter(FakeBackend::new());
        let err = vcs
            .translate_file_error(svn_error(160013, "nope"), Some("gone"), "a.txt", Revision::Head)
            .await;
        assert!(matches!(
            err,
            VcsError::BranchNotFound { ref repo, ref branch }
                if repo == "file:///repo/" && branch == "gone"
        ));
    }

    #[tokio::test]
    async fn test_not_found_in_existing_branch() {
        let (vcs, _home) = adapter(FakeBackend::new());
        let err = vcs
            .translate_file_error(svn_error(170000, "nope"), None, "a.txt", Revision::Number(4))
            .await;
        assert!(matches!(
            err,
            VcsError::FileNotFound { ref path, ref revision } if path == "a.txt" && revision == "4"
        ));
    }

    #[tokio::test]
    async fn test_other_faults_keep_backend_source() {
        use std::error::Error;

        let (vcs, _home) = adapter(FakeBackend::new());
        let err = vcs
            .translate_file_error(svn_error(175002, "connection refused"), None, "a.txt", Revision::Head)
            .await;
        assert!(err.is_backend());
        let source = err.source().expect("backend error keeps its cause");
        assert!(source.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_branch_error_for_existing_branch_stays_backend() {
        let (vcs, _home) = adapter(FakeBackend::new());
        let err = vcs
            .translate_branch_error(svn_error(160013, "nope"), None)
            .await;
        assert!(err.is_backend());
    }
}
