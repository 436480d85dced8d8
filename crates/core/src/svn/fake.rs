//! Scripted in-memory backend for adapter unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::backend::{
    CommitInfo, ConflictChoice, ConflictDescription, ConflictHandler, Credentials, NodeKind,
    ProxySettings, Revision, SvnBackend,
};
use super::parser::{SvnDiffEntry, SvnListEntry, SvnLogEntry};
use crate::errors::SvnError;

/// Build a backend error carrying `code` the way `svn` prints it.
pub(crate) fn svn_error(code: u32, text: &str) -> SvnError {
    SvnError::CommandFailed {
        exit_code: 1,
        stderr: format!("svn: E{:06}: {}\n", code, text),
    }
}

#[derive(Default)]
pub(crate) struct FakeState {
    /// URL (no trailing `/`) to node kind. Missing URLs are [`NodeKind::None`].
    pub nodes: BTreeMap<String, NodeKind>,
    /// URL to file content served by `cat`.
    pub files: BTreeMap<String, Vec<u8>>,
    pub listings: BTreeMap<String, Vec<SvnListEntry>>,
    /// Log entries per URL, oldest first.
    pub logs: BTreeMap<String, Vec<SvnLogEntry>>,
    pub summaries: Vec<SvnDiffEntry>,
    pub unified_diff: String,
    pub conflicts: Vec<ConflictDescription>,
    pub choices_seen: Vec<ConflictChoice>,
    pub fail_checkout: Option<u32>,
    pub fail_merge: Option<u32>,
    pub fail_commit: Option<u32>,
    pub fail_revert: bool,
    pub fail_copy: Option<u32>,
    pub fail_delete: Option<u32>,
    /// `merge` leaves a partial result in the working copy and never returns.
    pub hang_merge: bool,
    /// `commit` never returns.
    pub hang_commit: bool,
    /// Results handed out by successive commits; `None` once exhausted.
    pub commits: VecDeque<Option<CommitInfo>>,
    pub calls: Vec<String>,
    pub credentials: Option<Credentials>,
    pub proxy: Option<ProxySettings>,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: FnOnce(&mut FakeState)>(self, f: F) -> Self {
        f(&mut *self.state.lock().unwrap());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn next_commit(&self) -> Option<CommitInfo> {
        self.state.lock().unwrap().commits.pop_front().flatten()
    }

    fn committed(&self) -> CommitInfo {
        self.next_commit().unwrap_or(CommitInfo {
            revision: 1,
            author: "fake".into(),
        })
    }
}

fn key(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl SvnBackend for FakeBackend {
    async fn is_working_copy(&self, path: &Path) -> Result<bool, SvnError> {
        Ok(path.join(".svn").is_dir())
    }

    async fn checkout(&self, url: &str, path: &Path, revision: Revision) -> Result<(), SvnError> {
        self.record(format!("checkout {}@{}", key(url), revision));
        if let Some(code) = self.state.lock().unwrap().fail_checkout {
            return Err(svn_error(code, "checkout failed"));
        }
        std::fs::create_dir_all(path.join(".svn"))?;
        Ok(())
    }

    async fn switch(&self, url: &str, _path: &Path, revision: Revision) -> Result<(), SvnError> {
        self.record(format!("switch {}@{}", key(url), revision));
        if let Some(code) = self.state.lock().unwrap().fail_checkout {
            return Err(svn_error(code, "switch failed"));
        }
        Ok(())
    }

    async fn copy(
        &self,
        src_url: &str,
        revision: Revision,
        dst_url: &str,
        _message: &str,
    ) -> Result<CommitInfo, SvnError> {
        self.record(format!("copy {}@{} {}", key(src_url), revision, key(dst_url)));
        if let Some(code) = self.state.lock().unwrap().fail_copy {
            return Err(svn_error(code, "copy failed"));
        }
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(key(dst_url), NodeKind::Dir);
        Ok(self.committed())
    }

    async fn mkdir(&self, urls: &[String], _message: &str) -> Result<CommitInfo, SvnError> {
        self.record(format!("mkdir {}", urls.join(" ")));
        {
            let mut state = self.state.lock().unwrap();
            for url in urls {
                state.nodes.insert(key(url), NodeKind::Dir);
            }
        }
        Ok(self.committed())
    }

    async fn delete(&self, url: &str, _message: &str) -> Result<CommitInfo, SvnError> {
        self.record(format!("delete {}", key(url)));
        if let Some(code) = self.state.lock().unwrap().fail_delete {
            return Err(svn_error(code, "delete failed"));
        }
        self.state.lock().unwrap().nodes.remove(&key(url));
        Ok(self.committed())
    }

    async fn merge(
        &self,
        src_url: &str,
        start: Revision,
        end: Revision,
        wc: &Path,
        on_conflict: &mut ConflictHandler<'_>,
    ) -> Result<(), SvnError> {
        self.record(format!("merge {} {}:{}", key(src_url), start, end));
        let (conflicts, fail, hang) = {
            let state = self.state.lock().unwrap();
            (state.conflicts.clone(), state.fail_merge, state.hang_merge)
        };
        if hang {
            std::fs::write(wc.join("half-merged.txt"), "<<<<<<< .working\n")?;
            std::future::pending::<()>().await;
        }
        if let Some(code) = fail {
            return Err(svn_error(code, "merge failed"));
        }
        for conflict in &conflicts {
            let choice = on_conflict(conflict);
            self.state.lock().unwrap().choices_seen.push(choice);
        }
        Ok(())
    }

    async fn commit(&self, _wc: &Path, message: &str) -> Result<Option<CommitInfo>, SvnError> {
        self.record(format!("commit {}", message));
        let hang = self.state.lock().unwrap().hang_commit;
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(code) = self.state.lock().unwrap().fail_commit {
            return Err(svn_error(code, "commit failed"));
        }
        Ok(self.next_commit())
    }

    async fn revert(&self, _wc: &Path) -> Result<(), SvnError> {
        self.record("revert".into());
        if self.state.lock().unwrap().fail_revert {
            return Err(svn_error(155004, "working copy locked"));
        }
        Ok(())
    }

    async fn add(&self, _wc: &Path, path: &Path) -> Result<(), SvnError> {
        self.record(format!("add {}", path.display()));
        Ok(())
    }

    async fn cat(&self, url: &str, revision: Revision) -> Result<Vec<u8>, SvnError> {
        self.record(format!("cat {}@{}", key(url), revision));
        self.state
            .lock()
            .unwrap()
            .files
            .get(&key(url))
            .cloned()
            .ok_or_else(|| svn_error(160013, "path not found"))
    }

    async fn node_kind(&self, url: &str, _revision: Revision) -> Result<NodeKind, SvnError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nodes
            .get(&key(url))
            .copied()
            .unwrap_or(NodeKind::None))
    }

    async fn list(&self, url: &str) -> Result<Vec<SvnListEntry>, SvnError> {
        self.record(format!("list {}", key(url)));
        self.state
            .lock()
            .unwrap()
            .listings
            .get(&key(url))
            .cloned()
            .ok_or_else(|| svn_error(200009, "target does not exist"))
    }

    async fn log(
        &self,
        url: &str,
        _peg: Revision,
        start: Revision,
        end: Revision,
        limit: Option<usize>,
        stop_on_copy: bool,
    ) -> Result<Vec<SvnLogEntry>, SvnError> {
        self.record(format!(
            "log {} {}:{}{}",
            key(url),
            start,
            end,
            if stop_on_copy { " stop-on-copy" } else { "" }
        ));
        let entries = self
            .state
            .lock()
            .unwrap()
            .logs
            .get(&key(url))
            .cloned()
            .ok_or_else(|| svn_error(160013, "path not found"))?;
        let max = entries.last().map(|e| e.revision).unwrap_or(0);
        let entries = if stop_on_copy {
            // history starts at the newest entry that copied this path into place
            let path = key(url);
            let copied_at = entries
                .iter()
                .rev()
                .find(|e| {
                    e.changed_paths
                        .iter()
                        .any(|p| p.copy_from_path.is_some() && path.ends_with(&p.path))
                })
                .map(|e| e.revision);
            match copied_at {
                Some(rev) => entries.into_iter().filter(|e| e.revision >= rev).collect(),
                None => entries,
            }
        } else {
            entries
        };
        let resolve = |r: Revision| match r {
            Revision::Head => max,
            Revision::Number(n) => n,
        };
        let (lo, hi) = (resolve(start), resolve(end));
        let mut selected: Vec<SvnLogEntry> = entries
            .into_iter()
            .filter(|e| e.revision >= lo.min(hi) && e.revision <= lo.max(hi))
            .collect();
        if lo > hi {
            selected.reverse();
        }
        if let Some(limit) = limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    async fn diff_summarize(
        &self,
        old_url: &str,
        new_url: &str,
    ) -> Result<Vec<SvnDiffEntry>, SvnError> {
        self.record(format!("diff-summarize {} {}", key(old_url), key(new_url)));
        Ok(self.state.lock().unwrap().summaries.clone())
    }

    async fn diff(&self, old_url: &str, new_url: &str) -> Result<String, SvnError> {
        self.record(format!("diff {} {}", key(old_url), key(new_url)));
        Ok(self.state.lock().unwrap().unified_diff.clone())
    }

    async fn repository_root(&self, url: &str) -> Result<String, SvnError> {
        Ok(key(url))
    }

    fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.state.get_mut().unwrap().credentials = credentials;
    }

    fn set_proxy(&mut self, proxy: Option<ProxySettings>) {
        self.state.get_mut().unwrap().proxy = proxy;
    }
}

/// Log entry with no changed paths.
pub(crate) fn log_entry(revision: i64, author: &str, message: &str) -> SvnLogEntry {
    SvnLogEntry {
        revision,
        author: author.into(),
        date: "2024-01-01T00:00:00.000000Z".into(),
        message: message.into(),
        changed_paths: Vec::new(),
    }
}
