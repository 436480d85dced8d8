//! Asynchronous SVN CLI client.

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::backend::{
    CommitInfo, ConflictChoice, ConflictDescription, ConflictHandler, Credentials, NodeKind,
    ProxySettings, Revision, SvnBackend,
};
use super::parser::{
    parse_committed_revision, parse_merge_conflicts, parse_svn_diff_summarize, parse_svn_info,
    parse_svn_list, parse_svn_log, SvnDiffEntry, SvnListEntry, SvnLogEntry,
};
use crate::errors::{SvnError, SVN_ERR_MERGE_CONFLICTS_PRODUCED, SVN_ERR_NOT_WORKING_COPY};

/// Asynchronous client for interacting with an SVN repository via the CLI.
#[derive(Debug, Clone)]
pub struct SvnClient {
    url: String,
    binary: String,
    credentials: Option<Credentials>,
    proxy: Option<ProxySettings>,
}

impl SvnClient {
    /// Create a new SVN client for the repository at `url`.
    pub fn new(url: impl Into<String>, credentials: Option<Credentials>) -> Self {
        let client = Self {
            url: url.into(),
            binary: "svn".into(),
            credentials,
            proxy: None,
        };
        info!(
            url = %client.url,
            username = client.credentials.as_ref().map(|c| c.username.as_str()).unwrap_or(""),
            "created SvnClient"
        );
        client
    }

    /// Use a different `svn` executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn global_args(&self) -> Vec<String> {
        let mut args = vec!["--non-interactive".to_string(), "--no-auth-cache".to_string()];
        if let Some(creds) = &self.credentials {
            args.push("--username".into());
            args.push(creds.username.clone());
            if let Some(password) = &creds.password {
                args.push("--password".into());
                args.push(password.clone());
            }
        }
        if let Some(proxy) = &self.proxy {
            let mut option = |key: &str, value: &str| {
                args.push("--config-option".into());
                args.push(format!("servers:global:{}={}", key, value));
            };
            option("http-proxy-host", &proxy.host);
            option("http-proxy-port", &proxy.port.to_string());
            if let Some(user) = &proxy.username {
                option("http-proxy-username", user);
            }
            if let Some(password) = &proxy.password {
                option("http-proxy-password", password);
            }
        }
        args
    }

    fn command(&self, dir: Option<&Path>, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.args(args)
            .args(self.global_args())
            // commit and merge messages are parsed, they must stay untranslated
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // a dropped future must not leave svn writing into a released working copy
            .kill_on_drop(true);
        cmd
    }

    async fn exec(&self, dir: Option<&Path>, args: &[&str]) -> Result<Output, SvnError> {
        let mut cmd = self.command(dir, args);
        debug!(cmd = ?format!("svn {}", args.join(" ")), "running svn command");
        cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SvnError::BinaryNotFound(self.binary.clone())
            } else {
                SvnError::IoError(e)
            }
        })
    }

    async fn run_svn_raw(&self, dir: Option<&Path>, args: &[&str]) -> Result<Vec<u8>, SvnError> {
        let output = self.exec(dir, args).await?;
        if !output.status.success() {
            return Err(command_failed(&output));
        }
        Ok(output.stdout)
    }

    async fn run_svn(&self, args: &[&str]) -> Result<String, SvnError> {
        let stdout = self.run_svn_raw(None, args).await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    async fn run_svn_in_dir(&self, dir: &Path, args: &[&str]) -> Result<String, SvnError> {
        let stdout = self.run_svn_raw(Some(dir), args).await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    /// Turn the output of a committing command into a [`CommitInfo`].
    async fn committed(&self, output: &str) -> Result<Option<CommitInfo>, SvnError> {
        let Some(revision) = parse_committed_revision(output) else {
            return Ok(None);
        };
        let author = self.revision_author(revision).await;
        info!(revision, %author, "svn commit succeeded");
        Ok(Some(CommitInfo { revision, author }))
    }

    async fn require_committed(&self, output: &str) -> Result<CommitInfo, SvnError> {
        self.committed(output).await?.ok_or_else(|| {
            SvnError::UnexpectedOutput(format!(
                "could not parse committed revision from: {}",
                output
            ))
        })
    }

    /// Author recorded for `revision`, falling back to the configured user.
    async fn revision_author(&self, revision: i64) -> String {
        let rev = revision.to_string();
        let fallback = || {
            self.credentials
                .as_ref()
                .map(|c| c.username.clone())
                .unwrap_or_default()
        };
        match self.run_svn(&["log", "--xml", "-r", &rev, &self.url]).await {
            Ok(xml) => match parse_svn_log(&xml) {
                Ok(entries) => entries
                    .into_iter()
                    .next()
                    .map(|e| e.author)
                    .unwrap_or_else(fallback),
                Err(_) => fallback(),
            },
            Err(e) => {
                warn!(revision, error = %e, "could not read revision author");
                fallback()
            }
        }
    }
}

fn command_failed(output: &Output) -> SvnError {
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);
    warn!(exit_code, %stderr, "svn command failed");
    SvnError::CommandFailed { exit_code, stderr }
}

/// Conflicts reported by `svn merge`. A merge that stopped after a
/// conflicting range is not a failure; what it printed is complete.
fn merge_conflicts(
    status: Result<(), SvnError>,
    stdout: &str,
) -> Result<Vec<ConflictDescription>, SvnError> {
    if let Err(err) = status {
        if !err.has_code(SVN_ERR_MERGE_CONFLICTS_PRODUCED) {
            return Err(err);
        }
    }
    Ok(parse_merge_conflicts(stdout))
}

fn pegged(url: &str, revision: Revision) -> String {
    format!("{}@{}", url, revision)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[async_trait]
impl SvnBackend for SvnClient {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn is_working_copy(&self, path: &Path) -> Result<bool, SvnError> {
        if !path.join(".svn").is_dir() {
            return Ok(false);
        }
        match self.run_svn(&["info", "--xml", &path_arg(path)]).await {
            Ok(_) => Ok(true),
            Err(e) if e.has_code(SVN_ERR_NOT_WORKING_COPY) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn checkout(&self, url: &str, path: &Path, revision: Revision) -> Result<(), SvnError> {
        let target = pegged(url, revision);
        self.run_svn(&["checkout", "--depth", "infinity", &target, &path_arg(path)])
            .await?;
        info!(path = %path.display(), %revision, "svn checkout completed");
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn switch(&self, url: &str, path: &Path, revision: Revision) -> Result<(), SvnError> {
        let target = pegged(url, revision);
        self.run_svn(&[
            "switch",
            "--ignore-ancestry",
            "--set-depth",
            "infinity",
            &target,
            &path_arg(path),
        ])
        .await?;
        info!(path = %path.display(), %revision, "svn switch completed");
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn copy(
        &self,
        src_url: &str,
        revision: Revision,
        dst_url: &str,
        message: &str,
    ) -> Result<CommitInfo, SvnError> {
        let source = pegged(src_url, revision);
        let output = self
            .run_svn(&["copy", "--parents", &source, dst_url, "-m", message])
            .await?;
        self.require_committed(&output).await
    }

    #[instrument(skip(self, message))]
    async fn mkdir(&self, urls: &[String], message: &str) -> Result<CommitInfo, SvnError> {
        let mut args = vec!["mkdir", "--parents", "-m", message];
        args.extend(urls.iter().map(String::as_str));
        let output = self.run_svn(&args).await?;
        self.require_committed(&output).await
    }

    #[instrument(skip(self, message))]
    async fn delete(&self, url: &str, message: &str) -> Result<CommitInfo, SvnError> {
        let output = self.run_svn(&["delete", url, "-m", message]).await?;
        self.require_committed(&output).await
    }

    #[instrument(skip(self, wc, on_conflict), fields(wc = %wc.display()))]
    async fn merge(
        &self,
        src_url: &str,
        start: Revision,
        end: Revision,
        wc: &Path,
        on_conflict: &mut ConflictHandler<'_>,
    ) -> Result<(), SvnError> {
        let range = format!("{}:{}", start, end);
        let output = self
            .exec(
                Some(wc),
                &["merge", "--accept", "postpone", "-r", &range, src_url, "."],
            )
            .await?;

        let status = if output.status.success() {
            Ok(())
        } else {
            Err(command_failed(&output))
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let conflicts = merge_conflicts(status, &stdout)?;
        debug!(count = conflicts.len(), "svn merge finished");
        for conflict in &conflicts {
            let choice = on_conflict(conflict);
            if choice == ConflictChoice::Postpone {
                continue;
            }
            self.run_svn_in_dir(
                wc,
                &["resolve", "--accept", choice.as_accept_arg(), &conflict.path],
            )
            .await?;
            debug!(path = %conflict.path, ?choice, "resolved merge conflict");
        }
        Ok(())
    }

    #[instrument(skip(self, wc, message), fields(wc = %wc.display()))]
    async fn commit(&self, wc: &Path, message: &str) -> Result<Option<CommitInfo>, SvnError> {
        let output = self
            .run_svn_in_dir(wc, &["commit", "--depth", "infinity", "-m", message, "."])
            .await?;
        let info = self.committed(&output).await?;
        if info.is_none() {
            debug!("nothing to commit");
        }
        Ok(info)
    }

    #[instrument(skip(self, wc), fields(wc = %wc.display()))]
    async fn revert(&self, wc: &Path) -> Result<(), SvnError> {
        self.run_svn_in_dir(wc, &["revert", "--depth", "infinity", "."])
            .await?;
        self.run_svn_in_dir(wc, &["cleanup", "--remove-unversioned", "."])
            .await?;
        debug!("working copy reverted");
        Ok(())
    }

    #[instrument(skip(self, wc, path), fields(wc = %wc.display(), path = %path.display()))]
    async fn add(&self, wc: &Path, path: &Path) -> Result<(), SvnError> {
        self.run_svn_in_dir(wc, &["add", "--force", "--parents", &path_arg(path)])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cat(&self, url: &str, revision: Revision) -> Result<Vec<u8>, SvnError> {
        let target = pegged(url, revision);
        self.run_svn_raw(None, &["cat", &target]).await
    }

    #[instrument(skip(self))]
    async fn node_kind(&self, url: &str, revision: Revision) -> Result<NodeKind, SvnError> {
        let target = pegged(url, revision);
        match self.run_svn(&["info", "--xml", &target]).await {
            Ok(xml) => Ok(parse_svn_info(&xml)?.kind),
            Err(e) if e.is_not_found() => Ok(NodeKind::None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, url: &str) -> Result<Vec<SvnListEntry>, SvnError> {
        let output = self.run_svn(&["list", "--xml", url]).await?;
        let entries = parse_svn_list(&output)?;
        debug!(count = entries.len(), "listed entries");
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn log(
        &self,
        url: &str,
        peg: Revision,
        start: Revision,
        end: Revision,
        limit: Option<usize>,
        stop_on_copy: bool,
    ) -> Result<Vec<SvnLogEntry>, SvnError> {
        let target = pegged(url, peg);
        let range = format!("{}:{}", start, end);
        let limit_str = limit.map(|l| l.to_string());
        let mut args = vec!["log", "--xml", "--verbose", "-r", range.as_str()];
        if stop_on_copy {
            args.push("--stop-on-copy");
        }
        if let Some(limit) = limit_str.as_deref() {
            args.push("--limit");
            args.push(limit);
        }
        args.push(&target);
        let output = self.run_svn(&args).await?;
        parse_svn_log(&output)
    }

    #[instrument(skip(self))]
    async fn diff_summarize(
        &self,
        old_url: &str,
        new_url: &str,
    ) -> Result<Vec<SvnDiffEntry>, SvnError> {
        let old = pegged(old_url, Revision::Head);
        let new = pegged(new_url, Revision::Head);
        let output = self
            .run_svn(&["diff", "--summarize", "--xml", &old, &new])
            .await?;
        parse_svn_diff_summarize(&output)
    }

    #[instrument(skip(self))]
    async fn diff(&self, old_url: &str, new_url: &str) -> Result<String, SvnError> {
        let old = pegged(old_url, Revision::Head);
        let new = pegged(new_url, Revision::Head);
        self.run_svn(&["diff", &old, &new]).await
    }

    #[instrument(skip(self))]
    async fn repository_root(&self, url: &str) -> Result<String, SvnError> {
        let output = self.run_svn(&["info", "--xml", url]).await?;
        Ok(parse_svn_info(&output)?.root_url.trim_end_matches('/').to_string())
    }

    fn set_credentials(&mut self, credentials: Option<Credentials>) {
        debug!(
            username = credentials.as_ref().map(|c| c.username.as_str()).unwrap_or(""),
            "updated svn credentials"
        );
        self.credentials = credentials;
    }

    fn set_proxy(&mut self, proxy: Option<ProxySettings>) {
        debug!(host = proxy.as_ref().map(|p| p.host.as_str()).unwrap_or(""), "updated svn proxy");
        self.proxy = proxy;
    }
}
