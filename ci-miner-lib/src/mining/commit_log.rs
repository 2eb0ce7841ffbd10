//! Streaming traversal of a local commit log.
//!
//! Each traversal spawns its own `git log` and parses records as they arrive, so two
//! passes over the same window never hold the whole log in memory.

use super::LOG_TARGET;
use super::git::{check_git_output, run_git_with_timeout};
use crate::Result;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

const RECORD_SEP: u8 = 0x1e;
const FIELD_SEP: char = '\x1f';
const FIELD_COUNT: usize = 9;
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%P%x1f%an%x1f%ae%x1f%aI%x1f%cn%x1f%ce%x1f%cI%x1f%B%x1f";

const UNKNOWN_NAME: &str = "Unknown";
const UNKNOWN_EMAIL: &str = "unknown@example.com";

/// A name/email pair as recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    fn from_parts(name: &str, email: &str) -> Self {
        let name = name.trim();
        let email = email.trim();
        Self {
            name: if name.is_empty() { UNKNOWN_NAME } else { name }.to_string(),
            email: if email.is_empty() { UNKNOWN_EMAIL } else { email }.to_string(),
        }
    }
}

/// One commit as parsed from the log, before any aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    pub hash: String,
    pub parents: Vec<String>,
    pub author: Identity,
    pub author_date: DateTime<FixedOffset>,
    pub committer: Identity,
    pub committer_date: Option<DateTime<FixedOffset>>,
    pub message: String,
    pub insertions: u64,
    pub deletions: u64,
    pub files_changed: u64,
}

impl RawCommit {
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// A local repository whose history can be traversed repeatedly.
#[derive(Debug, Clone)]
pub struct CommitLog {
    repo_path: PathBuf,
    all_refs: bool,
}

impl CommitLog {
    /// `all_refs` selects every ref instead of only `HEAD`.
    #[must_use]
    pub fn new(repo_path: impl Into<PathBuf>, all_refs: bool) -> Self {
        Self {
            repo_path: repo_path.into(),
            all_refs,
        }
    }

    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Start a traversal of commits authored at or after `since`.
    pub fn walk(&self, since: DateTime<Utc>) -> Result<CommitWalker> {
        let path_str = self.path_str()?;
        let since_arg = format!("--since={}", since.to_rfc3339_opts(SecondsFormat::Secs, true));
        let refs = if self.all_refs { "--all" } else { "HEAD" };

        let mut child = Command::new("git")
            .args(["-C", path_str, "-c", "core.quotepath=off", "log", refs, "--reverse", "--no-color", "--numstat", LOG_FORMAT])
            .arg(&since_arg)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .into_app_err("could not spawn git log")?;

        let stdout = child.stdout.take().into_app_err("git log stdout unavailable")?;
        let mut stderr = child.stderr.take().into_app_err("git log stderr unavailable")?;

        // Drain stderr concurrently so a chatty git cannot block on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        Ok(CommitWalker {
            child,
            reader: BufReader::new(stdout),
            stderr_task: Some(stderr_task),
            buf: Vec::new(),
            since,
            finished: false,
        })
    }

    /// Hashes reachable from `HEAD` inside the window.
    ///
    /// Returns `None` when only `HEAD` is traversed, in which case every commit is on
    /// the main branch.
    pub async fn main_branch_commits(&self, since: DateTime<Utc>) -> Result<Option<HashSet<String>>> {
        if !self.all_refs {
            return Ok(None);
        }

        let path_str = self.path_str()?;
        let since_arg = format!("--since={}", since.to_rfc3339_opts(SecondsFormat::Secs, true));
        let output = run_git_with_timeout(&["-C", path_str, "rev-list", "HEAD", &since_arg]).await?;
        check_git_output(&output, "git rev-list")?;

        Ok(Some(String::from_utf8_lossy(&output.stdout).lines().map(str::to_string).collect()))
    }

    fn path_str(&self) -> Result<&str> {
        self.repo_path.to_str().into_app_err("invalid UTF-8 in repository path")
    }
}

/// One in-flight traversal. Yields commits oldest first.
#[derive(Debug)]
pub struct CommitWalker {
    child: Child,
    reader: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    buf: Vec<u8>,
    since: DateTime<Utc>,
    finished: bool,
}

impl CommitWalker {
    /// Next commit inside the window, or `None` once the log is exhausted.
    pub async fn next_commit(&mut self) -> Result<Option<RawCommit>> {
        while !self.finished {
            self.buf.clear();
            let n = self
                .reader
                .read_until(RECORD_SEP, &mut self.buf)
                .await
                .into_app_err("reading git log output")?;

            if n == 0 {
                self.finish().await?;
                break;
            }

            if self.buf.last() == Some(&RECORD_SEP) {
                let _ = self.buf.pop();
            }

            let text = String::from_utf8_lossy(&self.buf);
            if text.trim().is_empty() {
                continue;
            }

            let Some(commit) = parse_record(&text) else {
                log::warn!(target: LOG_TARGET, "Skipping unparseable git log record");
                continue;
            };

            // --since filters on committer date; the window is defined on author date
            if commit.author_date.with_timezone(&Utc) < self.since {
                continue;
            }

            return Ok(Some(commit));
        }

        Ok(None)
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished = true;

        let status = self.child.wait().await.into_app_err("waiting for git log")?;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            bail!("git log failed: {}", stderr.trim());
        }

        Ok(())
    }
}

/// Parse one `git log` record (without the leading record separator).
fn parse_record(text: &str) -> Option<RawCommit> {
    let text = text.trim_start_matches(['\n', '\r']);
    let mut fields = text.splitn(FIELD_COUNT + 1, FIELD_SEP);

    let hash = fields.next()?.trim().to_string();
    let parents = fields.next()?.split_whitespace().map(str::to_string).collect();
    let author_name = fields.next()?;
    let author_email = fields.next()?;
    let author_date_text = fields.next()?;
    let committer_name = fields.next()?;
    let committer_email = fields.next()?;
    let committer_date_text = fields.next()?;
    let message = fields.next()?.trim_end().to_string();
    let numstat = fields.next().unwrap_or_default();

    if hash.is_empty() {
        return None;
    }

    let author_date = match DateTime::parse_from_rfc3339(author_date_text.trim()) {
        Ok(ts) => ts,
        Err(e) => {
            log::warn!(target: LOG_TARGET, "Skipping commit {hash} with malformed author date '{author_date_text}': {e}");
            return None;
        }
    };
    let committer_date = DateTime::parse_from_rfc3339(committer_date_text.trim()).ok();

    let mut insertions = 0;
    let mut deletions = 0;
    let mut files_changed = 0;
    for line in numstat.lines().filter(|l| !l.trim().is_empty()) {
        let mut parts = line.splitn(3, '\t');
        let (Some(added), Some(removed), Some(_path)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };

        // Binary files report "-" for both counts
        insertions += added.parse::<u64>().unwrap_or(0);
        deletions += removed.parse::<u64>().unwrap_or(0);
        files_changed += 1;
    }

    Some(RawCommit {
        hash,
        parents,
        author: Identity::from_parts(author_name, author_email),
        author_date,
        committer: Identity::from_parts(committer_name, committer_email),
        committer_date,
        message,
        insertions,
        deletions,
        files_changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str], numstat: &str) -> String {
        let mut s = fields.join("\x1f");
        s.push('\x1f');
        s.push_str(numstat);
        s
    }

    #[test]
    fn test_parse_record_with_numstat() {
        let text = record(
            &[
                "abc123",
                "p1",
                "Ada",
                "ada@example.com",
                "2024-01-02T10:30:00+02:00",
                "Bob",
                "bob@example.com",
                "2024-01-02T11:00:00+02:00",
                "Fix the thing\n\nLonger body\n",
            ],
            "\n\n3\t1\tsrc/lib.rs\n-\t-\tassets/logo.png\n10\t0\tREADME.md\n",
        );

        let commit = parse_record(&text).unwrap();
        assert_eq!(commit.hash, "abc123");
        assert_eq!(commit.parents, vec!["p1"]);
        assert!(!commit.is_merge());
        assert_eq!(commit.author.name, "Ada");
        assert_eq!(commit.committer.email, "bob@example.com");
        assert_eq!(commit.message, "Fix the thing\n\nLonger body");
        assert_eq!(commit.insertions, 13);
        assert_eq!(commit.deletions, 1);
        assert_eq!(commit.files_changed, 3);
        assert_eq!(commit.author_date.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_parse_merge_without_numstat() {
        let text = record(
            &["m1", "p1 p2", "", "", "2024-01-02T10:30:00Z", "C", "c@x", "2024-01-02T10:30:00Z", "Merge"],
            "\n",
        );

        let commit = parse_record(&text).unwrap();
        assert!(commit.is_merge());
        assert_eq!(commit.author.name, "Unknown");
        assert_eq!(commit.author.email, "unknown@example.com");
        assert_eq!(commit.files_changed, 0);
    }

    #[test]
    fn test_parse_rejects_malformed_author_date() {
        let text = record(&["h", "", "A", "a@x", "yesterday", "C", "c@x", "", "msg"], "");
        assert!(parse_record(&text).is_none());
    }

    #[test]
    fn test_parse_rejects_truncated_record() {
        assert!(parse_record("abc\x1fp1\x1fAda").is_none());
        assert!(parse_record("").is_none());
    }

    #[test]
    fn test_missing_committer_date_is_tolerated() {
        let text = record(&["h", "", "A", "a@x", "2024-01-02T10:30:00Z", "C", "c@x", "", "msg"], "");
        let commit = parse_record(&text).unwrap();
        assert!(commit.committer_date.is_none());
    }
}
