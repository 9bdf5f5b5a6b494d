//! `journalctl`-backed log collaborators.
//!
//! Both collaborators run `journalctl -o json` so every line is one JSON
//! object with the journal's field names as keys.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{MonitorError, Result};
use crate::traits::{LogQuery, LogReader, LogSource};

const JOURNALCTL: &str = "journalctl";

fn base_args(unit: &str, user_scope: bool) -> Vec<String> {
    let mut args = Vec::with_capacity(8);
    if user_scope {
        args.push("--user".to_string());
    }
    args.extend([
        "-u".to_string(),
        unit.to_string(),
        "-o".to_string(),
        "json".to_string(),
        "--no-pager".to_string(),
    ]);
    args
}

/// Arguments for a one-shot query of the last `max_records` records.
#[must_use]
pub fn query_args(unit: &str, user_scope: bool, max_records: usize) -> Vec<String> {
    let mut args = base_args(unit, user_scope);
    args.extend(["-n".to_string(), max_records.to_string()]);
    args
}

/// Arguments for following new records, optionally resuming after a cursor.
#[must_use]
pub fn follow_args(unit: &str, user_scope: bool, after_cursor: Option<&str>) -> Vec<String> {
    let mut args = base_args(unit, user_scope);
    args.push("-f".to_string());
    match after_cursor {
        Some(cursor) => args.push(format!("--after-cursor={cursor}")),
        None => args.extend(["-n".to_string(), "0".to_string()]),
    }
    args
}

/// Backlog query through `journalctl -n`.
#[derive(Debug, Clone, Copy)]
pub struct JournalctlQuery {
    user_scope: bool,
}

impl JournalctlQuery {
    /// Creates a query for user units (`--user`) or system units.
    #[must_use]
    pub const fn new(user_scope: bool) -> Self {
        Self { user_scope }
    }
}

impl LogQuery for JournalctlQuery {
    async fn query(
        &self,
        unit: &str,
        max_records: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let args = query_args(unit, self.user_scope, max_records);
        debug!(?args, "querying journal backlog");

        let mut command = Command::new(JOURNALCTL);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MonitorError::Cancelled),
            output = command.output() => output
                .map_err(|e| MonitorError::Query(format!("failed to run {JOURNALCTL}: {e}")))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MonitorError::Query(format!(
                "{JOURNALCTL} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Live stream through `journalctl -f`.
#[derive(Debug, Clone, Copy)]
pub struct JournalctlSource {
    user_scope: bool,
}

impl JournalctlSource {
    /// Creates a source for user units (`--user`) or system units.
    #[must_use]
    pub const fn new(user_scope: bool) -> Self {
        Self { user_scope }
    }
}

impl LogSource for JournalctlSource {
    type Reader = JournalReader;

    async fn open(&self, unit: &str, after_cursor: Option<&str>) -> Result<JournalReader> {
        let args = follow_args(unit, self.user_scope, after_cursor);
        debug!(?args, "spawning journal follower");

        let mut child = Command::new(JOURNALCTL)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MonitorError::StreamOpen(format!("failed to spawn {JOURNALCTL}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MonitorError::StreamOpen("journalctl stdout unavailable".to_string()))?;

        Ok(JournalReader {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

/// Reads lines from a running `journalctl -f` child.
///
/// The child is killed when the reader is closed or dropped.
#[derive(Debug)]
pub struct JournalReader {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl LogReader for JournalReader {
    async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .map_err(|e| MonitorError::StreamRead(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "journalctl already exited");
        }
        let _ = self.child.wait().await;
    }
}
