//! `systemctl`-backed service control.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::traits::ServiceControl;

const KNOCKER: &str = "knocker";
const SYSTEMCTL: &str = "systemctl";

/// Controls the knocker unit through `systemctl` and the `knocker` CLI.
///
/// Every failure, including a missing binary, is reported as `false`.
#[derive(Debug, Clone)]
pub struct SystemdService {
    unit: String,
    user_scope: bool,
}

impl SystemdService {
    /// Creates a controller for `unit`.
    #[must_use]
    pub fn new(unit: impl Into<String>, user_scope: bool) -> Self {
        Self {
            unit: unit.into(),
            user_scope,
        }
    }

    /// Returns the controlled unit.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Arguments for `systemctl <verb> <unit>`.
    #[must_use]
    pub fn systemctl_args(&self, verb: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(3);
        if self.user_scope {
            args.push("--user".to_string());
        }
        args.push(verb.to_string());
        args.push(self.unit.clone());
        args
    }

    async fn run(program: &str, args: &[String]) -> Option<std::process::Output> {
        debug!(program, ?args, "running command");
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
        {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(program, error = %e, "failed to run command");
                None
            }
        }
    }

    async fn succeeds(program: &str, args: &[String]) -> bool {
        let Some(output) = Self::run(program, args).await else {
            return false;
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                program,
                ?args,
                status = %output.status,
                stderr = %stderr.trim(),
                "command failed"
            );
        }
        output.status.success()
    }
}

impl ServiceControl for SystemdService {
    async fn is_installed(&self) -> bool {
        Self::run("which", &[KNOCKER.to_string()])
            .await
            .is_some_and(|output| output.status.success())
    }

    async fn is_active(&self) -> bool {
        // `is-active` exits non-zero for inactive units, which is not a failure.
        Self::run(SYSTEMCTL, &self.systemctl_args("is-active"))
            .await
            .is_some_and(|output| String::from_utf8_lossy(&output.stdout).trim() == "active")
    }

    async fn start(&self) -> bool {
        Self::succeeds(SYSTEMCTL, &self.systemctl_args("start")).await
    }

    async fn stop(&self) -> bool {
        Self::succeeds(SYSTEMCTL, &self.systemctl_args("stop")).await
    }

    async fn trigger_knock(&self) -> bool {
        Self::succeeds(KNOCKER, &["knock".to_string()]).await
    }
}
