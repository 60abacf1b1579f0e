// src/exec/command.rs

//! External shell commands (bundler, deploy).

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Build a shell command appropriate for the platform.
pub fn shell(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

/// Run `command_line` in `cwd`, forwarding its output to the log, and wait
/// for it to exit.
pub async fn run_shell(label: &str, command_line: &str, cwd: &Path) -> Result<ExitStatus> {
    info!(task = %label, cmd = %command_line, "running command");

    let mut cmd = shell(command_line);
    cmd.current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning `{command_line}` for task '{label}'"))?;

    let stdout = child.stdout.take().map(|out| {
        let label = label.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(task = %label, "{line}");
            }
        })
    });

    let stderr = child.stderr.take().map(|err| {
        let label = label.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(task = %label, "{line}");
            }
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for `{command_line}`"))?;

    for reader in [stdout, stderr].into_iter().flatten() {
        let _ = reader.await;
    }

    debug!(task = %label, code = ?status.code(), success = status.success(), "command exited");
    Ok(status)
}
