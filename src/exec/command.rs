// src/exec/command.rs

//! Shell-command leaf body.
//!
//! This is the body behind every `cmd = "..."` task in the config file. The
//! command runs through the platform shell in the project root; its stdout
//! and stderr are forwarded line by line, as raw bytes, so build tool output
//! shows up as it is produced.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::exec::ExecutionContext;
use crate::task::{BodyFuture, TaskBody};
use crate::types::{RunMode, TaskName};

/// Environment variable carrying the task label into the child process.
pub const TASK_ENV_VAR: &str = "BUILDRIG_TASK";
/// Environment variable carrying the run mode (`once` / `watch`).
pub const MODE_ENV_VAR: &str = "BUILDRIG_MODE";

/// How long output is still drained after the command itself has exited.
/// Background processes that inherited the pipes can keep them open forever.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ShellCommand {
    name: TaskName,
    cmd: String,
    cwd: PathBuf,
}

impl ShellCommand {
    pub fn new(name: impl Into<TaskName>, cmd: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            cwd: cwd.into(),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run(self, mode: RunMode) -> Result<()> {
        self.run_to(mode, tokio::io::stdout(), tokio::io::stderr())
            .await
    }

    /// Run the command, copying its stdout into `out` and its stderr into
    /// `err`. Returns once the child has exited and both streams are drained
    /// (or [`DRAIN_GRACE`] has passed since the exit).
    async fn run_to<O, E>(&self, mode: RunMode, out: O, err: E) -> Result<()>
    where
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        debug!(
            task = %self.name,
            cmd = %self.cmd,
            cwd = ?self.cwd,
            "spawning shell command"
        );

        let mut cmd = platform_shell(&self.cmd);
        cmd.current_dir(&self.cwd)
            .env(TASK_ENV_VAR, &self.name)
            .env(MODE_ENV_VAR, mode.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", self.name))?;

        // Both pipes are drained on this task while the child runs; a full
        // pipe would otherwise stall the child.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let drain = async { tokio::join!(forward_output(stdout, out), forward_output(stderr, err)) };
        tokio::pin!(drain);

        let mut drained = None;
        let status = loop {
            tokio::select! {
                res = &mut drain, if drained.is_none() => drained = Some(res),
                status = child.wait() => break status,
            }
        };
        let status =
            status.with_context(|| format!("waiting for process of task '{}'", self.name))?;

        if drained.is_none() {
            match tokio::time::timeout(DRAIN_GRACE, &mut drain).await {
                Ok(res) => drained = Some(res),
                Err(_) => warn!(
                    task = %self.name,
                    "output still open after the command exited (background process?); not waiting for it"
                ),
            }
        }
        if let Some((out_res, err_res)) = drained {
            for res in [out_res, err_res] {
                if let Err(e) = res {
                    debug!(task = %self.name, error = %e, "output forwarding stopped early");
                }
            }
        }

        debug!(task = %self.name, success = status.success(), "shell command exited");

        if status.success() {
            return Ok(());
        }
        match status.code() {
            Some(code) => bail!("command `{}` exited with code {code}", self.cmd),
            None => bail!("command `{}` was terminated by a signal", self.cmd),
        }
    }
}

impl TaskBody for ShellCommand {
    fn invoke(&self, ctx: &ExecutionContext) -> BodyFuture {
        let this = self.clone();
        let mode = ctx.mode();
        Box::pin(async move { this.run(mode).await })
    }
}

fn platform_shell(command_line: &str) -> Command {
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

/// Copy `reader` into `writer` one line at a time, bytes untouched.
///
/// Reading continues after a failed write so the child never sees a closed
/// pipe; the first write error is returned once the reader hits EOF.
async fn forward_output<R, W>(reader: Option<R>, mut writer: W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(reader) = reader else {
        return Ok(0);
    };
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(256);
    let mut forwarded = 0u64;
    let mut write_err = None;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if write_err.is_some() {
            continue;
        }
        let written = async {
            writer.write_all(&line).await?;
            writer.flush().await
        };
        match written.await {
            Ok(()) => forwarded += line.len() as u64,
            Err(e) => write_err = Some(e),
        }
    }

    match write_err {
        Some(e) => Err(e),
        None => Ok(forwarded),
    }
}
