#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::{Context, Result};
use bon::Builder;
use itertools::Itertools;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, Command},
    time::timeout,
};

/// Drop guard that terminates a spawned child process if callers forget to
/// await it, or if the awaiting future is dropped (timeout, Ctrl-C).
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status: std::process::ExitStatus,
    /// Contents written to stdout.
    pub stdout: Vec<u8>,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

impl Collected {
    /// True when the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, if the process was not killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Lossy UTF-8 view of stdout.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Lossy UTF-8 view of stderr.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Describes how stdin should be wired for the spawned process.
#[derive(Debug, Default)]
pub enum StdinSource {
    /// Attach nothing to stdin.
    #[default]
    Null,
    /// Write the provided bytes, then close stdin.
    Bytes(Vec<u8>),
}

/// Marker error attached when a subprocess exceeded its deadline.
#[derive(thiserror::Error, Debug)]
#[error("`{command}` did not finish within {limit:?}")]
pub struct TimedOut {
    /// The rendered command line.
    pub command: String,
    /// The deadline that was exceeded.
    pub limit:   Duration,
}

/// A fully described external command, ready to be run once.
#[derive(Debug, Builder)]
pub struct Invocation {
    /// Program to execute; resolved through `PATH` by the OS.
    #[builder(into)]
    program:  OsString,
    /// Arguments passed verbatim.
    #[builder(default)]
    args:     Vec<OsString>,
    /// How to feed stdin.
    #[builder(default)]
    stdin:    StdinSource,
    /// Working directory of the child.
    #[builder(into)]
    cwd:      Option<PathBuf>,
    /// Optional wall-clock limit.
    deadline: Option<Duration>,
}

impl Invocation {
    /// Renders the command as a shell-like line for logs.
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .join(" ")
    }

    /// Runs the command to completion, collecting its output.
    pub async fn run(self) -> Result<Collected> {
        let rendered = self.render();
        run_collect(
            &self.program,
            &self.args,
            self.stdin,
            self.cwd.as_deref(),
            self.deadline,
        )
        .await
        .with_context(|| format!("while running `{rendered}`"))
    }
}

/// Converts string-like arguments into the owned form `Invocation` expects.
pub fn os_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter().map(|a| a.as_ref().to_owned()).collect()
}

/// Spawns a command, optionally feeds stdin, and collects stdout/stderr.
async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    stdin: StdinSource,
    cwd: Option<&Path>,
    deadline: Option<Duration>,
) -> Result<Collected> {
    let command_line = std::iter::once(program.as_ref())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| part.to_string_lossy().into_owned())
        .join(" ");

    let mut cmd = Command::new(program.as_ref());
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.stdin(match &stdin {
        StdinSource::Null => Stdio::null(),
        StdinSource::Bytes(_) => Stdio::piped(),
    });

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut guard = ChildDropGuard::new(
        cmd.spawn()
            .with_context(|| format!("failed to spawn `{command_line}`"))?,
    );
    let stdin_payload = match stdin {
        StdinSource::Bytes(bytes) => Some(bytes),
        StdinSource::Null => None,
    };

    if let Some(bytes) = stdin_payload
        && let Some(mut handle) = guard.child_mut()?.stdin.take()
    {
        tokio::spawn(async move {
            if !bytes.is_empty() {
                let _ = handle.write_all(&bytes).await;
            }
            let _ = handle.shutdown().await;
        });
    }

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read stdout")?;
        Ok::<Vec<u8>, anyhow::Error>(buf)
    });

    let err_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read stderr")?;
        Ok::<Vec<u8>, anyhow::Error>(buf)
    });

    let wait_future = async move {
        let mut guard = guard;
        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on process")?;
        let stdout = out_task.await.context("stdout task join error")??;
        let stderr = err_task.await.context("stderr task join error")??;
        guard.disarm();
        Ok(Collected {
            status,
            stdout,
            stderr,
        })
    };

    match deadline {
        Some(limit) => match timeout(limit, wait_future).await {
            Ok(collected) => collected,
            Err(_) => Err(TimedOut {
                command: command_line,
                limit,
            }
            .into()),
        },
        None => wait_future.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_joins_program_and_args() {
        let invocation = Invocation::builder()
            .program("g++")
            .args(os_args(["-O2", "solution.cc", "-o", "solution.cc.exe"]))
            .build();
        assert_eq!(invocation.render(), "g++ -O2 solution.cc -o solution.cc.exe");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdin_bytes_reach_the_child() {
        let collected = Invocation::builder()
            .program("cat")
            .stdin(StdinSource::Bytes(b"hello\n".to_vec()))
            .build()
            .run()
            .await
            .expect("cat runs");
        assert!(collected.success());
        assert_eq!(collected.stdout, b"hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn default_stdin_is_empty() {
        let collected = Invocation::builder()
            .program("cat")
            .deadline(Duration::from_secs(5))
            .build()
            .run()
            .await
            .expect("cat runs");
        assert!(collected.success());
        assert!(collected.stdout.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn deadline_produces_timed_out() {
        let err = Invocation::builder()
            .program("sleep")
            .args(os_args(["5"]))
            .deadline(Duration::from_millis(100))
            .build()
            .run()
            .await
            .expect_err("sleep must time out");
        assert!(err.downcast_ref::<TimedOut>().is_some());
    }
}
