// src/exec/process.rs

//! Child processes in their own process group.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use globset::GlobSet;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::{CommandOptions, ProcessOptions, ShellOptions};
use crate::exec::collaborator::{StepContext, StepOutcome};
use crate::output::OutputSink;
use crate::types::OutputStream;
use crate::watch::rules::build_globset;
use crate::watch::watcher::{spawn_watcher, WatcherHandle};

/// Lines of output kept for failure reports.
const TAIL_LINES: usize = 20;

/// How long to wait for the output readers after the child exits. A
/// grandchild that inherited the pipes can keep them open indefinitely.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Fully resolved description of a process to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl ProcessSpec {
    pub fn command(opts: &CommandOptions, root: &Path) -> Self {
        Self {
            program: opts.program.clone(),
            args: opts.args.clone(),
            cwd: resolve_cwd(root, opts.cwd.as_deref()),
            env: opts.env.clone(),
        }
    }

    /// `sh -c <cmd>`, or `cmd /C <cmd>` on Windows.
    pub fn shell(opts: &ShellOptions, root: &Path) -> Self {
        let (program, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        Self {
            program: program.to_string(),
            args: vec![flag.to_string(), opts.cmd.clone()],
            cwd: resolve_cwd(root, opts.cwd.as_deref()),
            env: opts.env.clone(),
        }
    }

    pub fn process(opts: &ProcessOptions, root: &Path) -> Self {
        Self {
            program: opts.program.clone(),
            args: opts.args.clone(),
            cwd: resolve_cwd(root, opts.cwd.as_deref()),
            env: opts.env.clone(),
        }
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn resolve_cwd(root: &Path, cwd: Option<&str>) -> PathBuf {
    match cwd {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    }
}

type OutputTail = Arc<Mutex<VecDeque<String>>>;

/// A running child whose stdout/stderr are forwarded to an [`OutputSink`].
///
/// On Unix the child leads a new session (`setsid`), so signals sent to its
/// process group reach everything it spawned. Dropping this value before the
/// child has been reaped kills the whole group, grandchildren included.
pub struct ManagedProcess {
    child: Child,
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<i32>,
    #[cfg_attr(not(unix), allow(dead_code))]
    reaped: bool,
    pumps: Vec<JoinHandle<()>>,
    tail: OutputTail,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("pid", &self.child.id())
            .field("pgid", &self.pgid)
            .finish_non_exhaustive()
    }
}

impl ManagedProcess {
    pub fn spawn(spec: &ProcessSpec, label: &str, sink: Arc<dyn OutputSink>) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // New session so the whole tree can be signalled as one group.
        #[cfg(unix)]
        {
            // SAFETY: setsid is async-signal-safe and touches no parent state.
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning `{spec}` in {:?}", spec.cwd))?;
        let pgid = child.id().map(|pid| pid as i32);

        let tail: OutputTail = Arc::new(Mutex::new(VecDeque::with_capacity(TAIL_LINES)));
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump(stdout, label, OutputStream::Stdout, &sink, &tail));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump(stderr, label, OutputStream::Stderr, &sink, &tail));
        }

        debug!(task = %label, pid = ?pgid, cmd = %spec, "spawned process");
        Ok(Self {
            child,
            pgid,
            reaped: false,
            pumps,
            tail,
        })
    }

    /// Wait for the child to exit, then for its remaining output.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().await.context("waiting for child process")?;
        self.reaped = true;
        self.drain_output().await;
        Ok(status)
    }

    /// Stop the whole process group: SIGTERM, wait up to `grace`, SIGKILL.
    pub async fn terminate(&mut self, grace: Duration) {
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            if let Some(pgid) = self.pgid {
                if signal_group(pgid, Signal::SIGTERM) {
                    if tokio::time::timeout(grace, self.child.wait()).await.is_err() {
                        warn!(pgid, ?grace, "process group ignored SIGTERM; sending SIGKILL");
                        signal_group(pgid, Signal::SIGKILL);
                        let _ = self.child.wait().await;
                    }
                    self.reaped = true;
                    self.drain_output().await;
                    return;
                }
            }
        }

        let _ = grace;
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "kill after exit");
        }
        self.reaped = true;
        self.drain_output().await;
    }

    /// Last lines of combined output.
    pub fn tail(&self) -> Vec<String> {
        self.tail
            .lock()
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn drain_output(&mut self) {
        for mut handle in self.pumps.drain(..) {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await.is_err() {
                handle.abort();
            }
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        // Reached when the owning task is aborted mid-step; `kill_on_drop`
        // alone would leave the rest of the group running.
        #[cfg(unix)]
        {
            if !self.reaped {
                if let Some(pgid) = self.pgid {
                    debug!(pgid, "process dropped while running; killing its group");
                    signal_group(pgid, nix::sys::signal::Signal::SIGKILL);
                }
            }
        }
    }
}

/// Send `signal` to process group `pgid`. Returns false when the group no
/// longer exists.
#[cfg(unix)]
fn signal_group(pgid: i32, signal: nix::sys::signal::Signal) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            warn!(pgid, ?signal, error = %e, "signalling process group failed");
            true
        }
    }
}

fn pump<R>(
    reader: R,
    label: &str,
    stream: OutputStream,
    sink: &Arc<dyn OutputSink>,
    tail: &OutputTail,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let label = label.to_string();
    let sink = Arc::clone(sink);
    let tail = Arc::clone(tail);

    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    sink.line(&label, stream, line);
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line.to_string());
                    }
                }
                Err(e) => {
                    debug!(task = %label, error = %e, "output stream closed");
                    break;
                }
            }
        }
    })
}

/// Run a `process` action until cancelled.
///
/// With `restart_on` globs, a matching file change restarts the process;
/// if the process exits on its own it is restarted on the next change
/// rather than ending the step. Without `restart_on`, the step ends when the
/// process exits.
pub async fn run_long_lived(
    opts: &ProcessOptions,
    ctx: &StepContext,
) -> crate::errors::Result<StepOutcome> {
    let spec = ProcessSpec::process(opts, &ctx.root);
    let mut restart = if opts.restart_on.is_empty() {
        None
    } else {
        Some(RestartWatch::start(&ctx.root, &opts.restart_on)?)
    };

    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(StepOutcome::cancelled());
        }

        let mut child = ManagedProcess::spawn(&spec, &ctx.label, Arc::clone(&ctx.sink))?;
        info!(task = %ctx.label, cmd = %spec, "started long-lived process");

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = ctx.cancel.cancelled() => {
                info!(task = %ctx.label, "stopping long-lived process");
                child.terminate(ctx.shutdown_grace).await;
                return Ok(StepOutcome::cancelled().with_tail(child.tail()));
            }
            path = next_restart(&mut restart, ctx.debounce) => {
                info!(task = %ctx.label, path = %path, "restart_on file changed; restarting");
                child.terminate(ctx.shutdown_grace).await;
                continue;
            }
        };

        let outcome = if status.success() {
            StepOutcome::success()
        } else {
            StepOutcome::failed(status.code())
        }
        .with_tail(child.tail());

        if restart.is_none() {
            info!(task = %ctx.label, exit_code = ?status.code(), "long-lived process exited");
            return Ok(outcome);
        }

        warn!(
            task = %ctx.label,
            exit_code = ?status.code(),
            "process exited; waiting for file changes before restarting"
        );
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(StepOutcome::cancelled()),
            path = next_restart(&mut restart, ctx.debounce) => {
                info!(task = %ctx.label, path = %path, "restart_on file changed; restarting");
            }
        }
    }
}

async fn next_restart(restart: &mut Option<RestartWatch>, debounce: Duration) -> String {
    match restart {
        Some(watch) => watch.changed(debounce).await,
        None => std::future::pending().await,
    }
}

/// File watcher behind `restart_on`.
struct RestartWatch {
    patterns: GlobSet,
    rx: mpsc::UnboundedReceiver<String>,
    _handle: WatcherHandle,
}

impl RestartWatch {
    fn start(root: &Path, patterns: &[String]) -> Result<Self> {
        let patterns = build_globset(patterns)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_watcher(root, tx)?;
        Ok(Self {
            patterns,
            rx,
            _handle: handle,
        })
    }

    /// Resolve with the first matching path once changes have been quiet for
    /// `debounce`. Pends forever if the watcher stops.
    async fn changed(&mut self, debounce: Duration) -> String {
        let first = loop {
            match self.rx.recv().await {
                Some(path) if self.patterns.is_match(&path) => break path,
                Some(_) => continue,
                None => return std::future::pending().await,
            }
        };
        loop {
            match tokio::time::timeout(debounce, self.rx.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return first,
            }
        }
    }
}
