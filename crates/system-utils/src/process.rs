//! Time-bounded execution of an external program.
//!
//! The program is started directly from an argv vector, never through a
//! shell. Both output pipes are drained by their own tasks while the exit is
//! awaited, so a process that fills a pipe buffer cannot stall on it.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::stream::{drain_into, CapturedStream, OutputBuffer};

pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    program: String,
    args: Vec<String>,
    max_duration: Duration,
}

impl ProcessInvocation {
    pub fn new(program: impl Into<String>, max_duration: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            max_duration,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Set when the program could not be started at all.
    pub launch_error: Option<String>,
    pub elapsed: Duration,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    fn launch_failed(message: String, elapsed: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: message.clone(),
            timed_out: false,
            launch_error: Some(message),
            elapsed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    terminate_grace: Duration,
    max_output_bytes: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ProcessRunner {
    pub fn new(terminate_grace: Duration, max_output_bytes: usize) -> Self {
        Self {
            terminate_grace,
            max_output_bytes,
        }
    }

    pub fn terminate_grace(&self) -> Duration {
        self.terminate_grace
    }

    /// Runs the invocation to completion or until its deadline. Never fails:
    /// launch errors, non-zero exits and timeouts are all reported through
    /// the returned [`ProcessResult`].
    ///
    /// Every process left in the child's group is killed once the child has
    /// exited, and also if this future is dropped before it completes.
    pub async fn run(&self, invocation: &ProcessInvocation) -> ProcessResult {
        let started_at = Instant::now();
        let program = invocation.program();

        let mut child = match spawn(invocation).await {
            Ok(child) => child,
            Err(err) => {
                let message = launch_error_message(program, &err);
                tracing::warn!(program = %program, error = %err, "failed to launch process");
                return ProcessResult::launch_failed(message, started_at.elapsed());
            }
        };
        let mut group = ProcessGroup::of(&child);
        tracing::debug!(
            program = %program,
            pid = ?child.id(),
            args = invocation.argv().len(),
            "process started"
        );

        let stdout_buffer = OutputBuffer::default();
        let stderr_buffer = OutputBuffer::default();
        let stdout_task = child.stdout.take().map(|pipe| {
            tokio::spawn(drain_into(pipe, stdout_buffer.clone(), self.max_output_bytes))
        });
        let stderr_task = child.stderr.take().map(|pipe| {
            tokio::spawn(drain_into(pipe, stderr_buffer.clone(), self.max_output_bytes))
        });

        let mut timed_out = false;
        let mut wait_error = None;
        let status = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Some(status),
                Err(err) => {
                    wait_error = Some(format!("failed to wait on {program}: {err}"));
                    None
                }
            },
            _ = tokio::time::sleep(invocation.max_duration()) => {
                timed_out = true;
                tracing::warn!(
                    program = %program,
                    deadline_ms = invocation.max_duration().as_millis() as u64,
                    "process exceeded deadline, terminating"
                );
                stop_on_deadline(&mut child, &group, self.terminate_grace).await
            }
        };
        // Leftover group members would keep the pipes open.
        group.sweep();

        let stdout = collect_stream(stdout_task, &stdout_buffer, self.terminate_grace, "stdout").await;
        let stderr = collect_stream(stderr_task, &stderr_buffer, self.terminate_grace, "stderr").await;

        let mut stderr = stderr.into_text();
        if let Some(message) = wait_error {
            append_line(&mut stderr, &message);
        }

        let result = ProcessResult {
            exit_code: status.and_then(|status| status.code()),
            stdout: stdout.into_text(),
            stderr,
            timed_out,
            launch_error: None,
            elapsed: started_at.elapsed(),
        };
        tracing::debug!(
            program = %program,
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "process finished"
        );
        result
    }
}

const SPAWN_ATTEMPTS: u32 = 5;

fn command(invocation: &ProcessInvocation) -> Command {
    let mut cmd = Command::new(invocation.program());
    cmd.args(invocation.argv())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    start_new_session(&mut cmd);
    cmd
}

/// Spawns the command, retrying briefly while the executable is still open
/// for writing elsewhere (ETXTBSY).
async fn spawn(invocation: &ProcessInvocation) -> io::Result<Child> {
    let mut attempt = 1;
    loop {
        match command(invocation).spawn() {
            Err(err) if is_text_file_busy(&err) && attempt < SPAWN_ATTEMPTS => {
                tracing::debug!(program = %invocation.program(), attempt, "executable busy, retrying");
                tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt))).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(unix)]
fn is_text_file_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ETXTBSY)
}

#[cfg(not(unix))]
fn is_text_file_busy(_err: &io::Error) -> bool {
    false
}

fn launch_error_message(program: &str, err: &io::Error) -> String {
    if err.kind() == io::ErrorKind::NotFound {
        format!("{program}: executable not found")
    } else {
        format!("{program}: failed to launch: {err}")
    }
}

fn append_line(target: &mut String, line: &str) {
    if !target.is_empty() && !target.ends_with('\n') {
        target.push('\n');
    }
    target.push_str(line);
}

/// Waits up to `limit` for a reader to hit EOF. A reader that is still
/// blocked, or that failed, is given up on; the bytes it already stored are
/// returned marked as truncated.
async fn collect_stream(
    task: Option<JoinHandle<io::Result<()>>>,
    buffer: &OutputBuffer,
    limit: Duration,
    label: &str,
) -> CapturedStream {
    let Some(mut task) = task else {
        return buffer.take();
    };
    let complete = match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(Ok(()))) => true,
        Ok(Ok(Err(err))) => {
            tracing::warn!(stream = label, error = %err, "failed to read process output");
            false
        }
        Ok(Err(err)) => {
            tracing::warn!(stream = label, error = %err, "output reader task failed");
            false
        }
        Err(_) => {
            task.abort();
            tracing::warn!(stream = label, "output pipe still open after exit, keeping partial output");
            false
        }
    };
    let mut captured = buffer.take();
    if !complete {
        captured.mark_truncated();
    }
    captured
}

/// The session the child leads. Dropping it kills every member still alive,
/// which covers a `run` future cancelled before the child was reaped.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn terminate(&self) {
        self.signal(GroupSignal::Terminate);
    }

    fn kill(&self) {
        self.signal(GroupSignal::Kill);
    }

    /// Kills whatever is left and disarms the drop handler.
    fn sweep(&mut self) {
        self.kill();
        self.pgid = None;
    }

    #[cfg(unix)]
    fn signal(&self, signal: GroupSignal) {
        let Some(pgid) = self.pgid else {
            return;
        };
        let signo = match signal {
            GroupSignal::Terminate => libc::SIGTERM,
            GroupSignal::Kill => libc::SIGKILL,
        };
        // ESRCH just means the group is already empty.
        unsafe {
            libc::kill(-(pgid as libc::pid_t), signo);
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, _signal: GroupSignal) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            tracing::debug!(pgid = ?self.pgid, "run abandoned, killing process group");
            self.sweep();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn start_new_session(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| match libc::setsid() {
            -1 => Err(io::Error::last_os_error()),
            _ => Ok(()),
        });
    }
}

#[cfg(not(unix))]
fn start_new_session(_cmd: &mut Command) {}

/// SIGTERM to the group first; SIGKILL once the leader has had `grace` to
/// exit.
async fn stop_on_deadline(
    child: &mut Child,
    group: &ProcessGroup,
    grace: Duration,
) -> Option<ExitStatus> {
    group.terminate();
    if cfg!(not(unix)) {
        let _ = child.start_kill();
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => return status.ok(),
        Err(_) => tracing::warn!(pid = ?child.id(), "process ignored stop request, killing"),
    }
    group.kill();
    let _ = child.start_kill();
    tokio::time::timeout(grace, child.wait())
        .await
        .ok()
        .and_then(Result::ok)
}
