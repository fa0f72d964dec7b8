//! Single-child process supervision and validation.
//!
//! [`run_and_validate`] launches one command, waits for it with a bounded
//! timeout, hands the captured output to a parser and then to a validator,
//! and folds every failure along the way into a [`ValidationOutcome`].

use crate::models::{ParsedOutput, ValidationOutcome};
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long to keep reading pipes once the child is gone.
const PIPE_LINGER: Duration = Duration::from_millis(500);

/// How a command is launched and supervised.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: Vec<String>,
    pub timeout: Duration,
    /// Pause before launching.
    pub delay: Duration,
    /// When false, reaching the timeout is the normal way the run ends.
    pub timeout_as_error: bool,
    /// Time allowed to exit after the interrupt on the benign timeout path.
    pub grace: Duration,
}

impl Invocation {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self {
            command,
            timeout,
            delay: Duration::ZERO,
            timeout_as_error: true,
            grace: Duration::from_secs(2),
        }
    }
}

/// Output captured from a finished child.
#[derive(Debug, Default, Clone)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

/// Owns the child so it is killed and reaped on every exit path.
///
/// On unix the child leads its own process group and signals go to the
/// whole group, so grandchildren holding the pipes are stopped with it.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Poll until the child exits or `limit` elapses.
    fn wait_for(&mut self, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: libc::c_int) -> std::io::Result<()> {
        let pid = libc::pid_t::try_from(self.child.id())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        // SAFETY: -pid addresses the process group the child was spawned into.
        if unsafe { libc::kill(-pid, signal) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Kill the child's process group, then reap the child if still needed.
    fn kill(&mut self) {
        #[cfg(unix)]
        {
            if let Err(e) = self.signal_group(libc::SIGKILL) {
                debug!("group kill failed: {}", e);
            }
        }
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            debug!("kill failed: {}", e);
        }
        if let Err(e) = self.child.wait() {
            debug!("reap failed: {}", e);
        }
        self.reaped = true;
    }

    /// Ask the child to stop so it can flush its output.
    #[cfg(unix)]
    fn interrupt(&mut self) {
        if let Err(e) = self.signal_group(libc::SIGINT) {
            debug!("SIGINT delivery failed ({}), killing instead", e);
            self.kill();
        }
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) {
        self.kill();
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
        }
    }
}

/// Background reader for one pipe; the bytes read so far stay available.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let Some(mut p) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match p.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("pipe read failed: {}", e);
                        break;
                    }
                }
            }
        });
        Self { buf, handle }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&lock(&self.buf)).into_owned()
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Readers {
    stdout: Drain,
    stderr: Drain,
}

impl Readers {
    fn new(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        Self {
            stdout: Drain::spawn(stdout),
            stderr: Drain::spawn(stderr),
        }
    }

    /// Wait up to `limit` for both pipes to close and return what was read.
    ///
    /// Readers still blocked after `limit` (a descendant outside the process
    /// group keeps a pipe open) are detached and their partial output kept.
    fn collect(self, limit: Duration) -> Captured {
        let deadline = Instant::now() + limit;
        while !(self.stdout.handle.is_finished() && self.stderr.handle.is_finished()) {
            if Instant::now() >= deadline {
                warn!("Output pipes still open after {:?}, keeping partial output", limit);
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        Captured {
            stdout: self.stdout.text(),
            stderr: self.stderr.text(),
        }
    }
}

/// Launch `inv.command` and collect its output.
///
/// Returns the captured output when the run ended acceptably, or the
/// outcome that ends the invocation early. Returns within `timeout` plus
/// `grace` and a short pipe linger, whatever the child's descendants do.
pub fn run_command(inv: &Invocation) -> Result<Captured, ValidationOutcome> {
    let Some((program, args)) = inv.command.split_first() else {
        error!("Empty command");
        return Err(ValidationOutcome::LaunchFailed);
    };
    info!("Running: {}", inv.command.join(" "));
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to launch {}: {}", program, e);
            return Err(ValidationOutcome::LaunchFailed);
        }
    };
    let readers = Readers::new(child.stdout.take(), child.stderr.take());
    let mut guard = ChildGuard {
        child,
        reaped: false,
    };
    let deadline = Instant::now() + inv.timeout;

    let finished = match guard.wait_for(inv.timeout) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to wait for {}: {}", program, e);
            guard.kill();
            readers.collect(PIPE_LINGER);
            return Err(ValidationOutcome::CommandFail);
        }
    };

    match finished {
        Some(status) => {
            let linger = deadline.saturating_duration_since(Instant::now());
            let captured = readers.collect(linger.max(PIPE_LINGER));
            if !status.success() {
                error!("Executable exited with {}", status);
                debug!("stdout:\n{}\nstderr:\n{}", captured.stdout, captured.stderr);
                return Err(ValidationOutcome::CommandFail);
            }
            Ok(captured)
        }
        None if inv.timeout_as_error => {
            error!("Timeout of {:?} reached", inv.timeout);
            guard.kill();
            readers.collect(PIPE_LINGER);
            Err(ValidationOutcome::Timeout)
        }
        None => {
            debug!("Timeout of {:?} reached, interrupting", inv.timeout);
            guard.interrupt();
            match guard.wait_for(inv.grace) {
                Ok(Some(status)) => debug!("Interrupted process exited with {}", status),
                Ok(None) => {
                    warn!("Process ignored the interrupt for {:?}, killing it", inv.grace);
                    guard.kill();
                    readers.collect(PIPE_LINGER);
                    return Err(ValidationOutcome::HardTimeout);
                }
                Err(e) => {
                    error!("Failed to wait for {}: {}", program, e);
                    guard.kill();
                    readers.collect(PIPE_LINGER);
                    return Err(ValidationOutcome::CommandFail);
                }
            }
            let captured = readers.collect(PIPE_LINGER);
            // descendants that outlived the interrupted leader
            guard.kill();
            Ok(captured)
        }
    }
}

/// Run `inv`, then parse and validate its output.
pub fn run_and_validate<P, V>(inv: &Invocation, parse: P, validate: V) -> ValidationOutcome
where
    P: FnOnce(&str, &str) -> ParsedOutput,
    V: FnOnce(&ParsedOutput) -> ValidationOutcome,
{
    if !inv.delay.is_zero() {
        debug!("Waiting {:?} before launch", inv.delay);
        thread::sleep(inv.delay);
    }
    let captured = match run_command(inv) {
        Ok(c) => c,
        Err(outcome) => return outcome,
    };
    let parsed = parse(&captured.stdout, &captured.stderr);
    debug!(
        "Parsed {} sample(s), {} other line(s)",
        parsed.matched.len(),
        parsed.unmatched.len()
    );
    validate(&parsed)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::listener::MessageTemplate;
    use crate::validation::{validate_listener, Expectations};

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn samples_script(values: &[u32]) -> String {
        values
            .iter()
            .map(|v| {
                format!(
                    "echo '[INFO] [1664186953.395023916] [listener]: I heard: [Hello World: {}]' >&2",
                    v
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn run(inv: &Invocation, expect: Expectations) -> ValidationOutcome {
        let template = MessageTemplate::default();
        run_and_validate(
            inv,
            |out, err| template.parse_output(out, err),
            |p| validate_listener(p, &expect),
        )
    }

    #[test]
    fn test_completed_run_is_validated() {
        let inv = Invocation::new(sh(&samples_script(&[1, 2, 3])), Duration::from_secs(5));
        let expect = Expectations {
            samples: Some(3),
            max_duplicates: Some(0),
        };
        assert_eq!(run(&inv, expect), ValidationOutcome::Success);

        let inv = Invocation::new(sh(&samples_script(&[1, 2])), Duration::from_secs(5));
        assert_eq!(run(&inv, expect), ValidationOutcome::NotValidMessages);
    }

    #[test]
    fn test_launch_failures() {
        let inv = Invocation::new(
            vec!["/definitely/not/a/listener".into()],
            Duration::from_secs(1),
        );
        assert_eq!(run(&inv, Expectations::default()), ValidationOutcome::LaunchFailed);
        let inv = Invocation::new(Vec::new(), Duration::from_secs(1));
        assert_eq!(run(&inv, Expectations::default()), ValidationOutcome::LaunchFailed);
    }

    #[test]
    fn test_non_zero_exit_is_command_fail() {
        let inv = Invocation::new(sh("exit 3"), Duration::from_secs(5));
        assert_eq!(run(&inv, Expectations::default()), ValidationOutcome::CommandFail);
    }

    #[test]
    fn test_timeout_as_error() {
        let inv = Invocation::new(sh("exec sleep 10"), Duration::from_millis(200));
        let start = Instant::now();
        assert_eq!(run(&inv, Expectations::default()), ValidationOutcome::Timeout);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_benign_timeout_validates_captured_output() {
        let script = format!("{}; exec sleep 10", samples_script(&[1, 2, 3]));
        let mut inv = Invocation::new(sh(&script), Duration::from_millis(500));
        inv.timeout_as_error = false;
        let expect = Expectations {
            samples: Some(3),
            max_duplicates: Some(0),
        };
        assert_eq!(run(&inv, expect), ValidationOutcome::Success);
    }

    #[test]
    fn test_ignored_interrupt_is_hard_timeout() {
        let mut inv = Invocation::new(
            sh("trap '' INT; while true; do sleep 0.05; done"),
            Duration::from_millis(200),
        );
        inv.timeout_as_error = false;
        inv.grace = Duration::from_millis(300);
        assert_eq!(run(&inv, Expectations::default()), ValidationOutcome::HardTimeout);
    }

    #[test]
    fn test_timeout_does_not_wait_for_grandchildren() {
        let inv = Invocation::new(sh("echo hi; sleep 8; true"), Duration::from_millis(200));
        let start = Instant::now();
        assert_eq!(run(&inv, Expectations::default()), ValidationOutcome::Timeout);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_interrupt_reaches_grandchildren() {
        let script = format!("{}; sleep 8; true", samples_script(&[1, 2]));
        let mut inv = Invocation::new(sh(&script), Duration::from_millis(300));
        inv.timeout_as_error = false;
        let expect = Expectations {
            samples: Some(2),
            max_duplicates: Some(0),
        };
        let start = Instant::now();
        assert_eq!(run(&inv, expect), ValidationOutcome::Success);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_escaped_descendant_does_not_block_collection() {
        // the background job leaves the group and keeps stdout open
        let script = "setsid sleep 8 & echo done";
        let mut inv = Invocation::new(sh(script), Duration::from_millis(300));
        inv.timeout_as_error = false;
        let start = Instant::now();
        let captured = run_command(&inv).unwrap();
        assert!(captured.stdout.contains("done"));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_delay_is_applied() {
        let mut inv = Invocation::new(sh("true"), Duration::from_secs(5));
        inv.delay = Duration::from_millis(150);
        let start = Instant::now();
        assert_eq!(run(&inv, Expectations::default()), ValidationOutcome::Success);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
