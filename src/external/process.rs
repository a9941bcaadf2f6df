//! External process invocation
//!
//! Commands are run from an explicit argument list (never through a shell),
//! with stdout/stderr captured, an optional timeout and a bounded number of
//! retries.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} timed out after {:?}", after)]
    TimedOut { program: String, after: Duration },

    #[error("Failed while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Failures worth another attempt; a missing program is not
    fn is_retryable(&self) -> bool {
        !matches!(self, ProcessError::Spawn { .. })
    }
}

/// Captured output of a successful run
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A program with an argument template
///
/// Arguments may contain `{name}` placeholders which are substituted at run
/// time, e.g. `["{input}", "-o", "{output}"]`.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    retries: u32,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            retries: 0,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Substitutes placeholders into the argument template
    pub fn resolve_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{}}}", name), value)
                })
            })
            .collect()
    }

    /// Runs the command, retrying failed attempts up to the retry limit
    pub fn run(&self, vars: &[(&str, &str)]) -> Result<CapturedOutput, ProcessError> {
        let args = self.resolve_args(vars);
        let mut attempt = 0;
        loop {
            match self.run_once(&args) {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    log::warn!("{} (attempt {} of {})", e, attempt, self.retries + 1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs with `{input}` and `{output}` bound to paths
    pub fn run_on(&self, input: &Path, output: &Path) -> Result<CapturedOutput, ProcessError> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.run(&[("input", &*input), ("output", &*output)])
    }

    fn run_once(&self, args: &[String]) -> Result<CapturedOutput, ProcessError> {
        log::debug!("Running {} {}", self.program, args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a timeout also reaches children of wrapper scripts
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // On error the drain threads are left detached: a surviving
        // grandchild may still hold the pipes open
        let status = self.wait(&mut child)?;
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if status.success() {
            Ok(CapturedOutput { stdout, stderr })
        } else {
            Err(ProcessError::Failed {
                program: self.program.clone(),
                code: status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ProcessError> {
        let wait_error = |source: std::io::Error| ProcessError::Wait {
            program: self.program.clone(),
            source,
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(wait_error);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(wait_error)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                kill_tree(child);
                let _ = child.wait();
                return Err(ProcessError::TimedOut {
                    program: self.program.clone(),
                    after: timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Kills a child together with everything it started
fn kill_tree(child: &mut Child) {
    let pid = child.id().to_string();

    #[cfg(unix)]
    let killed = Command::new("kill")
        .args(["-KILL", "--", &format!("-{}", pid)])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    #[cfg(windows)]
    let killed = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    #[cfg(not(any(unix, windows)))]
    let killed: std::io::Result<ExitStatus> = Err(std::io::ErrorKind::Unsupported.into());

    if !killed.map(|s| s.success()).unwrap_or(false) {
        log::debug!("Killing process tree {} failed, killing the child only", pid);
        // The child may already have exited
        let _ = child.kill();
    }
}

/// Reads a pipe to the end on a background thread so the child never blocks
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}
