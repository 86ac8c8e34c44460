use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{Action, Settings};

/// Wall-clock limit for one `mark` invocation.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected after a timed-out child is killed.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Why a single publish attempt failed. Never retried.
#[derive(Debug, Error)]
pub enum PublishFailure {
    #[error("publisher exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
    #[error("Exec timeout after {timeout:?}: {stderr}")]
    Timeout { timeout: Duration, stderr: String },
    #[error("unable to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Hands a prepared Markdown file to the wiki.
pub trait Publisher {
    fn publish(&self, path: &Path) -> Result<(), PublishFailure>;
}

impl<T> Publisher for &T
where
    T: Publisher + ?Sized,
{
    fn publish(&self, path: &Path) -> Result<(), PublishFailure> {
        (**self).publish(path)
    }
}

/// Runs the `mark` converter as a blocking subprocess, one file at a time.
#[derive(Clone, Debug)]
pub struct MarkPublisher {
    program: String,
    flags: Vec<String>,
    action: Action,
    timeout: Duration,
}

impl MarkPublisher {
    /// Credentials and URL are only passed when set.
    pub fn from_settings(settings: &Settings) -> Self {
        let inputs = &settings.inputs;
        let mut flags = Vec::new();
        for (flag, value) in [
            ("-p", &inputs.confluence_password),
            ("-u", &inputs.confluence_username),
            ("-b", &inputs.confluence_base_url),
        ] {
            if !value.is_empty() {
                flags.push(flag.to_string());
                flags.push(value.clone());
            }
        }
        if !inputs.mermaid_provider.is_empty() {
            flags.push("--mermaid-provider".into());
            flags.push(inputs.mermaid_provider.clone());
        }
        if let Some(flag) = inputs.action.publisher_flag() {
            flags.push(flag.into());
        }
        if let Some(level) = settings.mark_log_level() {
            flags.push("--log-level".into());
            flags.push(level);
        }

        Self {
            program: inputs.mark_binary.clone(),
            flags,
            action: inputs.action,
            timeout: PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list for `path`, ending with `-f <path>`.
    pub fn args_for(&self, path: &Path) -> Vec<String> {
        let mut args = self.flags.clone();
        args.push("-f".into());
        args.push(path.to_string_lossy().into_owned());
        args
    }

    fn spawn(&self, path: &Path) -> Result<Child, PublishFailure> {
        let working_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Command::new(&self.program)
            .args(self.args_for(path))
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PublishFailure::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

impl Publisher for MarkPublisher {
    fn publish(&self, path: &Path) -> Result<(), PublishFailure> {
        // The working directory changes, so the file argument must not be relative.
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let mut child = self.spawn(&path)?;

        // Drain both pipes while polling.
        let stdout = PipeDrain::spawn(child.stdout.take());
        let stderr = PipeDrain::spawn(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = wait_until(&mut child, deadline);
        // Helpers started by the child may still hold the pipes open.
        let collect_by = match status {
            Ok(Some(_)) => deadline,
            _ => Instant::now() + DRAIN_GRACE,
        };
        let stdout = stdout.collect(collect_by);
        let stderr = stderr.collect(collect_by);

        match status {
            Ok(Some(status)) if status.success() => {
                if self.action == Action::Verify {
                    tracing::info!(path = %path.display(), "Verify: mark compiled html: {stdout}");
                }
                Ok(())
            }
            Ok(Some(status)) => Err(PublishFailure::Exit { status, stderr }),
            Ok(None) => {
                tracing::error!(path = %path.display(), "Exec timeout: {stderr}");
                Err(PublishFailure::Timeout {
                    timeout: self.timeout,
                    stderr,
                })
            }
            Err(source) => Err(PublishFailure::Spawn {
                program: self.program.clone(),
                source,
            }),
        }
    }
}

/// Reads a child pipe on its own thread into a shared buffer.
struct PipeDrain {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: thread::JoinHandle<()>,
}

impl PipeDrain {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(read) => sink.lock().extend_from_slice(&chunk[..read]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
        Self { buffer, handle }
    }

    /// Waits for end of stream until `limit`, then returns whatever was read.
    /// The reader thread is left detached when the stream is still open.
    fn collect(self, limit: Instant) -> String {
        while !self.handle.is_finished() && Instant::now() < limit {
            thread::sleep(POLL_INTERVAL);
        }
        if self.handle.is_finished() {
            let _ = self.handle.join();
        }
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

/// `Ok(None)` means the deadline passed and the child was killed.
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
