//! Extraction jobs
//!
//! A job is a running extraction seen from the outside: a data channel
//! carrying the capture bytes, a diagnostic channel carrying log text, a way
//! to poll for completion and a way to kill it. The server runs each request
//! as a child process of its own binary (`spoolslice extract ... --output -`)
//! so the blocking capture reads stay off the async runtime.

use log::debug;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

pub type Channel = Box<dyn AsyncRead + Unpin + Send>;

pub trait ExtractionJob: Send {
    /// Hands out the data and diagnostic channels. Returns `None` once they
    /// have been taken.
    fn take_channels(&mut self) -> Option<(Channel, Channel)>;

    /// Non-blocking completion check: `Some(status)` once the job has ended.
    fn try_status(&mut self) -> io::Result<Option<i32>>;

    /// Stops the job without waiting for it.
    fn terminate(&mut self) -> io::Result<()>;
}

/// An extraction running as a child process.
pub struct ChildJob {
    child: Child,
}

impl ChildJob {
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

impl ExtractionJob for ChildJob {
    fn take_channels(&mut self) -> Option<(Channel, Channel)> {
        let stdout = self.child.stdout.take()?;
        let stderr = self.child.stderr.take()?;
        Some((Box::new(stdout), Box::new(stderr)))
    }

    fn try_status(&mut self) -> io::Result<Option<i32>> {
        // a child killed by a signal has no exit code
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(-1)))
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }
}

/// Command line for an `extract` child writing to standard output.
#[derive(Debug, Clone)]
pub struct ExtractCommand {
    program: PathBuf,
    directory: PathBuf,
    prefix: String,
    start: Option<String>,
    end: Option<String>,
    tz_offset: Option<String>,
    event: Option<String>,
}

impl ExtractCommand {
    pub fn new(program: impl Into<PathBuf>, directory: &Path, prefix: &str) -> Self {
        Self {
            program: program.into(),
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            start: None,
            end: None,
            tz_offset: None,
            event: None,
        }
    }

    /// Uses the running executable as the child program.
    pub fn current_exe(directory: &Path, prefix: &str) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, directory, prefix))
    }

    pub fn start(mut self, start: Option<String>) -> Self {
        self.start = start;
        self
    }

    pub fn end(mut self, end: Option<String>) -> Self {
        self.end = end;
        self
    }

    pub fn tz_offset(mut self, tz_offset: Option<String>) -> Self {
        self.tz_offset = tz_offset;
        self
    }

    pub fn event(mut self, event: Option<String>) -> Self {
        self.event = event;
        self
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "extract".into(),
            "--directory".into(),
            self.directory.clone().into_os_string(),
            "--prefix".into(),
            self.prefix.clone().into(),
            "--output".into(),
            "-".into(),
            "--no-empty-stream".into(),
        ];
        for (flag, value) in [
            ("--start", &self.start),
            ("--end", &self.end),
            ("--tz-offset", &self.tz_offset),
        ] {
            // joined so values such as "-0600" aren't taken for flags
            if let Some(value) = value {
                args.push(format!("{}={}", flag, value).into());
            }
        }
        if let Some(event) = self.event.as_ref().filter(|e| !e.trim().is_empty()) {
            args.push("--".into());
            args.push(event.into());
        }
        args
    }

    pub fn spawn(&self) -> io::Result<ChildJob> {
        let child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        debug!(
            "Spawned {} {:?} as pid {:?}",
            self.program.display(),
            self.args(),
            child.id()
        );
        Ok(ChildJob::new(child))
    }
}
