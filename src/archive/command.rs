//! External program invocation.
//!
//! The extraction engine never spawns processes itself. It describes each
//! invocation as a [`CommandSpec`] and hands it to a [`CommandRunner`], which
//! offers two operations:
//!
//! - `run`: one program, optionally with a file redirected onto stdin.
//! - `run_piped`: two programs, the first one's stdout wired into the second
//!   one's stdin (`gzcat payload | cpio -idm`).
//!
//! [`SystemRunner`] is the real implementation on top of `std::process`.
//! Both operations block the calling thread until every spawned program has
//! exited, so callers on an async runtime should go through
//! `tokio::task::spawn_blocking`.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;

use tracing::{debug, warn};

use crate::error::{ExtractionError, Result};

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
    stdin_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            stdin_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Redirect a file onto the program's standard input.
    ///
    /// Ignored for the consumer side of [`CommandRunner::run_piped`], whose
    /// stdin is always the pipe.
    pub fn stdin_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(file.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn input_file(&self) -> Option<&Path> {
        self.stdin_file.as_deref()
    }

    /// Program file name, e.g. `cpio` for `/usr/bin/cpio`.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Render the invocation for log lines.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Capability to run external programs to completion.
pub trait CommandRunner: Send + Sync {
    /// Run one program and wait for it. Nonzero exit is `CommandFailed`.
    fn run(&self, command: &CommandSpec) -> Result<()>;

    /// Run `producer | consumer` and wait for both.
    ///
    /// Both programs are started before either is awaited. When both fail,
    /// the producer's failure is the one reported.
    fn run_piped(&self, producer: &CommandSpec, consumer: &CommandSpec) -> Result<()>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> Result<()> {
        debug!("Running: {}", command.display());

        let mut cmd = command.to_command();
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        if let Some(input) = &command.stdin_file {
            let file = File::open(input).map_err(|e| {
                ExtractionError::io(format!("Failed to open {}", input.display()), e)
            })?;
            cmd.stdin(file);
        } else {
            cmd.stdin(Stdio::null());
        }

        let output = cmd.output().map_err(|e| spawn_error(command, e))?;
        check_status(command, &output)
    }

    fn run_piped(&self, producer: &CommandSpec, consumer: &CommandSpec) -> Result<()> {
        debug!("Running: {} | {}", producer.display(), consumer.display());

        let mut first = producer
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(producer, e))?;

        let pipe = match first.stdout.take() {
            Some(pipe) => pipe,
            None => {
                reap(&mut first);
                return Err(ExtractionError::io(
                    format!("No output stream for {}", producer.program().display()),
                    io::Error::from(io::ErrorKind::BrokenPipe),
                ));
            }
        };

        let second = consumer
            .to_command()
            .stdin(pipe)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let second = match second {
            Ok(child) => child,
            Err(e) => {
                reap(&mut first);
                return Err(spawn_error(consumer, e));
            }
        };

        // Drain both children at once; waiting on one while the other fills
        // its stderr pipe would deadlock the pair.
        let (first_out, second_out) = thread::scope(|scope| {
            let consumer_wait = scope.spawn(move || second.wait_with_output());
            let first_out = first.wait_with_output();
            let second_out = consumer_wait
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("consumer wait panicked")));
            (first_out, second_out)
        });

        let first_out = first_out.map_err(|e| wait_error(producer, e))?;
        let second_out = second_out.map_err(|e| wait_error(consumer, e))?;

        if !first_out.status.success() && !second_out.status.success() {
            warn!(
                "{} also failed: {}",
                consumer.program().display(),
                String::from_utf8_lossy(&second_out.stderr).trim()
            );
        }

        check_status(producer, &first_out)?;
        check_status(consumer, &second_out)
    }
}

fn check_status(command: &CommandSpec, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    debug!(
        "{} exited with {:?}",
        command.program().display(),
        output.status.code()
    );
    Err(ExtractionError::command_failed(command.program(), &output.stderr))
}

fn spawn_error(command: &CommandSpec, source: io::Error) -> ExtractionError {
    ExtractionError::io(
        format!("Failed to run {}", command.program().display()),
        source,
    )
}

fn wait_error(command: &CommandSpec, source: io::Error) -> ExtractionError {
    ExtractionError::io(
        format!("Failed to wait for {}", command.program().display()),
        source,
    )
}

/// Kill and reap a producer whose consumer never started.
fn reap(child: &mut std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}
