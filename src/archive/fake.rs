//! In-process stand-in for the package tools, used by the engine and queue tests.
//!
//! `xar` materializes the configured container members in its working
//! directory; `cpio` and `pax` materialize the configured archive members in
//! theirs. Every invocation is recorded in order.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use super::command::{CommandRunner, CommandSpec};
use crate::error::{ExtractionError, Result};

/// One recorded invocation, rendered as `program-name arg arg ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub line: String,
    pub working_dir: Option<String>,
    pub piped: bool,
}

struct Failure {
    program: String,
    needle: String,
    stderr: String,
}

#[derive(Default)]
pub struct FakeRunner {
    container_members: Vec<String>,
    archive_members: Vec<String>,
    failures: Vec<Failure>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `xar -xf` leaves in its scratch directory.
    pub fn with_container(mut self, members: &[&str]) -> Self {
        self.container_members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Files `cpio`/`pax` write into the destination.
    pub fn with_archive(mut self, members: &[&str]) -> Self {
        self.archive_members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Fail `program` whenever its rendered command line contains `needle`.
    pub fn failing(mut self, program: &str, needle: &str, stderr: &str) -> Self {
        self.failures.push(Failure {
            program: program.to_string(),
            needle: needle.to_string(),
            stderr: stderr.to_string(),
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, spec: &CommandSpec, piped: bool) {
        let mut line = spec.program_name();
        for arg in spec.args() {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        if let Some(input) = spec.input_file() {
            line.push_str(" < ");
            line.push_str(&input.display().to_string());
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                line,
                working_dir: spec.working_dir().map(|d| d.display().to_string()),
                piped,
            });
        }
    }

    fn check_failure(&self, spec: &CommandSpec) -> Result<()> {
        let rendered = format!(
            "{} {}",
            spec.display(),
            spec.input_file().map(|p| p.display().to_string()).unwrap_or_default()
        );
        for failure in &self.failures {
            if spec.program_name() == failure.program && rendered.contains(&failure.needle) {
                return Err(ExtractionError::command_failed(
                    spec.program(),
                    failure.stderr.as_bytes(),
                ));
            }
        }
        Ok(())
    }

    fn materialize(&self, spec: &CommandSpec) -> Result<()> {
        let members = match spec.program_name().as_str() {
            "xar" => &self.container_members,
            "cpio" | "pax" => &self.archive_members,
            _ => return Ok(()),
        };
        let Some(dir) = spec.working_dir() else {
            return Ok(());
        };
        for member in members {
            write_member(dir, member)?;
        }
        Ok(())
    }
}

fn write_member(dir: &Path, member: &str) -> Result<()> {
    let path = dir.join(member);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ExtractionError::io(format!("fake mkdir {}", parent.display()), e))?;
    }
    fs::write(&path, member.as_bytes())
        .map_err(|e| ExtractionError::io(format!("fake write {}", path.display()), e))
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &CommandSpec) -> Result<()> {
        self.record(command, false);
        self.check_failure(command)?;
        self.materialize(command)
    }

    fn run_piped(&self, producer: &CommandSpec, consumer: &CommandSpec) -> Result<()> {
        self.record(producer, true);
        self.record(consumer, true);
        self.check_failure(producer)?;
        self.check_failure(consumer)?;
        self.materialize(consumer)
    }
}
