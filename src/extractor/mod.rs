//! Package extraction engine.
//!
//! Extracts one package per call, in three layouts:
//! 1. Metapackage: every member package under `Contents/Packages` goes into
//!    its own subdirectory of the destination
//! 2. Modern: `xar -xf` into a scratch directory, then each payload through
//!    `cpio -idm` (behind `gzcat` when compressed)
//! 3. Legacy: each `.pax`/`.pax.gz` archive of the bundle through `pax -r`
//!
//! A job moves through Detecting → Allocating → Extracting → Done, or to
//! Failed from any step. Nothing is retried and files already written are
//! left in place.

pub mod progress;

pub use progress::{ExtractEvent, JobState, ProgressCallback, ProgressReporter, ProgressSpan};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{CommandRunner, ToolPaths};
use crate::destination::DirectoryAllocator;
use crate::error::{ErrorKind, ExtractionError, Result};
use crate::package::{
    find_member_packages, find_pax_files, find_payload_files, PackageLayout, PackageRef,
    PackageStyle,
};

/// Outcome of one extraction job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub package_name: String,
    pub success: bool,
    pub extraction_path: Option<PathBuf>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub finished_at: DateTime<Local>,
}

impl ExtractionResult {
    pub fn succeeded(package_name: impl Into<String>, extraction_path: PathBuf) -> Self {
        Self {
            package_name: package_name.into(),
            success: true,
            extraction_path: Some(extraction_path),
            error: None,
            error_kind: None,
            finished_at: Local::now(),
        }
    }

    pub fn failed(package_name: impl Into<String>, error: &ExtractionError) -> Self {
        Self {
            package_name: package_name.into(),
            success: false,
            extraction_path: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            finished_at: Local::now(),
        }
    }

    /// One-line description for result lists.
    pub fn summary(&self) -> String {
        match (&self.extraction_path, &self.error) {
            (Some(path), _) if self.success => format!("Extracted to: {}", path.display()),
            (_, Some(error)) => error.clone(),
            _ => "Unknown error".to_string(),
        }
    }
}

pub struct Extractor {
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
    allocator: DirectoryAllocator,
}

impl Extractor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        tools: ToolPaths,
        allocator: DirectoryAllocator,
    ) -> Self {
        Self {
            runner,
            tools,
            allocator,
        }
    }

    /// Run one full job. Failures are folded into the returned result.
    pub fn extract_package(&self, path: &Path, progress: &ProgressReporter) -> ExtractionResult {
        let package = PackageRef::new(path);
        let name = package.display_name();

        info!("Extracting {}", path.display());
        progress.emit(ExtractEvent::Started {
            package: name.clone(),
        });
        progress.operation(format!("Preparing to extract {}...", name));

        let result = match self.try_extract(&package, progress) {
            Ok(dest) => {
                info!("Extracted {} to {}", name, dest.display());
                set_state(progress, &name, JobState::Done);
                ExtractionResult::succeeded(name, dest)
            }
            Err(e) => {
                warn!("Failed to extract {}: {}", name, e);
                set_state(progress, &name, JobState::Failed);
                ExtractionResult::failed(name, &e)
            }
        };

        progress.advance(1.0);
        progress.emit(ExtractEvent::Finished {
            result: result.clone(),
        });
        result
    }

    /// Detect, allocate a destination, and extract. Returns the destination.
    pub fn try_extract(
        &self,
        package: &PackageRef,
        progress: &ProgressReporter,
    ) -> Result<PathBuf> {
        let name = package.display_name();

        set_state(progress, &name, JobState::Detecting);
        let package = &package.absolute()?;
        package.ensure_readable()?;
        let layout = package.layout()?;
        debug!("{} is a {}", name, layout.describe());

        set_state(progress, &name, JobState::Allocating);
        let dest = self.allocator.allocate(package.path())?;
        let dest_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        progress.operation(format!("Extracting to {}...", dest_name));

        set_state(progress, &name, JobState::Extracting);
        self.extract_layout(package, layout, &dest, &progress.span())?;
        Ok(dest)
    }

    /// Extract `package` into an existing directory `dest`.
    ///
    /// Shared by top-level jobs and metapackage members.
    pub fn extract_into(
        &self,
        package: &PackageRef,
        dest: &Path,
        span: &ProgressSpan<'_>,
    ) -> Result<()> {
        let layout = package.layout()?;
        self.extract_layout(package, layout, dest, span)
    }

    fn extract_layout(
        &self,
        package: &PackageRef,
        layout: PackageLayout,
        dest: &Path,
        span: &ProgressSpan<'_>,
    ) -> Result<()> {
        match layout {
            PackageLayout::Metapackage => self.extract_metapackage(package.path(), dest, span),
            PackageLayout::Package(PackageStyle::Modern) => {
                self.extract_modern(package.path(), dest, span)
            }
            PackageLayout::Package(PackageStyle::Legacy) => {
                self.extract_legacy(package.path(), dest, span)
            }
        }
    }

    fn extract_metapackage(
        &self,
        metapackage: &Path,
        dest: &Path,
        span: &ProgressSpan<'_>,
    ) -> Result<()> {
        span.set(0.1);
        span.operation("Processing metapackage...");

        let members = find_member_packages(metapackage)?;
        let count = members.len();

        for (index, member_path) in members.into_iter().enumerate() {
            let member = PackageRef::new(member_path);
            span.operation(format!("Extracting {}...", member.display_name()));

            let member_dest = dest.join(member.stem());
            fs::create_dir_all(&member_dest).map_err(|e| {
                ExtractionError::io(format!("Failed to create {}", member_dest.display()), e)
            })?;

            let member_span = span.slice(0.1, 0.9, index, count);
            self.extract_into(&member, &member_dest, &member_span)?;
        }

        span.set(0.9);
        Ok(())
    }

    fn extract_modern(&self, package: &Path, dest: &Path, span: &ProgressSpan<'_>) -> Result<()> {
        span.set(0.2);
        span.operation("Extracting package metadata...");

        let scratch = tempfile::Builder::new()
            .prefix("unpkg-")
            .tempdir()
            .map_err(|e| ExtractionError::io("Failed to create temporary directory", e))?;

        let outcome = self.extract_container(package, scratch.path(), dest, span);

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!("Failed to remove {}: {}", scratch_path.display(), e);
        }
        outcome
    }

    fn extract_container(
        &self,
        package: &Path,
        scratch: &Path,
        dest: &Path,
        span: &ProgressSpan<'_>,
    ) -> Result<()> {
        self.runner.run(&self.tools.unpack_container(package, scratch))?;

        span.set(0.4);
        span.operation("Processing package contents...");

        let payloads = find_payload_files(scratch)?;
        debug!("Found {} payload(s) in {}", payloads.len(), package.display());
        let count = payloads.len();

        for (index, payload) in payloads.iter().enumerate() {
            span.set(0.4 + 0.5 * index as f64 / count as f64);
            span.operation(format!("Extracting {}...", file_name(payload)));

            if is_gzip_payload(payload) {
                self.runner
                    .run_piped(&self.tools.decompress(payload), &self.tools.cpio_from_pipe(dest))?;
            } else {
                self.runner.run(&self.tools.cpio_from_file(payload, dest))?;
            }
        }

        span.set(0.9);
        Ok(())
    }

    fn extract_legacy(&self, bundle: &Path, dest: &Path, span: &ProgressSpan<'_>) -> Result<()> {
        span.set(0.3);
        span.operation("Extracting old-style package...");

        let archives = find_pax_files(bundle)?;
        let count = archives.len();

        for (index, archive) in archives.iter().enumerate() {
            span.set(0.3 + 0.6 * index as f64 / count as f64);
            span.operation(format!("Extracting {}...", file_name(archive)));

            if file_name(archive).ends_with(".gz") {
                self.runner
                    .run_piped(&self.tools.decompress(archive), &self.tools.pax_from_pipe(dest))?;
            } else {
                self.runner.run(&self.tools.pax_from_file(archive, dest))?;
            }
        }

        span.set(0.9);
        Ok(())
    }
}

fn set_state(progress: &ProgressReporter, package: &str, state: JobState) {
    debug!("{}: {}", package, state);
    progress.emit(ExtractEvent::State {
        package: package.to_string(),
        state,
    });
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn is_gzip_payload(path: &Path) -> bool {
    let name = file_name(path);
    name.ends_with(".gz") || name.ends_with(".gzip")
}
