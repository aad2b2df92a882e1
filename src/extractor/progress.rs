//! Progress reporting for extraction jobs.
//!
//! The engine reports through a [`ProgressReporter`], which forwards typed
//! [`ExtractEvent`]s to an optional callback. Fractions only move forward:
//! nested work (a member package inside a metapackage) reports through a
//! [`ProgressSpan`] that maps its own 0..1 into a slice of the parent range.

use std::fmt;
use std::sync::{Arc, Mutex};

use super::ExtractionResult;

/// Progress callback for reporting extraction status
pub type ProgressCallback = Arc<dyn Fn(ExtractEvent) + Send + Sync>;

/// Lifecycle of one extraction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Detecting,
    Allocating,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Detecting => "detecting",
            JobState::Allocating => "allocating",
            JobState::Extracting => "extracting",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum ExtractEvent {
    /// A job was picked up.
    Started { package: String },
    /// The job moved to a new state.
    State { package: String, state: JobState },
    /// Free-text description of the current step.
    Operation { message: String },
    /// Overall job fraction in `[0, 1]`, never decreasing within a job.
    Progress { fraction: f64 },
    /// The job finished, successfully or not.
    Finished { result: ExtractionResult },
}

pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: Mutex<f64>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            last: Mutex::new(0.0),
        }
    }

    /// Reporter that drops every event.
    pub fn silent() -> Self {
        Self {
            callback: None,
            last: Mutex::new(0.0),
        }
    }

    pub fn emit(&self, event: ExtractEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    pub fn operation(&self, message: impl Into<String>) {
        self.emit(ExtractEvent::Operation {
            message: message.into(),
        });
    }

    /// Move the job fraction to `fraction`, ignoring attempts to go back.
    pub fn advance(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        {
            let Ok(mut last) = self.last.lock() else {
                return;
            };
            if fraction <= *last {
                return;
            }
            *last = fraction;
        }
        self.emit(ExtractEvent::Progress { fraction });
    }

    pub fn current(&self) -> f64 {
        self.last.lock().map(|last| *last).unwrap_or(0.0)
    }

    /// Span covering the whole job.
    pub fn span(&self) -> ProgressSpan<'_> {
        ProgressSpan {
            reporter: self,
            start: 0.0,
            end: 1.0,
        }
    }
}

/// A slice `[start, end]` of the job's progress range.
#[derive(Clone, Copy)]
pub struct ProgressSpan<'a> {
    reporter: &'a ProgressReporter,
    start: f64,
    end: f64,
}

impl<'a> ProgressSpan<'a> {
    /// Report `local` (0..1 within this span).
    pub fn set(&self, local: f64) {
        self.reporter.advance(self.map(local));
    }

    /// Sub-span covering `from..to` of this span.
    pub fn sub(&self, from: f64, to: f64) -> ProgressSpan<'a> {
        ProgressSpan {
            reporter: self.reporter,
            start: self.map(from),
            end: self.map(to),
        }
    }

    /// The `index`-th of `count` equal slices of `from..to`.
    pub fn slice(&self, from: f64, to: f64, index: usize, count: usize) -> ProgressSpan<'a> {
        let count = count.max(1) as f64;
        let width = (to - from) / count;
        let start = from + width * index as f64;
        self.sub(start, start + width)
    }

    pub fn operation(&self, message: impl Into<String>) {
        self.reporter.operation(message);
    }

    fn map(&self, local: f64) -> f64 {
        self.start + (self.end - self.start) * local.clamp(0.0, 1.0)
    }
}
