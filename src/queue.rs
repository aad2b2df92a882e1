//! Sequential extraction queue.
//!
//! Paths added with [`QueueCoordinator::add_files_to_queue`] are processed
//! strictly one at a time, in arrival order, by a single drain task. Adding
//! files while a drain is running only extends the pending list. A failed
//! job is recorded as a failed result and the drain moves on.
//!
//! The observable state (current operation, progress, result log) is
//! updated from engine events and can be polled through
//! [`QueueCoordinator::status`] and [`QueueCoordinator::results`], or followed
//! live with a [`ProgressCallback`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::ExtractionError;
use crate::extractor::{
    ExtractEvent, ExtractionResult, Extractor, ProgressCallback, ProgressReporter,
};

/// Snapshot of the queue for progress display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueStatus {
    pub is_extracting: bool,
    pub progress: f64,
    pub current_operation: String,
    pub pending: usize,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PathBuf>,
    draining: bool,
    is_extracting: bool,
    progress: f64,
    current_operation: String,
    results: Vec<ExtractionResult>,
}

struct Shared {
    extractor: Arc<Extractor>,
    state: Mutex<QueueState>,
    idle: watch::Sender<bool>,
    callback: Option<ProgressCallback>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observe(&self, event: &ExtractEvent) {
        let mut state = self.lock();
        match event {
            ExtractEvent::Operation { message } => state.current_operation = message.clone(),
            ExtractEvent::Progress { fraction } => state.progress = *fraction,
            _ => {}
        }
    }
}

/// Serializes extraction of queued packages.
#[derive(Clone)]
pub struct QueueCoordinator {
    shared: Arc<Shared>,
}

impl QueueCoordinator {
    pub fn new(extractor: Extractor) -> Self {
        Self::build(extractor, None)
    }

    /// Queue that also forwards every engine event to `callback`.
    pub fn with_callback(extractor: Extractor, callback: ProgressCallback) -> Self {
        Self::build(extractor, Some(callback))
    }

    fn build(extractor: Extractor, callback: Option<ProgressCallback>) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                extractor: Arc::new(extractor),
                state: Mutex::new(QueueState::default()),
                idle,
                callback,
            }),
        }
    }

    /// Append paths that are not already pending and start draining.
    ///
    /// Must be called from within a tokio runtime. Returns how many paths
    /// were actually added.
    pub fn add_files_to_queue<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let (added, start_drain) = {
            let mut state = self.shared.lock();
            let mut added = 0;
            for path in paths {
                if state.pending.contains(&path) {
                    debug!("Already queued: {}", path.display());
                    continue;
                }
                state.pending.push_back(path);
                added += 1;
            }

            let start_drain = !state.draining && !state.pending.is_empty();
            if start_drain {
                state.draining = true;
                self.shared.idle.send_replace(false);
            }
            (added, start_drain)
        };

        if start_drain {
            tokio::spawn(drain(self.shared.clone()));
        }
        added
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.shared.lock();
        QueueStatus {
            is_extracting: state.is_extracting,
            progress: state.progress,
            current_operation: state.current_operation.clone(),
            pending: state.pending.len(),
        }
    }

    pub fn is_extracting(&self) -> bool {
        self.shared.lock().is_extracting
    }

    pub fn current_operation(&self) -> String {
        self.shared.lock().current_operation.clone()
    }

    pub fn pending(&self) -> Vec<PathBuf> {
        self.shared.lock().pending.iter().cloned().collect()
    }

    /// Results of finished jobs, oldest first.
    pub fn results(&self) -> Vec<ExtractionResult> {
        self.shared.lock().results.clone()
    }

    pub fn clear_results(&self) {
        self.shared.lock().results.clear();
    }

    /// Wait until no drain is active.
    pub async fn wait_idle(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives in `shared`, which `self` keeps alive.
        let _ = idle.wait_for(|idle| *idle).await;
    }
}

async fn drain(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(path) => path,
                None => {
                    state.draining = false;
                    shared.idle.send_replace(true);
                    break;
                }
            }
        };

        let result = run_job(&shared, next).await;
        shared.lock().results.push(result);
    }
    debug!("Queue drained");
}

async fn run_job(shared: &Arc<Shared>, path: PathBuf) -> ExtractionResult {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    {
        let mut state = shared.lock();
        state.is_extracting = true;
        state.progress = 0.0;
        state.current_operation = format!("Preparing to extract {}...", name);
    }

    let observer = shared.clone();
    let reporter = ProgressReporter::new(Arc::new(move |event: ExtractEvent| {
        observer.observe(&event);
        if let Some(ref callback) = observer.callback {
            callback(event);
        }
    }));

    let extractor = shared.extractor.clone();
    let job_path = path.clone();
    let joined =
        tokio::task::spawn_blocking(move || extractor.extract_package(&job_path, &reporter)).await;

    let result = match joined {
        Ok(result) => result,
        Err(e) => {
            error!("Extraction task for {} did not complete: {}", path.display(), e);
            let failure = ExtractionError::io(
                format!("Extraction of {} aborted", name),
                std::io::Error::other(e.to_string()),
            );
            ExtractionResult::failed(name, &failure)
        }
    };

    info!(
        "{} {}",
        result.package_name,
        if result.success { "extracted" } else { "failed" }
    );

    {
        let mut state = shared.lock();
        state.is_extracting = false;
        state.progress = 1.0;
        state.current_operation.clear();
    }
    result
}
