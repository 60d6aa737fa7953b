//! The resumable, batched indexing engine.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use globset::GlobSet;

use fileflow_core::{
    CancelReason, ConfigProvider, ErrorContext, ErrorSink, FileRecord, IndexError, IndexEvent,
    IndexProgress, IndexSummary, ScanCheckpoint, ScanPhase,
};
use fileflow_store::{CheckpointStore, IndexStore};

use crate::control::ScanControl;
use crate::enumerate::{self, FileEntry};
use crate::fingerprint::Fingerprinter;
use crate::pool::{PoolProgressHandle, WorkerPool};

/// Indexes directory trees into a configuration directory.
///
/// The engine owns the worker pool and both stores. Each call to
/// [`index_directory`](Self::index_directory) starts a fresh [`IndexRun`];
/// the persisted checkpoint is what makes successive runs resumable.
pub struct IndexingEngine {
    batch_size: usize,
    ignore: GlobSet,
    pool: Arc<WorkerPool>,
    fingerprinter: Fingerprinter,
    checkpoints: CheckpointStore,
    index: IndexStore,
    sink: Arc<dyn ErrorSink>,
}

impl IndexingEngine {
    /// Create an engine persisting into `config_dir`.
    pub fn new(
        config: &dyn ConfigProvider,
        config_dir: impl AsRef<Path>,
        sink: Arc<dyn ErrorSink>,
    ) -> Result<Self, IndexError> {
        let config_dir = config_dir.as_ref();
        let pool = WorkerPool::new(config.worker_count())?;
        let ignore = enumerate::build_ignore_set(config.ignore_patterns())?;

        Ok(Self {
            batch_size: config.batch_size().max(1),
            ignore,
            pool: Arc::new(pool),
            fingerprinter: Fingerprinter::new(),
            checkpoints: CheckpointStore::new(config_dir, Arc::clone(&sink)),
            index: IndexStore::new(config_dir, Arc::clone(&sink)),
            sink,
        })
    }

    /// Use a custom fingerprinter.
    pub fn with_fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn worker_count(&self) -> usize {
        self.pool.max_workers()
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn index_store(&self) -> &IndexStore {
        &self.index
    }

    /// Observe the worker pool's per-batch counters.
    pub fn pool_progress(&self) -> PoolProgressHandle {
        self.pool.progress_handle()
    }

    /// Resume the persisted checkpoint if there is one, else start fresh.
    pub fn resume_indexing(
        &self,
        root: impl AsRef<Path>,
        control: ScanControl,
    ) -> Result<IndexRun, IndexError> {
        let checkpoint = self.checkpoints.load();
        self.index_directory(root, checkpoint, control)
    }

    /// Enumerate `root` and prepare a run over the files still to process.
    ///
    /// Fails only when `root` is missing or not a directory. A `checkpoint`
    /// recorded for a different root is reported and ignored.
    pub fn index_directory(
        &self,
        root: impl AsRef<Path>,
        checkpoint: Option<ScanCheckpoint>,
        control: ScanControl,
    ) -> Result<IndexRun, IndexError> {
        let root = enumerate::resolve_root(root.as_ref())?;
        let files = enumerate::collect_files(
            &root,
            &self.ignore,
            self.pool.max_workers(),
            self.sink.as_ref(),
        );

        let checkpoint = checkpoint.filter(|cp| self.accepts(cp, &root));
        let resumed = checkpoint.is_some();
        let (checkpoint, pending) = match checkpoint {
            Some(mut cp) => {
                let present: HashSet<&str> = files.iter().map(|f| f.relative.as_str()).collect();
                let dropped = cp.retain(|path| present.contains(path));
                if dropped > 0 {
                    tracing::info!(dropped, "dropped checkpoint entries for files no longer present");
                }

                let pending: VecDeque<FileEntry> =
                    files.into_iter().filter(|f| !cp.contains(&f.relative)).collect();
                cp.total_files = cp.processed_count() + pending.len();
                cp.total_batches = cp.current_batch + pending.len().div_ceil(self.batch_size);
                cp.root = Some(root.clone());
                (cp, pending)
            }
            None => {
                let total_batches = files.len().div_ceil(self.batch_size);
                let cp = ScanCheckpoint::new(root.clone(), files.len(), total_batches);
                (cp, VecDeque::from(files))
            }
        };

        if resumed {
            tracing::info!(
                root = %root.display(),
                already_processed = checkpoint.processed_count(),
                remaining = pending.len(),
                "resuming scan"
            );
        } else {
            tracing::info!(root = %root.display(), files = pending.len(), "starting scan");
        }

        let phase = if pending.is_empty() {
            ScanPhase::Finalizing
        } else {
            ScanPhase::BatchRunning
        };

        Ok(IndexRun {
            root,
            start_index: checkpoint.processed_count(),
            pending,
            checkpoint,
            records: Vec::new(),
            failed_files: 0,
            batch_size: self.batch_size,
            pool: Arc::clone(&self.pool),
            fingerprinter: self.fingerprinter,
            checkpoints: self.checkpoints.clone(),
            index: self.index.clone(),
            sink: Arc::clone(&self.sink),
            control,
            phase,
            started: Instant::now(),
        })
    }

    /// Drop any in-progress checkpoint.
    pub fn clear_checkpoint(&self) -> bool {
        self.checkpoints.clear()
    }

    fn accepts(&self, checkpoint: &ScanCheckpoint, root: &Path) -> bool {
        if checkpoint.belongs_to(root) {
            return true;
        }
        let error = IndexError::CheckpointMismatch {
            recorded: checkpoint.root.clone().unwrap_or_default(),
            requested: root.to_path_buf(),
        };
        let context = ErrorContext::new("resume_checkpoint")
            .with("path", self.checkpoints.path().display());
        self.sink.report(&error, &context);
        false
    }
}

impl std::fmt::Debug for IndexingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingEngine")
            .field("batch_size", &self.batch_size)
            .field("pool", &self.pool)
            .field("checkpoints", &self.checkpoints)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// One pass of the indexing state machine.
///
/// Iterating drives the scan: every `next()` runs at most one batch and
/// persists the checkpoint before yielding its [`IndexEvent`]. The last
/// event is either [`IndexEvent::ScanCompleted`] or
/// [`IndexEvent::ScanCancelled`]; after that the iterator is exhausted.
pub struct IndexRun {
    root: PathBuf,
    start_index: usize,
    pending: VecDeque<FileEntry>,
    checkpoint: ScanCheckpoint,
    records: Vec<FileRecord>,
    failed_files: usize,
    batch_size: usize,
    pool: Arc<WorkerPool>,
    fingerprinter: Fingerprinter,
    checkpoints: CheckpointStore,
    index: IndexStore,
    sink: Arc<dyn ErrorSink>,
    control: ScanControl,
    phase: ScanPhase,
    started: Instant,
}

impl IndexRun {
    /// Resolved scan root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Cumulative state, as last persisted (or about to be).
    pub fn checkpoint(&self) -> &ScanCheckpoint {
        &self.checkpoint
    }

    /// Files already processed when this run started.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Files this run still has to process.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn control(&self) -> &ScanControl {
        &self.control
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> IndexProgress {
        IndexProgress {
            total_files: self.checkpoint.total_files,
            processed_files: self.checkpoint.processed_count(),
            current_batch: self.checkpoint.current_batch,
            total_batches: self.checkpoint.total_batches,
            failed_files: self.failed_files,
            complete: self.phase == ScanPhase::Done,
        }
    }

    /// Drive the run to its terminal event, discarding intermediate ones.
    pub fn run_to_end(self) -> Option<IndexEvent> {
        self.last()
    }

    fn run_batch(&mut self) -> IndexEvent {
        if let Err(reason) = self.control.checkpoint_gate() {
            return self.cancel(reason);
        }

        let take = self.batch_size.min(self.pending.len());
        let batch: Vec<FileEntry> = self.pending.drain(..take).collect();

        let tasks: Vec<_> = batch
            .iter()
            .map(|entry| {
                let fingerprinter = self.fingerprinter;
                let control = self.control.clone();
                let path = entry.path.clone();
                let relative = entry.relative.clone();
                move || {
                    if control.is_cancelled() {
                        return Ok(None);
                    }
                    build_record(&path, relative, fingerprinter.fingerprint(&path)).map(Some)
                }
            })
            .collect();

        let results = self.pool.run_batch(tasks);

        // Tasks that saw the cancellation were skipped; keep the checkpoint
        // on the previous boundary. A batch that ran to completion is kept
        // and the next call stops at the gate.
        let skipped = results.iter().any(|result| matches!(result, Ok(None)));
        if skipped {
            if let Some(reason) = self.control.cancel_reason() {
                return self.cancel(reason);
            }
        }

        let mut failed = 0;
        for (entry, result) in batch.iter().zip(results) {
            match result {
                Ok(Some(record)) => {
                    self.checkpoint
                        .record(record.relative_path.clone(), record.fingerprint.clone());
                    self.records.push(record);
                }
                Ok(None) => {}
                Err(error) => {
                    failed += 1;
                    let context = ErrorContext::new("process_file")
                        .with("file", entry.path.display())
                        .with("batch", self.checkpoint.current_batch + 1);
                    self.sink.report(&error, &context);
                }
            }
        }
        self.failed_files += failed;
        self.checkpoint.current_batch += 1;

        self.checkpoints.save(&self.checkpoint);

        tracing::debug!(
            batch = self.checkpoint.current_batch,
            total_batches = self.checkpoint.total_batches,
            processed = self.checkpoint.processed_count(),
            failed,
            "batch completed"
        );

        if self.pending.is_empty() {
            self.phase = ScanPhase::Finalizing;
        }
        IndexEvent::BatchCompleted(self.progress())
    }

    fn finalize(&mut self) -> IndexEvent {
        let mut records = std::mem::take(&mut self.records);
        let produced: HashSet<String> = records.iter().map(|r| r.relative_path.clone()).collect();

        // Paths finished by earlier runs: fresh metadata, stored fingerprint.
        for (relative, fingerprint) in &self.checkpoint.fingerprints {
            if produced.contains(relative) {
                continue;
            }
            let path = self.root.join(relative);
            match build_record(&path, relative.clone(), fingerprint.clone()) {
                Ok(record) => records.push(record),
                Err(error) => {
                    self.failed_files += 1;
                    let context = ErrorContext::new("finalize_index").with("file", path.display());
                    self.sink.report(&error, &context);
                }
            }
        }
        records.sort_by(|a, b| Path::new(&a.relative_path).cmp(Path::new(&b.relative_path)));

        let indexed_files = records.len();
        let index_saved = self.index.save(records);
        // A failed index write keeps the checkpoint so the next run can
        // finalize again without re-fingerprinting.
        if index_saved {
            self.checkpoints.clear();
        }

        self.phase = ScanPhase::Done;
        let summary = IndexSummary {
            progress: self.progress(),
            indexed_files,
            index_saved,
            elapsed: self.started.elapsed(),
        };
        tracing::info!(
            root = %self.root.display(),
            indexed = indexed_files,
            failed = self.failed_files,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "scan complete"
        );

        IndexEvent::ScanCompleted(summary)
    }

    fn cancel(&mut self, reason: CancelReason) -> IndexEvent {
        self.phase = ScanPhase::Cancelled;
        tracing::info!(
            %reason,
            processed = self.checkpoint.processed_count(),
            total = self.checkpoint.total_files,
            "scan stopped; checkpoint kept for resume"
        );
        IndexEvent::ScanCancelled {
            progress: self.progress(),
            reason,
        }
    }
}

impl Iterator for IndexRun {
    type Item = IndexEvent;

    fn next(&mut self) -> Option<IndexEvent> {
        match self.phase {
            ScanPhase::Done | ScanPhase::Cancelled => None,
            ScanPhase::Finalizing => Some(self.finalize()),
            ScanPhase::Idle | ScanPhase::Enumerating | ScanPhase::BatchRunning => {
                Some(self.run_batch())
            }
        }
    }
}

impl std::fmt::Debug for IndexRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRun")
            .field("root", &self.root)
            .field("phase", &self.phase)
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}

/// Stat `path` and pair the result with `fingerprint`.
fn build_record(path: &Path, relative: String, fingerprint: String) -> Result<FileRecord, IndexError> {
    let metadata = fs::metadata(path).map_err(|e| IndexError::file_access(path, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| IndexError::file_access(path, e))?;
    Ok(FileRecord::new(relative, metadata.len(), modified, fingerprint))
}
