//! Progress reporting types for indexing runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Lifecycle of one indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Enumerating,
    BatchRunning,
    Finalizing,
    Done,
    Cancelled,
}

impl ScanPhase {
    /// Whether the run can produce no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum CancelReason {
    /// Someone called cancel.
    #[strum(serialize = "cancelled")]
    Requested,
    /// The run's deadline passed.
    #[strum(serialize = "deadline exceeded")]
    DeadlineExceeded,
}

/// Point-in-time progress of an indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexProgress {
    /// Files enumerated for this scan.
    pub total_files: usize,
    /// Files committed to the checkpoint so far, including earlier runs.
    pub processed_files: usize,
    /// Batches committed so far, including earlier runs.
    pub current_batch: usize,
    /// Batches planned for the whole scan.
    pub total_batches: usize,
    /// Files whose task failed during this run.
    pub failed_files: usize,
    /// Set on the final event of a finished scan.
    pub complete: bool,
}

impl IndexProgress {
    /// Progress as a percentage (0.0 to 100.0).
    pub fn percent(&self) -> f64 {
        if self.complete {
            100.0
        } else if self.total_files > 0 {
            self.processed_files as f64 / self.total_files as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Files still waiting to be processed.
    pub fn remaining(&self) -> usize {
        self.total_files.saturating_sub(self.processed_files)
    }
}

/// Outcome of a finished scan.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    /// Final progress, with `complete` set.
    pub progress: IndexProgress,
    /// Records written to the index.
    pub indexed_files: usize,
    /// Whether the index reached stable storage.
    pub index_saved: bool,
    /// Wall time of this run.
    pub elapsed: Duration,
}

impl IndexSummary {
    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        let p = &self.progress;
        if p.failed_files == 0 && self.indexed_files == p.total_files {
            format!("Indexed {} files", self.indexed_files)
        } else {
            format!(
                "Indexed {} of {} files, {} failed",
                self.indexed_files, p.total_files, p.failed_files
            )
        }
    }
}

/// Event emitted by an indexing run.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    /// A batch was committed to the checkpoint.
    BatchCompleted(IndexProgress),
    /// Every file was processed and the index written.
    ScanCompleted(IndexSummary),
    /// The run stopped early; the checkpoint remains resumable.
    ScanCancelled {
        progress: IndexProgress,
        reason: CancelReason,
    },
}

impl IndexEvent {
    /// Progress carried by this event.
    pub fn progress(&self) -> &IndexProgress {
        match self {
            Self::BatchCompleted(progress) => progress,
            Self::ScanCompleted(summary) => &summary.progress,
            Self::ScanCancelled { progress, .. } => progress,
        }
    }

    /// Whether this is the last event of its run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::BatchCompleted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let mut progress = IndexProgress {
            total_files: 250,
            processed_files: 100,
            ..Default::default()
        };
        assert_eq!(progress.percent(), 40.0);
        assert_eq!(progress.remaining(), 150);

        progress.complete = true;
        assert_eq!(progress.percent(), 100.0);
    }

    #[test]
    fn test_percent_empty() {
        assert_eq!(IndexProgress::default().percent(), 0.0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ScanPhase::BatchRunning.to_string(), "batch_running");
        assert!(ScanPhase::Cancelled.is_terminal());
        assert!(!ScanPhase::Enumerating.is_terminal());
        assert_eq!(CancelReason::DeadlineExceeded.to_string(), "deadline exceeded");
    }

    #[test]
    fn test_summary_text() {
        let summary = IndexSummary {
            progress: IndexProgress {
                total_files: 11,
                processed_files: 10,
                failed_files: 1,
                complete: true,
                ..Default::default()
            },
            indexed_files: 10,
            index_saved: true,
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(summary.summary(), "Indexed 10 of 11 files, 1 failed");
    }
}
