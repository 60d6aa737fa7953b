//! Bounded worker pool for independent per-file tasks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use fileflow_core::IndexError;

/// Counters for the batch currently (or last) run by a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolProgress {
    /// Tasks that returned successfully.
    pub completed: usize,
    /// Tasks in the batch.
    pub total: usize,
    /// Tasks that failed or panicked.
    pub errors: usize,
}

impl PoolProgress {
    /// Tasks that have finished, successfully or not.
    pub fn finished(&self) -> usize {
        self.completed + self.errors
    }
}

/// Read-only view of a pool's counters, safe to poll from another thread.
#[derive(Debug, Clone)]
pub struct PoolProgressHandle(Arc<Mutex<PoolProgress>>);

impl PoolProgressHandle {
    /// Consistent copy of the counters.
    pub fn snapshot(&self) -> PoolProgress {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs batches of tasks on at most `max_workers` threads.
///
/// Results come back in submission order regardless of completion order.
/// A failing or panicking task is recorded in its own slot and never
/// affects its siblings.
pub struct WorkerPool {
    pool: ThreadPool,
    max_workers: usize,
    progress: Arc<Mutex<PoolProgress>>,
}

impl WorkerPool {
    /// Create a pool with `max_workers` threads (minimum 1).
    pub fn new(max_workers: usize) -> Result<Self, IndexError> {
        let max_workers = max_workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|i| format!("fileflow-worker-{i}"))
            .build()
            .map_err(|e| IndexError::Other {
                message: format!("Failed to start worker pool: {e}"),
            })?;

        Ok(Self {
            pool,
            max_workers,
            progress: Arc::new(Mutex::new(PoolProgress::default())),
        })
    }

    /// Configured worker limit.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Handle for observing progress from other threads.
    pub fn progress_handle(&self) -> PoolProgressHandle {
        PoolProgressHandle(Arc::clone(&self.progress))
    }

    /// Current counters.
    pub fn progress(&self) -> PoolProgress {
        *self.lock_progress()
    }

    /// Run every task and return their results in submission order.
    ///
    /// Task errors come back wrapped in [`IndexError::Task`]; panics as
    /// [`IndexError::TaskPanicked`].
    pub fn run_batch<T, F>(&self, tasks: Vec<F>) -> Vec<Result<T, IndexError>>
    where
        T: Send,
        F: FnOnce() -> Result<T, IndexError> + Send,
    {
        *self.lock_progress() = PoolProgress {
            completed: 0,
            total: tasks.len(),
            errors: 0,
        };

        self.pool.install(|| {
            tasks
                .into_par_iter()
                .enumerate()
                .map(|(index, task)| {
                    let result = match panic::catch_unwind(AssertUnwindSafe(task)) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(source)) => Err(IndexError::Task {
                            index,
                            source: Box::new(source),
                        }),
                        Err(payload) => Err(IndexError::TaskPanicked {
                            index,
                            message: panic_message(payload.as_ref()),
                        }),
                    };

                    let mut progress = self.lock_progress();
                    match result {
                        Ok(_) => progress.completed += 1,
                        Err(_) => progress.errors += 1,
                    }
                    drop(progress);

                    result
                })
                .collect()
        })
    }

    /// Reset the counters to zero.
    pub fn reset_progress(&self) {
        *self.lock_progress() = PoolProgress::default();
    }

    fn lock_progress(&self) -> std::sync::MutexGuard<'_, PoolProgress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.max_workers)
            .field("progress", &self.progress())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    type Task = Box<dyn FnOnce() -> Result<usize, IndexError> + Send>;

    #[test]
    fn test_results_keep_submission_order() {
        let pool = WorkerPool::new(4).unwrap();
        let tasks: Vec<Task> = (0..20usize)
            .map(|i| {
                Box::new(move || -> Result<usize, IndexError> {
                    // Later tasks finish first.
                    thread::sleep(Duration::from_millis((20 - i) as u64));
                    Ok(i)
                }) as Task
            })
            .collect();

        let results = pool.run_batch(tasks);

        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..20).collect::<Vec<_>>());
        assert_eq!(
            pool.progress(),
            PoolProgress {
                completed: 20,
                total: 20,
                errors: 0
            }
        );
    }

    #[test]
    fn test_failures_do_not_abort_batch() {
        let pool = WorkerPool::new(2).unwrap();
        let tasks: Vec<Task> = vec![
            Box::new(|| Ok::<usize, IndexError>(1)) as Task,
            Box::new(|| -> Result<usize, IndexError> {
                Err(IndexError::Other {
                    message: "boom".to_string(),
                })
            }) as Task,
            Box::new(|| -> Result<usize, IndexError> { panic!("task exploded") }) as Task,
            Box::new(|| Ok::<usize, IndexError>(4)) as Task,
        ];

        let results = pool.run_batch(tasks);

        assert_eq!(results.len(), 4);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(matches!(results[1], Err(IndexError::Task { index: 1, .. })));
        match &results[2] {
            Err(IndexError::TaskPanicked { index, message }) => {
                assert_eq!(*index, 2);
                assert_eq!(message, "task exploded");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(*results[3].as_ref().unwrap(), 4);

        let progress = pool.progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.errors, 2);
        assert_eq!(progress.finished(), 4);
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<Task> = (0..24usize)
            .map(|i| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                Box::new(move || -> Result<usize, IndexError> {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                }) as Task
            })
            .collect();

        pool.run_batch(tasks);

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_pool_is_reusable_and_resets_counters() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.progress_handle();

        let first: Vec<Task> = (0..5usize)
            .map(|i| Box::new(move || Ok::<usize, IndexError>(i)) as Task)
            .collect();
        pool.run_batch(first);
        assert_eq!(handle.snapshot().completed, 5);

        let second: Vec<Task> = (0..2usize)
            .map(|i| Box::new(move || Ok::<usize, IndexError>(i)) as Task)
            .collect();
        pool.run_batch(second);
        assert_eq!(
            handle.snapshot(),
            PoolProgress {
                completed: 2,
                total: 2,
                errors: 0
            }
        );

        pool.reset_progress();
        assert_eq!(handle.snapshot(), PoolProgress::default());
    }

    #[test]
    fn test_empty_batch() {
        let pool = WorkerPool::new(1).unwrap();
        let results = pool.run_batch(Vec::<Task>::new());
        assert!(results.is_empty());
        assert_eq!(pool.progress().total, 0);
    }
}
