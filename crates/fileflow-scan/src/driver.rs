//! Background execution of an [`IndexRun`].

use tokio::sync::mpsc;

use fileflow_core::IndexEvent;

use crate::engine::IndexRun;

/// Capacity of the event channel returned by [`spawn_indexing`].
pub const EVENT_CHANNEL_SIZE: usize = 64;

/// Drive `run` on a blocking task and forward its events.
///
/// Must be called from within a tokio runtime. If the receiver is dropped,
/// the run is cancelled and stops at the next batch boundary; everything
/// up to that boundary is already persisted.
pub fn spawn_indexing(run: IndexRun) -> mpsc::Receiver<IndexEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

    tokio::task::spawn_blocking(move || {
        let control = run.control().clone();
        for event in run {
            if tx.blocking_send(event).is_err() {
                control.cancel();
            }
        }
    });

    rx
}
