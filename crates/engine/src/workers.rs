//! Background maintenance threads.
//!
//! Three workers share the engine mutex with the foreground path, each
//! acquiring it for one unit of work per tick:
//!
//! - the **rotation** worker checks the active file size every
//!   `check_file_size_interval`;
//! - the **sync** worker fsyncs the active file every `sync_interval`
//!   (only spawned when the option is set);
//! - the **compaction** worker merges stale files every `compact_interval`.
//!
//! Each worker sleeps in `recv_timeout` on its own channel; `shutdown`
//! drops the sender, which wakes the worker immediately instead of letting
//! it sleep out the rest of its tick. Workers also exit on their own once
//! they observe the closed flag.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::error;

use crate::{Barrel, Result};

/// Handle to one background worker: its wake-up channel and join handle.
pub(crate) struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Wakes the worker and waits for it to exit.
    pub(crate) fn stop(self) {
        drop(self.stop_tx);
        let _ = self.handle.join();
    }
}

/// Spawns a named worker that calls `tick` every `interval` until either
/// `tick` reports it is done or the stop channel is dropped.
fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Worker>
where
    F: FnMut() -> bool + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let handle = thread::Builder::new()
        .name(format!("barrel-{}", name))
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if !tick() {
                        break;
                    }
                }
                // Disconnected (or any message): shutdown.
                _ => break,
            }
        })?;

    Ok(Worker { stop_tx, handle })
}

impl Barrel {
    /// Launches the background workers for a writable instance.
    pub(crate) fn spawn_workers(&self) -> Result<()> {
        let mut workers = Vec::new();

        {
            let inner = Arc::clone(&self.inner);
            let opts = self.opts.clone();
            workers.push(spawn(
                "rotation",
                self.opts.check_file_size_interval,
                move || {
                    let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
                    if guard.closed {
                        return false;
                    }
                    if let Err(e) = guard.rotate_if_needed(&opts) {
                        error!(error = %e, "background rotation failed");
                    }
                    true
                },
            )?);
        }

        if let Some(interval) = self.opts.sync_interval {
            let inner = Arc::clone(&self.inner);
            workers.push(spawn("sync", interval, move || {
                let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
                if guard.closed {
                    return false;
                }
                if let Some(active) = guard.active.as_mut() {
                    if let Err(e) = active.sync() {
                        error!(error = %e, "background sync failed");
                    }
                }
                true
            })?);
        }

        {
            let inner = Arc::clone(&self.inner);
            let opts = self.opts.clone();
            workers.push(spawn("compaction", self.opts.compact_interval, move || {
                let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
                if guard.closed {
                    return false;
                }
                if let Err(e) = guard.compact(&opts) {
                    error!(error = %e, "background compaction failed");
                }
                true
            })?);
        }

        let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        *guard = workers;
        Ok(())
    }
}
