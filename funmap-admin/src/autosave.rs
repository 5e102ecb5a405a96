//! Autosave debounce timer
//!
//! Every dirtying edit re-arms a single tokio timer. When it fires, the firing
//! task calls back into the session, which re-validates before saving. Each arm
//! gets a generation number so a stale task (aborted too late, or superseded)
//! can tell that it no longer owns the timer.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default quiet period after the last edit
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(800);

struct PendingAutosave {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct AutosaveTimer {
    delay: Duration,
    generation: u64,
    pending: Option<PendingAutosave>,
}

impl AutosaveTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// (Re)arm the timer; any pending timer is cancelled
    ///
    /// `on_fire` receives the generation it was armed with. Returns `None`
    /// when called outside a tokio runtime, in which case nothing is armed.
    pub fn arm<F>(&mut self, on_fire: F) -> Option<u64>
    where
        F: FnOnce(u64) -> BoxFuture<'static, ()> + Send + 'static,
    {
        self.cancel();

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime available, autosave not armed");
                return None;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let deadline = Instant::now() + self.delay;

        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire(generation).await;
        });

        debug!(generation, delay_ms = self.delay.as_millis() as u64, "Autosave armed");
        self.pending = Some(PendingAutosave { generation, handle });
        Some(generation)
    }

    /// Cancel any pending timer; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                debug!(generation = pending.generation, "Autosave cancelled");
                true
            }
            None => false,
        }
    }

    /// Called by the firing task: release the timer without aborting it
    ///
    /// Returns false when `generation` is stale (the timer was re-armed or
    /// cancelled after this task was spawned).
    pub fn take_fired(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for AutosaveTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
