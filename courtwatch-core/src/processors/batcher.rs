//! Per-recipient batching of matched slots.
//!
//! Each recipient is either idle (no entry) or accumulating (an entry with
//! one outstanding flush timer). Every new match restarts the timer instead
//! of adding another one, so a batch is flushed once the recipient has seen
//! no new match for a whole window.
//!
//! The map is guarded by a single mutex. Critical sections only touch the
//! map; sending the flushed batch happens after the guard is dropped.

use crate::events::{BatchReady, BatchReadySender, MatchedSlot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct PendingBatch {
    matches: Vec<MatchedSlot>,
    /// Replaced on every reset; a timer only flushes its own generation.
    generation: u64,
    timer: JoinHandle<()>,
}

type PendingMap = HashMap<String, PendingBatch>;

/// Outcome of [`Batcher::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended; the recipient's timer was (re)started.
    Queued { pending: usize },
    /// The same user and slot is already waiting in this batch.
    AlreadyPending,
}

pub struct Batcher {
    window: Duration,
    pending: Arc<Mutex<PendingMap>>,
    next_generation: AtomicU64,
    ready_tx: BatchReadySender,
}

impl Batcher {
    pub fn new(window: Duration, ready_tx: BatchReadySender) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            ready_tx,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Change the window used by timers started from now on.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Append a match to the recipient's batch and restart its timer.
    pub fn add(&self, recipient: &str, matched: MatchedSlot) -> AddOutcome {
        let slot_id = matched.slot_id();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut pending = lock(&self.pending);

        let count = match pending.get_mut(recipient) {
            Some(batch) => {
                if batch
                    .matches
                    .iter()
                    .any(|m| m.user_id == matched.user_id && m.slot_id() == slot_id)
                {
                    return AddOutcome::AlreadyPending;
                }
                batch.timer.abort();
                batch.generation = generation;
                batch.timer = self.spawn_timer(recipient.to_string(), generation);
                batch.matches.push(matched);
                batch.matches.len()
            }
            None => {
                let timer = self.spawn_timer(recipient.to_string(), generation);
                pending.insert(
                    recipient.to_string(),
                    PendingBatch {
                        matches: vec![matched],
                        generation,
                        timer,
                    },
                );
                1
            }
        };

        debug!(
            recipient = %recipient,
            slot_id = %slot_id,
            pending = count,
            "Match added to batch"
        );
        AddOutcome::Queued { pending: count }
    }

    /// Number of matches waiting for `recipient`.
    pub fn pending_for(&self, recipient: &str) -> usize {
        lock(&self.pending)
            .get(recipient)
            .map_or(0, |batch| batch.matches.len())
    }

    pub fn pending_recipients(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Flush every pending batch now, cancelling the timers.
    ///
    /// Used on shutdown. Returns the number of batches handed over.
    pub async fn flush_all(&self) -> usize {
        let drained: Vec<(String, PendingBatch)> = lock(&self.pending).drain().collect();

        let mut flushed = 0;
        for (recipient, batch) in drained {
            batch.timer.abort();
            let ready = BatchReady {
                recipient,
                matches: batch.matches,
            };
            if let Err(e) = self.ready_tx.send(ready).await {
                warn!(
                    recipient = %e.0.recipient,
                    "Failed to hand over batch on shutdown, dispatcher is gone"
                );
                continue;
            }
            flushed += 1;
        }
        flushed
    }

    fn spawn_timer(&self, recipient: String, generation: u64) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let ready_tx = self.ready_tx.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;

            // Swap the batch out under the lock, send outside of it.
            let batch = {
                let mut pending = lock(&pending);
                let current = pending
                    .get(&recipient)
                    .is_some_and(|batch| batch.generation == generation);
                if current {
                    pending.remove(&recipient)
                } else {
                    None
                }
            };
            let Some(batch) = batch else {
                return;
            };

            debug!(
                recipient = %recipient,
                slots = batch.matches.len(),
                "Batch window closed"
            );
            let ready = BatchReady {
                recipient,
                matches: batch.matches,
            };
            if let Err(e) = ready_tx.send(ready).await {
                warn!(
                    recipient = %e.0.recipient,
                    "Failed to hand over batch, dispatcher is gone"
                );
            }
        })
    }
}

/// The map stays consistent even if a holder panicked, so poisoning is ignored.
fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
