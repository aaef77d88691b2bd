//! Session watchdog timers
//!
//! Each [`Watchdog`] is a named, cancellable task. Arming one replaces any
//! pending instance of the same name. Every arming carries a fresh
//! generation number, and an [`Expiry`] is honored only while its generation
//! is current, so an expiry that was already queued when the watchdog got
//! cancelled or re-armed is discarded.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use djilive_core::Watchdog;

/// A watchdog ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub watchdog: Watchdog,
    pub generation: u64,
}

struct Armed {
    generation: u64,
    task: JoinHandle<()>,
}

/// Set of named watchdog timers
pub struct Watchdogs {
    expiries: mpsc::UnboundedSender<Expiry>,
    armed: HashMap<Watchdog, Armed>,
    generation: u64,
}

impl Watchdogs {
    /// Create an empty set; expiries are delivered to `expiries`
    pub fn new(expiries: mpsc::UnboundedSender<Expiry>) -> Self {
        Self {
            expiries,
            armed: HashMap::new(),
            generation: 0,
        }
    }

    /// Arm `watchdog` to expire after `after`, replacing a pending instance
    pub fn arm(&mut self, watchdog: Watchdog, after: Duration) {
        self.cancel(watchdog);

        self.generation += 1;
        let generation = self.generation;
        let expiries = self.expiries.clone();

        trace!(watchdog = %watchdog, generation, after = ?after, "Arming watchdog");

        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = expiries.send(Expiry {
                watchdog,
                generation,
            });
        });

        self.armed.insert(watchdog, Armed { generation, task });
    }

    /// Cancel `watchdog` if armed
    pub fn cancel(&mut self, watchdog: Watchdog) {
        if let Some(armed) = self.armed.remove(&watchdog) {
            trace!(watchdog = %watchdog, generation = armed.generation, "Cancelling watchdog");
            armed.task.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, armed) in self.armed.drain() {
            armed.task.abort();
        }
    }

    pub fn is_armed(&self, watchdog: Watchdog) -> bool {
        self.armed.contains_key(&watchdog)
    }

    /// Accept an expiry if it belongs to the current arming
    ///
    /// Returns false for stale expiries. An accepted watchdog is disarmed.
    pub fn expire(&mut self, expiry: Expiry) -> bool {
        match self.armed.get(&expiry.watchdog) {
            Some(armed) if armed.generation == expiry.generation => {
                self.armed.remove(&expiry.watchdog);
                true
            }
            _ => {
                trace!(
                    watchdog = %expiry.watchdog,
                    generation = expiry.generation,
                    "Discarding stale watchdog expiry"
                );
                false
            }
        }
    }
}

impl Drop for Watchdogs {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
