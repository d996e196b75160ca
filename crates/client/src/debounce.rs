//! Debounced free-text input.
//!
//! A [`Debouncer`] owns at most one timer. Every [`Debouncer::update`]
//! restarts it, and the value is committed to subscribers only after the
//! input has been quiet for the configured delay.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Default)]
struct Timer {
    pending: bool,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// Stop any scheduled commit and invalidate it if it is already running.
    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
        self.pending = false;
    }
}

#[derive(Debug)]
struct Shared {
    timer: Mutex<Timer>,
    settled: watch::Sender<String>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Timer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, value: String) {
        self.settled.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

/// Timer-owning debouncer for a string input.
///
/// Dropping the debouncer cancels the pending commit unconditionally.
#[derive(Debug)]
pub struct Debouncer {
    shared: Arc<Shared>,
    delay: Duration,
    min_length: usize,
}

impl Debouncer {
    /// Create a debouncer whose committed value starts as `initial`.
    #[must_use]
    pub fn new(initial: impl Into<String>, delay: Duration) -> Self {
        let (settled, _rx) = watch::channel(initial.into());
        Self {
            shared: Arc::new(Shared {
                timer: Mutex::new(Timer::default()),
                settled,
            }),
            delay,
            min_length: 0,
        }
    }

    /// Inputs shorter than `min_length` characters commit immediately.
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Feed a new input value.
    ///
    /// Must be called from within a Tokio runtime when the delay is non-zero.
    pub fn update(&self, value: impl Into<String>) {
        let value = value.into();
        let mut timer = self.shared.lock();
        timer.stop();

        if value.chars().count() < self.min_length || self.delay.is_zero() {
            drop(timer);
            self.shared.commit(value);
            return;
        }
        if *self.shared.settled.borrow() == value {
            return;
        }

        timer.pending = true;
        let generation = timer.generation;
        let delay = self.delay;
        let shared = Arc::downgrade(&self.shared);
        timer.handle = Some(tokio::spawn(fire(shared, generation, delay, value)));
    }

    /// Drop the pending value without committing it.
    pub fn cancel(&self) {
        self.shared.lock().stop();
    }

    /// The last committed value.
    #[must_use]
    pub fn value(&self) -> String {
        self.shared.settled.borrow().clone()
    }

    /// Whether a commit is scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.lock().pending
    }

    /// Receive each committed value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.shared.settled.subscribe()
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shared.lock().stop();
    }
}

async fn fire(shared: Weak<Shared>, generation: u64, delay: Duration, value: String) {
    tokio::time::sleep(delay).await;

    let Some(shared) = shared.upgrade() else {
        return;
    };
    // Held through the commit: a stop lands either before the generation
    // check or after the value is visible.
    let mut timer = shared.lock();
    if timer.generation != generation {
        return;
    }
    timer.pending = false;
    timer.handle = None;
    trace!(value = %value, "debounced value settled");
    shared.commit(value);
    drop(timer);
}
