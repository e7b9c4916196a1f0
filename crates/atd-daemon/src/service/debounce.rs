//! Coalescing debounce primitive
//!
//! One [`Debouncer`] exists per broadcast category (teams, inbox, tasks),
//! not per entity key. Every call cancels the category's pending timer and
//! reschedules with the new call's arguments, so only the arguments of the
//! last call within a quiet window reach the action. Categories whose
//! action re-fetches full state at fire time are therefore lossless under
//! coalescing; categories whose action forwards the call's own payload are
//! last-writer-wins.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Delays an action until a quiet period elapses, collapsing a burst of
/// calls into one execution carrying the final call's value.
pub struct Debouncer<T: Send + 'static> {
    quiet: Duration,
    action: Arc<dyn Fn(T) + Send + Sync>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(quiet: Duration, action: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            quiet,
            action: Arc::new(action),
            pending: None,
        }
    }

    /// Schedule the action with `value`, cancelling any pending timer.
    pub fn call(&mut self, value: T) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let quiet = self.quiet;
        let action = Arc::clone(&self.action);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            action(value);
        }));
    }

    /// Discard any pending timer without firing the action.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
