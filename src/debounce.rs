use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Delays a search callback until input has been quiet for `delay`.
///
/// Every [`call`](Self::call) cancels the pending one, so only the last term
/// in a burst reaches the callback.
pub struct Debouncer<F> {
    delay: Duration,
    callback: Arc<F>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<F> Debouncer<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    pub fn new(delay: Duration, callback: F) -> Self {
        Self {
            delay,
            callback: Arc::new(callback),
            pending: Mutex::new(None),
        }
    }

    /// Schedules `callback(term)` after the delay.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn call(&self, term: impl Into<String>) {
        let term = term.into();
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;

        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback(term);
        }));
    }

    /// Drops the pending call, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl<F> Drop for Debouncer<F> {
    fn drop(&mut self) {
        if let Some(previous) = self.pending.get_mut().take() {
            previous.abort();
        }
    }
}
