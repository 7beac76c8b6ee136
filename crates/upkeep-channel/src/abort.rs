use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Process-wide shutdown flag. Every blocking wait in the coordinator sleeps
/// through [`AbortSignal::wait`] so that a trigger wakes it immediately.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for up to `timeout`. Returns `true` if the abort fired before
    /// or during the sleep.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |aborted| !*aborted)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
