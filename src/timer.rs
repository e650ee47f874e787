//! Cancellable delayed and periodic tasks.
//!
//! Replaces raw fixed-interval polling loops with an explicit scheduler
//! primitive. A `CancelToken` is a condvar-backed flag whose `sleep` wakes
//! immediately on cancellation, and a `TaskHandle` owns one background
//! thread plus its token. Dropping a handle cancels and joins the task, so
//! an old timer is always dead before a new one starts (restart, never
//! adjust).

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: Mutex<bool>,
    cv: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(TokenInner {
                cancelled: Mutex::new(false),
                cv: Condvar::new(),
            }),
        }
    }

    /// Sets the flag and wakes every sleeper immediately.
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        self.inner.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Sleeps for `dur` unless cancelled first.
    /// Returns `true` if the full duration elapsed, `false` on cancellation.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        loop {
            if *cancelled {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _) = self
                .inner
                .cv
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            cancelled = guard;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one background task. Cancels and joins on drop.
pub struct TaskHandle {
    token: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn cancel(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawns `f` on its own thread with a cancellation token. `f` is expected
/// to return promptly once the token reports cancelled.
pub fn spawn_cancellable<F>(f: F) -> TaskHandle
where
    F: FnOnce(&CancelToken) + Send + 'static,
{
    let token = CancelToken::new();
    let task_token = token.clone();
    let thread = thread::spawn(move || f(&task_token));
    TaskHandle {
        token,
        thread: Some(thread),
    }
}

/// Runs `f` once after `delay`, unless cancelled first.
pub fn spawn_after<F>(delay: Duration, f: F) -> TaskHandle
where
    F: FnOnce() + Send + 'static,
{
    spawn_cancellable(move |token| {
        if token.sleep(delay) {
            f();
        }
    })
}

/// Runs `f` every `period` until cancelled. The first run happens one full
/// period after the spawn.
pub fn spawn_periodic<F>(period: Duration, mut f: F) -> TaskHandle
where
    F: FnMut() + Send + 'static,
{
    spawn_cancellable(move |token| loop {
        if !token.sleep(period) {
            return;
        }
        f();
    })
}
