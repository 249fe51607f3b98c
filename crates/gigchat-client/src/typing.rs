//! Sender-side typing debouncer
//!
//! The transport only cares about edge transitions, so repeated
//! `start_typing` calls inside the window re-arm the auto-stop timer
//! without emitting another start. Exactly one cancellable timer exists per
//! client; it is released on stop, on disconnect, and on teardown so it can
//! never fire into a torn-down connection. The epoch guards against a timer
//! that was already past its sleep when it got aborted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use gigchat_core::ThreadId;

// ----------------------------------------------------------------------------
// Debouncer
// ----------------------------------------------------------------------------

pub(crate) struct TypingDebouncer {
    stop_delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

#[derive(Default)]
struct DebounceState {
    active: Option<ActiveTyping>,
    epoch: u64,
}

struct ActiveTyping {
    thread_id: ThreadId,
    epoch: u64,
    timer: JoinHandle<()>,
}

/// Outcome of a `start` call, telling the caller what to emit
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TypingEdge {
    /// Fresh edge: emit `typing_start`, preceded by a stop for the previous
    /// thread when the edge moved between threads.
    Started { stop_previous: Option<ThreadId> },
    /// Still inside the window: the timer was re-armed, emit nothing.
    Refreshed,
}

impl TypingDebouncer {
    pub fn new(stop_delay: Duration) -> Self {
        Self {
            stop_delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Register a typing edge for `thread_id` and (re)arm the auto-stop
    /// timer. `on_timeout` runs once if the timer expires un-cancelled.
    pub fn start<F>(&self, thread_id: ThreadId, on_timeout: F) -> TypingEdge
    where
        F: FnOnce(ThreadId) + Send + 'static,
    {
        let mut state = self.state.lock().unwrap();
        state.epoch += 1;
        let epoch = state.epoch;

        let (refresh, stop_previous) = match state.active.take() {
            Some(previous) => {
                previous.timer.abort();
                if previous.thread_id == thread_id {
                    (true, None)
                } else {
                    (false, Some(previous.thread_id))
                }
            }
            None => (false, None),
        };

        let shared = Arc::clone(&self.state);
        let delay = self.stop_delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let fire = {
                let mut state = shared.lock().unwrap();
                match &state.active {
                    Some(active) if active.epoch == epoch => {
                        state.active = None;
                        true
                    }
                    _ => false,
                }
            };
            if fire {
                on_timeout(thread_id);
            }
        });
        state.active = Some(ActiveTyping {
            thread_id,
            epoch,
            timer,
        });

        if refresh {
            TypingEdge::Refreshed
        } else {
            TypingEdge::Started { stop_previous }
        }
    }

    /// Cancel the pending timer for `thread_id`. Returns `true` when an
    /// edge was active and the caller should emit `typing_stop`.
    pub fn stop(&self, thread_id: ThreadId) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.active.take() {
            Some(active) if active.thread_id == thread_id => {
                active.timer.abort();
                true
            }
            other => {
                state.active = other;
                false
            }
        }
    }

    /// Release the timer without emitting anything, e.g. on disconnect.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(active) = state.active.take() {
            active.timer.abort();
        }
    }

    /// Whether a typing edge is currently active
    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active.is_some()
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
