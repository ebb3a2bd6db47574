//! Single-shot delayed task used to retry starting a suspended device
//!
//! The task runs on its own thread after `delay` unless the [`RetryTimer`]
//! is cancelled or dropped first. Dropping closes the channel, which wakes the
//! waiting thread so it exits without running the task.
//!
//! A timer that has already woken up may still be racing for the
//! controller's lock when it is cancelled. The controller closes that gap by
//! checking [`RetryTimer::id`] against its pending timer before acting.

use std::io;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

pub struct RetryTimer {
    id: u64,
    /// Never sent on; dropping it is the cancellation signal
    _cancel: Sender<()>,
}

impl RetryTimer {
    /// Run `task` once after `delay` on a background thread
    pub fn schedule<F>(id: u64, delay: Duration, task: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        thread::Builder::new()
            .name(format!("stream-retry-{id}"))
            .spawn(move || match cancel_rx.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => task(),
                _ => log::trace!("Retry {} cancelled", id),
            })?;

        Ok(Self {
            id,
            _cancel: cancel_tx,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the task if it has not fired yet
    pub fn cancel(self) {
        drop(self);
    }
}

impl std::fmt::Debug for RetryTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryTimer").field("id", &self.id).finish()
    }
}
