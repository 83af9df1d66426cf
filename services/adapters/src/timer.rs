//! Cancellable one-shot timers
//!
//! A [`TimerSlot`] lives on the entity that owns the timer (a pending request, a tracked
//! pair's strike ladder). Arming spawns a sleeper task that delivers an event on the
//! owner's channel; re-arming or cancelling aborts the previous sleeper first. Every arm
//! bumps a generation counter that is baked into the event, and [`TimerSlot::fire`]
//! rejects events whose generation is no longer current. An event that was already
//! queued when the slot was cancelled or re-armed is therefore ignored.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Owner-side state of one cancellable timer
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Option<AbortHandle>,
    generation: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending firing, then deliver `make_event(generation)` on `events`
    /// after `after`
    pub fn arm<E, F>(&mut self, events: &mpsc::Sender<E>, after: Duration, make_event: F)
    where
        E: Send + 'static,
        F: FnOnce(u64) -> E,
    {
        self.cancel();
        self.generation += 1;

        let event = make_event(self.generation);
        let events = events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // Receiver gone means the owner shut down
            let _ = events.send(event).await;
        });
        self.handle = Some(task.abort_handle());
    }

    /// Abort the pending firing, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Accept a delivered event; `false` means it is stale and must be ignored
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && generation == self.generation {
            self.handle = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
