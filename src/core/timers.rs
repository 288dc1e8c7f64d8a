//! # Supervisor timers.
//!
//! Every timed decision of a supervisor (staggered ramp-up, paced
//! reinforcement, per-unit deadlines, the global deadline, the shutdown grace
//! period) is one entry in a single [`DelayQueue`], polled by the supervisor's
//! `select!` loop. Cancelling an entry is removing its key.

use std::future::poll_fn;
use std::time::Duration;

use tokio_util::time::delay_queue::{DelayQueue, Key};

use crate::config::MAX_DELAY_MS;

const MAX_DELAY: Duration = Duration::from_millis(MAX_DELAY_MS);

/// What a timer entry does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Timer {
    /// Spawn one ramp-up unit.
    Ramp,
    /// Spawn one replacement unit.
    Reinforce,
    /// Kill the unit with this id.
    UnitDeadline(u32),
    /// Shut the whole supervisor down.
    GlobalDeadline,
    /// Stop waiting for killed units to be reaped.
    Grace,
}

pub(crate) struct Timers {
    queue: DelayQueue<Timer>,
}

impl Timers {
    pub(crate) fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
        }
    }

    /// Arms `timer`; delays beyond [`MAX_DELAY_MS`] fire at that bound.
    pub(crate) fn insert(&mut self, timer: Timer, after: Duration) -> Key {
        self.queue.insert(timer, after.min(MAX_DELAY))
    }

    /// Cancels a pending entry.
    ///
    /// Keys are recycled once an entry fires; callers drop a key when its timer fires.
    pub(crate) fn cancel(&mut self, key: &Key) {
        let _ = self.queue.try_remove(key);
    }

    /// Cancels every entry.
    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Waits for the next entry to fire.
    ///
    /// Returns `None` immediately when empty; callers guard on [`is_empty`](Self::is_empty).
    pub(crate) async fn next(&mut self) -> Option<Timer> {
        poll_fn(|cx| self.queue.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_in_deadline_order() {
        let mut timers = Timers::new();
        timers.insert(Timer::Ramp, Duration::from_millis(200));
        timers.insert(Timer::GlobalDeadline, Duration::from_millis(100));

        assert_eq!(timers.next().await, Some(Timer::GlobalDeadline));
        assert_eq!(timers.next().await, Some(Timer::Ramp));
        assert!(timers.is_empty());
        assert_eq!(timers.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_delays_are_bounded() {
        let mut timers = Timers::new();
        timers.insert(Timer::GlobalDeadline, Duration::MAX);
        timers.insert(Timer::Ramp, Duration::from_millis(MAX_DELAY_MS) * 50);
        assert!(!timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_entries_never_fire() {
        let mut timers = Timers::new();
        let key = timers.insert(Timer::UnitDeadline(7), Duration::from_millis(50));
        timers.insert(Timer::Reinforce, Duration::from_millis(80));

        timers.cancel(&key);
        assert_eq!(timers.next().await, Some(Timer::Reinforce));
    }
}
