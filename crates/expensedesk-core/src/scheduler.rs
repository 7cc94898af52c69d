//! Debounced fetch scheduling
//!
//! [`Debouncer`] turns a burst of filter edits into one expiry message after a
//! quiet period. [`FetchTracker`] tags every dispatched fetch with a ticket and
//! decides, when the fetch resolves, whether its result may still be applied.
//! Network calls are never cancelled; superseded results are dropped instead.

use crate::query::PageQuery;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Restartable quiet-period timer
///
/// Each restart bumps a generation number that travels with the expiry
/// message, so an expiry that raced with a restart or a cancel is recognised
/// and ignored by [`Debouncer::expire`].
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    armed: bool,
    timer: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            armed: false,
            timer: None,
        }
    }

    /// Whether a quiet period is currently running
    pub fn is_pending(&self) -> bool {
        self.armed
    }

    /// Start (or restart) the quiet period; `make` builds the message sent on
    /// expiry from the new generation
    pub fn restart<M, F>(&mut self, events: &UnboundedSender<M>, make: F) -> u64
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M,
    {
        self.abort_timer();
        self.generation += 1;
        self.armed = true;

        let message = make(self.generation);
        let events = events.clone();
        let delay = self.delay;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone after unmount; nothing left to notify.
            let _ = events.send(message);
        }));
        self.generation
    }

    /// Accept an expiry message; true only for the surviving timer
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.armed && generation == self.generation {
            self.armed = false;
            self.timer = None;
            true
        } else {
            false
        }
    }

    /// Drop the running quiet period, if any
    pub fn cancel(&mut self) {
        self.abort_timer();
        if self.armed {
            self.generation += 1;
            self.armed = false;
        }
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.abort_timer();
    }
}

/// Identity of one dispatched fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Dispatch order, strictly increasing
    pub seq: u64,
    /// Tracker epoch at dispatch; bumped by [`FetchTracker::invalidate`]
    pub epoch: u64,
    /// Request signature
    pub query: PageQuery,
}

/// Apply-if-current bookkeeping for in-flight fetches
#[derive(Debug, Default)]
pub struct FetchTracker {
    next_seq: u64,
    epoch: u64,
    in_flight: usize,
    last_dispatched: Option<PageQuery>,
    applied_seq: Option<u64>,
}

impl FetchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// False when `query` was the last thing dispatched and nothing forces a refetch
    pub fn should_dispatch(&self, query: &PageQuery, force: bool) -> bool {
        force || self.last_dispatched.as_ref() != Some(query)
    }

    /// Record a dispatch and hand out its ticket
    pub fn issue(&mut self, query: PageQuery) -> FetchTicket {
        self.next_seq += 1;
        self.in_flight += 1;
        self.last_dispatched = Some(query.clone());
        FetchTicket {
            seq: self.next_seq,
            epoch: self.epoch,
            query,
        }
    }

    /// Settle a resolved fetch. Returns whether its outcome concerns the
    /// current view: same epoch, same signature as `current`, and not older
    /// than a result that was already applied.
    pub fn settle(&mut self, ticket: &FetchTicket, current: &PageQuery, succeeded: bool) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        self.in_flight = self.in_flight.saturating_sub(1);

        if ticket.query != *current {
            return false;
        }
        if matches!(self.applied_seq, Some(applied) if applied > ticket.seq) {
            return false;
        }

        if succeeded {
            self.applied_seq = Some(ticket.seq);
        } else if ticket.seq == self.next_seq {
            // Let the same query be dispatched again after a failure
            self.last_dispatched = None;
        }
        true
    }

    /// Number of fetches dispatched in this epoch and not yet settled
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Make every outstanding ticket inapplicable
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        self.in_flight = 0;
        self.last_dispatched = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn query(page: u32) -> PageQuery {
        PageQuery::new(page, 5)
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_coalesces() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));

        debouncer.restart(&tx, |g| g);
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.restart(&tx, |g| g);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let last = debouncer.restart(&tx, |g| g);

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, last);
        assert!(debouncer.expire(fired));
        assert!(!debouncer.is_pending());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        let first = debouncer.restart(&tx, |g| g);
        tokio::time::sleep(Duration::from_millis(150)).await;
        // The first expiry is already queued when the user types again
        let second = debouncer.restart(&tx, |g| g);

        assert_eq!(rx.recv().await.unwrap(), first);
        assert!(!debouncer.expire(first));
        assert_eq!(rx.recv().await.unwrap(), second);
        assert!(debouncer.expire(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let generation = debouncer.restart(&tx, |g| g);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert!(!debouncer.expire(generation));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dedup_and_force() {
        let mut tracker = FetchTracker::new();
        assert!(tracker.should_dispatch(&query(0), false));
        tracker.issue(query(0));
        assert!(!tracker.should_dispatch(&query(0), false));
        assert!(tracker.should_dispatch(&query(0), true));
        assert!(tracker.should_dispatch(&query(1), false));
    }

    #[test]
    fn test_older_result_after_newer_is_stale() {
        let mut tracker = FetchTracker::new();
        let a = tracker.issue(query(0));
        let b = tracker.issue(query(1));
        assert_eq!(tracker.in_flight(), 2);

        assert!(tracker.settle(&b, &query(1), true));
        assert!(!tracker.settle(&a, &query(1), true));
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_same_signature_older_refresh_is_stale() {
        let mut tracker = FetchTracker::new();
        let before = tracker.issue(query(0));
        let refresh = tracker.issue(query(0));

        assert!(tracker.settle(&refresh, &query(0), true));
        assert!(!tracker.settle(&before, &query(0), true));
    }

    #[test]
    fn test_failure_allows_redispatch() {
        let mut tracker = FetchTracker::new();
        let ticket = tracker.issue(query(2));
        assert!(tracker.settle(&ticket, &query(2), false));
        assert!(tracker.should_dispatch(&query(2), false));
    }

    #[test]
    fn test_invalidate() {
        let mut tracker = FetchTracker::new();
        let ticket = tracker.issue(query(0));
        tracker.invalidate();
        assert_eq!(tracker.in_flight(), 0);
        assert!(!tracker.settle(&ticket, &query(0), true));
    }
}
