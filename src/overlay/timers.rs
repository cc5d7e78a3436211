//! Owned task slots for the overlay's timers.
//!
//! Every slot holds at most one task; storing a new one aborts the old one
//! under the same lock, so there is never a window with two live loops of
//! the same kind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// The kinds of background task an overlay owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Periodic data refresh
    Refresh,
    /// Carousel rotation
    Carousel,
    /// One-shot delayed config re-check
    Recheck,
    /// Mutation batch delivery
    Detector,
    /// Change-signal handler
    Changes,
}

#[derive(Default)]
struct Slots {
    refresh: Option<JoinHandle<()>>,
    carousel: Option<JoinHandle<()>>,
    recheck: Option<JoinHandle<()>>,
    detector: Option<JoinHandle<()>>,
    changes: Option<JoinHandle<()>>,
}

impl Slots {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<JoinHandle<()>> {
        match kind {
            TimerKind::Refresh => &mut self.refresh,
            TimerKind::Carousel => &mut self.carousel,
            TimerKind::Recheck => &mut self.recheck,
            TimerKind::Detector => &mut self.detector,
            TimerKind::Changes => &mut self.changes,
        }
    }
}

/// Counts loops that are actually running; decremented when the task's
/// future is dropped (normal exit or abort)
pub(crate) struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    pub(crate) fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct Timers {
    slots: Mutex<Slots>,
    live_refresh: Arc<AtomicUsize>,
    live_carousel: Arc<AtomicUsize>,
}

impl Timers {
    /// Store `handle` in its slot, aborting whatever was there
    pub(crate) fn replace(&self, kind: TimerKind, handle: JoinHandle<()>) {
        let mut slots = self.slots.lock();
        if let Some(previous) = slots.slot(kind).replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn stop(&self, kind: TimerKind) {
        if let Some(previous) = self.slots.lock().slot(kind).take() {
            previous.abort();
        }
    }

    /// Whether the slot holds a task that has not finished
    pub(crate) fn is_active(&self, kind: TimerKind) -> bool {
        self.slots
            .lock()
            .slot(kind)
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub(crate) fn stop_all(&self) {
        for kind in [
            TimerKind::Refresh,
            TimerKind::Carousel,
            TimerKind::Recheck,
            TimerKind::Detector,
            TimerKind::Changes,
        ] {
            self.stop(kind);
        }
    }

    pub(crate) fn refresh_counter(&self) -> Arc<AtomicUsize> {
        self.live_refresh.clone()
    }

    pub(crate) fn carousel_counter(&self) -> Arc<AtomicUsize> {
        self.live_carousel.clone()
    }

    pub(crate) fn live_refresh(&self) -> usize {
        self.live_refresh.load(Ordering::SeqCst)
    }

    pub(crate) fn live_carousel(&self) -> usize {
        self.live_carousel.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn looping(counter: Arc<AtomicUsize>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let _guard = LiveGuard::new(counter);
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_keeps_one_live_loop() {
        let timers = Timers::default();
        timers.replace(TimerKind::Refresh, looping(timers.refresh_counter()));
        settle().await;
        assert_eq!(timers.live_refresh(), 1);

        timers.replace(TimerKind::Refresh, looping(timers.refresh_counter()));
        settle().await;
        assert_eq!(timers.live_refresh(), 1);
        assert!(timers.is_active(TimerKind::Refresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all() {
        let timers = Timers::default();
        timers.replace(TimerKind::Refresh, looping(timers.refresh_counter()));
        timers.replace(TimerKind::Carousel, looping(timers.carousel_counter()));
        settle().await;
        assert_eq!(timers.live_carousel(), 1);

        timers.stop_all();
        settle().await;
        assert_eq!(timers.live_refresh(), 0);
        assert_eq!(timers.live_carousel(), 0);
        assert!(!timers.is_active(TimerKind::Refresh));
    }
}
