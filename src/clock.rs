//! Frame-clock relay.
//!
//! [`FrameClock`] is the publish point for "one tick elapsed" notifications.
//! Subscribers are invoked in subscription order, once per [`FrameClock::tick`],
//! with the elapsed seconds. Timers and tweens register themselves here; the
//! [`StageManager`](crate::stage::StageManager) ticks its clock from `update`.
//!
//! The clock is an explicit object (cheap to clone, all clones share one
//! subscriber list) so tests and tools can run independent instances.
//!
//! Dispatch iterates over a snapshot of subscriber ids. A subscriber removed
//! during a tick is skipped if it has not run yet; a subscriber added during a
//! tick first runs on the next one.

use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Identifies one subscription on a [`FrameClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Something the clock can cancel in bulk via [`FrameClock::clear_timers`].
pub(crate) trait ClockTimer {
    fn cancel_from_clock(&self);
}

type TickCallback = Box<dyn FnMut(f32)>;

struct Subscriber {
    id: SubscriptionId,
    // Taken out while the callback runs so it can touch the clock.
    callback: Option<TickCallback>,
}

#[derive(Default)]
pub(crate) struct ClockInner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
    timers: Vec<Weak<dyn ClockTimer>>,
    elapsed: f32,
    ticks: u64,
}

/// Process-wide tick broadcaster, passed by reference to whoever needs it.
#[derive(Clone, Default)]
pub struct FrameClock {
    inner: Rc<RefCell<ClockInner>>,
}

/// Non-owning handle used by subscribers to reach back into their clock.
#[derive(Clone, Default)]
pub(crate) struct WeakClock {
    inner: Weak<RefCell<ClockInner>>,
}

impl WeakClock {
    pub(crate) fn upgrade(&self) -> Option<FrameClock> {
        self.inner.upgrade().map(|inner| FrameClock { inner })
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` to run on every tick.
    pub fn subscribe(&self, callback: impl FnMut(f32) + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            callback: Some(Box::new(callback)),
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        before != inner.subscribers.len()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.borrow().subscribers.iter().any(|s| s.id == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Seconds accumulated over all ticks since creation or [`destroy`](Self::destroy).
    pub fn elapsed(&self) -> f32 {
        self.inner.borrow().elapsed
    }

    pub fn tick_count(&self) -> u64 {
        self.inner.borrow().ticks
    }

    /// Fan `dt` out to every subscriber registered before this call.
    pub fn tick(&self, dt: f32) {
        let snapshot: SmallVec<[SubscriptionId; 16]> = {
            let mut inner = self.inner.borrow_mut();
            inner.elapsed += dt;
            inner.ticks += 1;
            inner.subscribers.iter().map(|s| s.id).collect()
        };

        for id in snapshot {
            let callback = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .subscribers
                    .iter_mut()
                    .find(|s| s.id == id)
                    .and_then(|s| s.callback.take())
            };
            let Some(mut callback) = callback else {
                continue;
            };
            callback(dt);
            let mut inner = self.inner.borrow_mut();
            if let Some(slot) = inner.subscribers.iter_mut().find(|s| s.id == id) {
                slot.callback = Some(callback);
            }
        }
    }

    /// Cancel every live timer registered on this clock.
    ///
    /// Each timer's completion is rejected and its subscription removed.
    pub fn clear_timers(&self) {
        let live: Vec<Rc<dyn ClockTimer>> = {
            let mut inner = self.inner.borrow_mut();
            let live = inner.timers.iter().filter_map(Weak::upgrade).collect();
            inner.timers.clear();
            live
        };
        log::debug!("clearing {} timer(s)", live.len());
        for timer in live {
            timer.cancel_from_clock();
        }
    }

    /// Drop every subscriber and timer registration and reset the counters.
    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.clear();
        inner.timers.clear();
        inner.elapsed = 0.0;
        inner.ticks = 0;
    }

    pub(crate) fn downgrade(&self) -> WeakClock {
        WeakClock {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn register_timer(&self, timer: Weak<dyn ClockTimer>) {
        let mut inner = self.inner.borrow_mut();
        inner.timers.retain(|t| t.strong_count() > 0);
        inner.timers.push(timer);
    }
}
