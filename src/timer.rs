//! Pausable countdown timers driven by a [`FrameClock`].
//!
//! A [`PauseableTimer`] subscribes itself to the clock on construction. Each
//! tick it accumulates elapsed seconds (unless paused) and fires its callback
//! once the target is reached. One-shot timers then resolve their completion
//! and unsubscribe; looping timers carry the overshoot into the next interval.
//!
//! Dropping the handle does not stop the timer; call [`PauseableTimer::cancel`]
//! or [`FrameClock::clear_timers`].

use crate::clock::{ClockTimer, FrameClock, SubscriptionId, WeakClock};
use crate::completion::{Completion, Rejection, Resolver};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct TimerState {
    elapsed: f32,
    target: f32,
    looping: bool,
    paused: bool,
    finished: bool,
    callback: Option<Box<dyn FnMut()>>,
    resolver: Option<Resolver<()>>,
    subscription: Option<SubscriptionId>,
    clock: WeakClock,
}

struct TimerCell {
    state: RefCell<TimerState>,
    completion: Completion<()>,
}

/// Handle to a running timer. Clones refer to the same timer.
#[derive(Clone)]
pub struct PauseableTimer {
    cell: Rc<TimerCell>,
}

impl PauseableTimer {
    /// Start a one-shot timer that calls `callback` after `target` seconds.
    pub fn new(clock: &FrameClock, target: f32, callback: impl FnMut() + 'static) -> Self {
        Self::start(clock, target, false, Box::new(callback))
    }

    /// Start a timer that calls `callback` every `interval` seconds until cancelled.
    pub fn repeating(clock: &FrameClock, interval: f32, callback: impl FnMut() + 'static) -> Self {
        Self::start(clock, interval, true, Box::new(callback))
    }

    fn start(clock: &FrameClock, target: f32, looping: bool, callback: Box<dyn FnMut()>) -> Self {
        let (resolver, completion) = Completion::pair();
        let cell = Rc::new(TimerCell {
            state: RefCell::new(TimerState {
                elapsed: 0.0,
                target: target.max(0.0),
                looping,
                paused: false,
                finished: false,
                callback: Some(callback),
                resolver: Some(resolver),
                subscription: None,
                clock: clock.downgrade(),
            }),
            completion,
        });

        let ticking = Rc::clone(&cell);
        let id = clock.subscribe(move |dt| ticking.on_tick(dt));
        cell.state.borrow_mut().subscription = Some(id);
        let weak: Weak<dyn ClockTimer> = Rc::downgrade(&cell) as Weak<dyn ClockTimer>;
        clock.register_timer(weak);

        PauseableTimer { cell }
    }

    /// Halt (`true`) or resume (`false`) accumulation.
    pub fn pause(&self, paused: bool) {
        self.cell.state.borrow_mut().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.cell.state.borrow().paused
    }

    pub fn is_finished(&self) -> bool {
        self.cell.state.borrow().finished
    }

    /// Seconds accumulated toward the current interval.
    pub fn elapsed(&self) -> f32 {
        self.cell.state.borrow().elapsed
    }

    pub fn target(&self) -> f32 {
        self.cell.state.borrow().target
    }

    /// Restart the current interval from zero.
    pub fn reset(&self) {
        self.cell.state.borrow_mut().elapsed = 0.0;
    }

    /// Stop the timer and reject its completion. No-op once finished.
    pub fn cancel(&self) {
        self.cell.cancel();
    }

    /// Resolves on natural completion, rejects with [`Rejection::Cancelled`] on cancel.
    ///
    /// Looping timers only settle through cancellation.
    pub fn completion(&self) -> Completion<()> {
        self.cell.completion.clone()
    }
}

impl TimerCell {
    fn on_tick(&self, dt: f32) {
        {
            let mut state = self.state.borrow_mut();
            if state.paused || state.finished {
                return;
            }
            state.elapsed += dt;
        }

        loop {
            let (done, zero_interval) = {
                let mut state = self.state.borrow_mut();
                if state.paused || state.finished || state.elapsed < state.target {
                    return;
                }
                if state.looping {
                    if state.target > 0.0 {
                        state.elapsed -= state.target;
                    } else {
                        state.elapsed = 0.0;
                    }
                    (false, state.target <= 0.0)
                } else {
                    state.finished = true;
                    (true, false)
                }
            };

            self.fire();

            if done {
                self.finish(None);
                return;
            }
            if zero_interval {
                return;
            }
        }
    }

    fn fire(&self) {
        let callback = self.state.borrow_mut().callback.take();
        if let Some(mut callback) = callback {
            callback();
            let mut state = self.state.borrow_mut();
            if state.callback.is_none() {
                state.callback = Some(callback);
            }
        }
    }

    fn cancel(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return;
            }
            state.finished = true;
        }
        self.finish(Some(Rejection::Cancelled));
    }

    fn finish(&self, rejection: Option<Rejection>) {
        let (resolver, subscription, clock) = {
            let mut state = self.state.borrow_mut();
            (
                state.resolver.take(),
                state.subscription.take(),
                state.clock.clone(),
            )
        };
        if let Some(resolver) = resolver {
            match rejection {
                Some(rejection) => resolver.reject(rejection),
                None => resolver.resolve(()),
            }
        }
        if let (Some(id), Some(clock)) = (subscription, clock.upgrade()) {
            clock.unsubscribe(id);
        }
    }
}

impl ClockTimer for TimerCell {
    fn cancel_from_clock(&self) {
        self.cancel();
    }
}
