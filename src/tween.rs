//! Property tweens driven by a [`FrameClock`].
//!
//! A [`Tween`] captures the current values of named numeric properties on a
//! [`Tweenable`] target, then on every tick maps the elapsed fraction through
//! an [`Easing`] curve and writes the interpolated values back. When the
//! fraction reaches 1 the properties are set exactly to their end values and
//! the tween's completion resolves.
//!
//! # Example
//!
//! ```ignore
//! let target = Rc::new(RefCell::new(Position::new(0.0, 0.0)));
//! let tween = Tween::new(&clock, target.clone(), &[("x", 100.0)], 0.5, "quadOut");
//! ```

use crate::clock::{FrameClock, SubscriptionId, WeakClock};
use crate::completion::{Completion, Rejection, Resolver};
use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

/// Easing functions for smooth interpolation.
///
/// These functions transform a linear `t` value (0.0 to 1.0) to create
/// different acceleration/deceleration curves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Easing {
    /// Constant speed (no easing).
    #[default]
    Linear,
    /// Starts slow, accelerates (quadratic).
    QuadIn,
    /// Starts fast, decelerates (quadratic).
    QuadOut,
    /// Slow start and end (quadratic).
    QuadInOut,
    /// Starts slow, accelerates (cubic).
    CubicIn,
    /// Starts fast, decelerates (cubic).
    CubicOut,
    /// Slow start and end (cubic).
    CubicInOut,
    /// Starts slow, accelerates (sine).
    SineIn,
    /// Starts fast, decelerates (sine).
    SineOut,
    /// Slow start and end (sine).
    SineInOut,
}

impl Easing {
    pub const ALL: [Easing; 10] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
        Easing::SineIn,
        Easing::SineOut,
        Easing::SineInOut,
    ];

    /// Resolve an easing by name, logging and falling back to [`Easing::Linear`]
    /// when the name is unknown.
    pub fn from_name(name: &str) -> Easing {
        match name.parse() {
            Ok(easing) => easing,
            Err(()) => {
                log::error!("unknown easing '{}', falling back to linear", name);
                Easing::Linear
            }
        }
    }

    /// Apply the curve to a normalized time value, clamped to [0.0, 1.0].
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => t * (2.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let p = t - 1.0;
                p * p * p + 1.0
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let p = 2.0 * t - 2.0;
                    0.5 * p * p * p + 1.0
                }
            }
            Easing::SineIn => 1.0 - (t * std::f32::consts::FRAC_PI_2).cos(),
            Easing::SineOut => (t * std::f32::consts::FRAC_PI_2).sin(),
            Easing::SineInOut => -0.5 * ((std::f32::consts::PI * t).cos() - 1.0),
        }
    }
}

impl FromStr for Easing {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both "quadInOut" and "quad_in_out".
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "linear" => Ok(Easing::Linear),
            "quadin" => Ok(Easing::QuadIn),
            "quadout" => Ok(Easing::QuadOut),
            "quadinout" => Ok(Easing::QuadInOut),
            "cubicin" => Ok(Easing::CubicIn),
            "cubicout" => Ok(Easing::CubicOut),
            "cubicinout" => Ok(Easing::CubicInOut),
            "sinein" => Ok(Easing::SineIn),
            "sineout" => Ok(Easing::SineOut),
            "sineinout" => Ok(Easing::SineInOut),
            _ => Err(()),
        }
    }
}

/// Linearly interpolate between two floats.
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// A value with named numeric properties that a [`Tween`] can drive.
pub trait Tweenable {
    fn get_property(&self, name: &str) -> Option<f32>;
    /// Returns `false` if the property does not exist.
    fn set_property(&mut self, name: &str, value: f32) -> bool;
}

#[derive(Debug, Clone)]
struct Track {
    property: String,
    from: f32,
    to: f32,
}

struct TweenState<T> {
    target: Rc<RefCell<T>>,
    tracks: Vec<Track>,
    total: f32,
    elapsed: f32,
    easing: Easing,
    paused: bool,
    finished: bool,
    resolver: Option<Resolver<()>>,
    subscription: Option<SubscriptionId>,
    clock: WeakClock,
}

/// Handle to a running tween. Clones refer to the same tween.
pub struct Tween<T: Tweenable + 'static> {
    state: Rc<RefCell<TweenState<T>>>,
    completion: Completion<()>,
}

impl<T: Tweenable + 'static> Clone for Tween<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            completion: self.completion.clone(),
        }
    }
}

impl<T: Tweenable + 'static> Tween<T> {
    /// Start tweening `properties` (name, end value) on `target` over `total_time` seconds.
    ///
    /// Properties the target does not expose are logged and skipped. An
    /// unknown `easing` name falls back to linear.
    pub fn new(
        clock: &FrameClock,
        target: Rc<RefCell<T>>,
        properties: &[(&str, f32)],
        total_time: f32,
        easing: &str,
    ) -> Self {
        Self::with_easing(clock, target, properties, total_time, Easing::from_name(easing))
    }

    pub fn with_easing(
        clock: &FrameClock,
        target: Rc<RefCell<T>>,
        properties: &[(&str, f32)],
        total_time: f32,
        easing: Easing,
    ) -> Self {
        let tracks: Vec<Track> = {
            let current = target.borrow();
            properties
                .iter()
                .filter_map(|(name, to)| match current.get_property(name) {
                    Some(from) => Some(Track {
                        property: (*name).to_string(),
                        from,
                        to: *to,
                    }),
                    None => {
                        log::warn!("tween target has no property '{}', skipping", name);
                        None
                    }
                })
                .collect()
        };

        let (resolver, completion) = Completion::pair();
        let state = Rc::new(RefCell::new(TweenState {
            target,
            tracks,
            total: total_time.max(0.0),
            elapsed: 0.0,
            easing,
            paused: false,
            finished: false,
            resolver: Some(resolver),
            subscription: None,
            clock: clock.downgrade(),
        }));

        let ticking = Rc::clone(&state);
        let id = clock.subscribe(move |dt| Self::on_tick(&ticking, dt));
        state.borrow_mut().subscription = Some(id);

        Tween { state, completion }
    }

    fn on_tick(state: &Rc<RefCell<TweenState<T>>>, dt: f32) {
        let done = {
            let mut s = state.borrow_mut();
            if s.paused || s.finished {
                return;
            }
            s.elapsed += dt;
            let fraction = if s.total <= 0.0 {
                1.0
            } else {
                (s.elapsed / s.total).min(1.0)
            };
            let done = fraction >= 1.0;
            let eased = s.easing.apply(fraction);
            let mut target = s.target.borrow_mut();
            for track in &s.tracks {
                let value = if done {
                    track.to
                } else {
                    lerp_f32(track.from, track.to, eased)
                };
                target.set_property(&track.property, value);
            }
            drop(target);
            if done {
                s.finished = true;
            }
            done
        };
        if done {
            Self::finish(state, None);
        }
    }

    fn finish(state: &Rc<RefCell<TweenState<T>>>, rejection: Option<Rejection>) {
        let (resolver, subscription, clock) = {
            let mut s = state.borrow_mut();
            (s.resolver.take(), s.subscription.take(), s.clock.clone())
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

    pub fn pause(&self, paused: bool) {
        self.state.borrow_mut().paused = paused;
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    pub fn easing(&self) -> Easing {
        self.state.borrow().easing
    }

    /// Stop where it is and reject the completion. No-op once finished.
    pub fn cancel(&self) {
        {
            let mut s = self.state.borrow_mut();
            if s.finished {
                return;
            }
            s.finished = true;
        }
        Self::finish(&self.state, Some(Rejection::Cancelled));
    }

    pub fn completion(&self) -> Completion<()> {
        self.completion.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionState;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[derive(Default)]
    struct Sprite {
        x: f32,
        alpha: f32,
    }

    impl Tweenable for Sprite {
        fn get_property(&self, name: &str) -> Option<f32> {
            match name {
                "x" => Some(self.x),
                "alpha" => Some(self.alpha),
                _ => None,
            }
        }
        fn set_property(&mut self, name: &str, value: f32) -> bool {
            match name {
                "x" => self.x = value,
                "alpha" => self.alpha = value,
                _ => return false,
            }
            true
        }
    }

    // ==================== EASING TESTS ====================

    #[test]
    fn test_ease_all_types_at_endpoints() {
        for easing in Easing::ALL {
            assert!(approx_eq(easing.apply(0.0), 0.0), "{:?} at 0", easing);
            assert!(approx_eq(easing.apply(1.0), 1.0), "{:?} at 1", easing);
        }
    }

    #[test]
    fn test_ease_clamps_out_of_range_input() {
        for easing in Easing::ALL {
            assert!(approx_eq(easing.apply(-0.5), 0.0));
            assert!(approx_eq(easing.apply(1.5), 1.0));
        }
    }

    #[test]
    fn test_ease_midpoints() {
        assert!(approx_eq(Easing::Linear.apply(0.5), 0.5));
        assert!(approx_eq(Easing::QuadIn.apply(0.5), 0.25));
        assert!(approx_eq(Easing::QuadOut.apply(0.5), 0.75));
        assert!(approx_eq(Easing::CubicIn.apply(0.5), 0.125));
        assert!(approx_eq(Easing::SineInOut.apply(0.5), 0.5));
    }

    #[test]
    fn test_easing_names() {
        assert_eq!("quadInOut".parse::<Easing>(), Ok(Easing::QuadInOut));
        assert_eq!("cubic_out".parse::<Easing>(), Ok(Easing::CubicOut));
        assert_eq!("LINEAR".parse::<Easing>(), Ok(Easing::Linear));
        assert_eq!("bounce".parse::<Easing>(), Err(()));
        assert_eq!(Easing::from_name("bounce"), Easing::Linear);
    }

    // ==================== TWEEN TESTS ====================

    #[test]
    fn test_tween_interpolates_and_completes() {
        let clock = FrameClock::new();
        let sprite = Rc::new(RefCell::new(Sprite::default()));
        let tween = Tween::new(&clock, sprite.clone(), &[("x", 100.0)], 1.0, "linear");

        clock.tick(0.25);
        assert!(approx_eq(sprite.borrow().x, 25.0));
        clock.tick(0.25);
        assert!(approx_eq(sprite.borrow().x, 50.0));
        clock.tick(0.75);
        assert_eq!(sprite.borrow().x, 100.0);
        assert!(tween.is_finished());
        assert_eq!(tween.completion().state(), CompletionState::Resolved);
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn test_zero_time_tween_completes_on_first_tick() {
        let clock = FrameClock::new();
        let sprite = Rc::new(RefCell::new(Sprite { x: 3.0, alpha: 0.1 }));
        let tween = Tween::new(
            &clock,
            sprite.clone(),
            &[("x", 7.3), ("alpha", 1.0)],
            0.0,
            "quadIn",
        );
        assert_eq!(tween.completion().state(), CompletionState::Pending);
        clock.tick(0.016);
        assert_eq!(sprite.borrow().x, 7.3);
        assert_eq!(sprite.borrow().alpha, 1.0);
        assert_eq!(tween.completion().state(), CompletionState::Resolved);
    }

    #[test]
    fn test_unknown_easing_falls_back_to_linear() {
        let clock = FrameClock::new();
        let sprite = Rc::new(RefCell::new(Sprite::default()));
        let tween = Tween::new(&clock, sprite.clone(), &[("x", 10.0)], 2.0, "wobble");
        assert_eq!(tween.easing(), Easing::Linear);
        clock.tick(1.0);
        assert!(approx_eq(sprite.borrow().x, 5.0));
    }

    #[test]
    fn test_unknown_property_is_skipped() {
        let clock = FrameClock::new();
        let sprite = Rc::new(RefCell::new(Sprite::default()));
        let tween = Tween::new(
            &clock,
            sprite.clone(),
            &[("rotation", 90.0), ("x", 4.0)],
            1.0,
            "linear",
        );
        clock.tick(1.0);
        assert_eq!(sprite.borrow().x, 4.0);
        assert!(tween.is_finished());
    }

    #[test]
    fn test_pause_and_cancel() {
        let clock = FrameClock::new();
        let sprite = Rc::new(RefCell::new(Sprite::default()));
        let tween = Tween::new(&clock, sprite.clone(), &[("x", 10.0)], 1.0, "linear");

        tween.pause(true);
        clock.tick(0.5);
        assert_eq!(sprite.borrow().x, 0.0);
        tween.pause(false);
        clock.tick(0.5);
        assert!(approx_eq(sprite.borrow().x, 5.0));

        tween.cancel();
        assert_eq!(tween.completion().take(), Some(Err(Rejection::Cancelled)));
        clock.tick(1.0);
        assert!(approx_eq(sprite.borrow().x, 5.0));
    }
}
