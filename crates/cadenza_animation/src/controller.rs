//! Native keyframe controller
//!
//! [`KeyframeAnimation`] is the platform-level animation a timeline schedules
//! for every resolved target. It owns its local time, play state and
//! playback rate, subscribes to the shared [`Clock`] while running, and stops
//! itself when its local time leaves `0..=duration`. Every time its local
//! time changes it writes the interpolated properties into its [`Target`].
//!
//! Keyframes that leave the start or end open (a single end-state keyframe,
//! or offsets that do not reach 0 and 1) are completed from the target's
//! current values. This happens on first use rather than at construction so
//! the values are those the target has when the animation actually starts.

use crate::clock::{Clock, TickSubscription};
use crate::easing::Easing;
use crate::keyframe::{sample, Keyframe};
use crate::target::Target;
use cadenza_core::{Controller, PlayState};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Timing of a single animation
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationTiming {
    /// Length in milliseconds
    pub duration: f64,
    /// Curve applied to overall progress
    pub easing: Easing,
}

impl AnimationTiming {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            easing: Easing::Linear,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

struct AnimationState {
    target: Target,
    clock: Rc<dyn Clock>,
    /// Keyframes waiting for first use
    deferred: Option<Vec<Keyframe>>,
    keyframes: Vec<Keyframe>,
    /// Values the target had before this animation touched it
    initial: Vec<(String, Option<f64>)>,
    timing: AnimationTiming,
    local_time: f64,
    playback_rate: f64,
    play_state: PlayState,
    subscription: Option<TickSubscription>,
}

impl AnimationState {
    fn ensure_init(&mut self) {
        let Some(mut frames) = self.deferred.take() else {
            return;
        };

        let names: IndexSet<String> = frames
            .iter()
            .flat_map(|frame| frame.properties.keys().cloned())
            .collect();
        self.initial = names
            .iter()
            .map(|name| (name.clone(), self.target.property(name)))
            .collect();

        // Implicit keyframes take the target's current values, or the first
        // declared value if the target has none
        let current: IndexMap<String, f64> = names
            .iter()
            .filter_map(|name| {
                let value = self.target.property(name).or_else(|| {
                    frames
                        .iter()
                        .find_map(|frame| frame.properties.get(name).copied())
                })?;
                Some((name.clone(), value))
            })
            .collect();

        if frames.first().is_some_and(|frame| frame.offset > 0.0) {
            frames.insert(0, Keyframe::new(0.0, current.clone()));
        }
        if frames.last().is_some_and(|frame| frame.offset < 1.0) {
            frames.push(Keyframe::new(1.0, current));
        }
        self.keyframes = frames;
    }

    fn progress(&self) -> f64 {
        let duration = self.timing.duration;
        if duration > 0.0 {
            (self.local_time / duration).clamp(0.0, 1.0)
        } else if self.play_state == PlayState::Idle || self.playback_rate < 0.0 {
            0.0
        } else {
            1.0
        }
    }

    fn render(&self) {
        let progress = self.timing.easing.apply(self.progress());
        for (name, value) in sample(&self.keyframes, progress) {
            self.target.set_property(name, value);
        }
    }

    fn restore(&self) {
        for (name, value) in &self.initial {
            match value {
                Some(value) => self.target.set_property(name.clone(), *value),
                None => {
                    self.target.remove_property(name);
                }
            }
        }
    }

    fn ensure_subscribed(&mut self, weak: Weak<RefCell<AnimationState>>) {
        if self.subscription.is_some() {
            return;
        }
        let subscription = self.clock.subscribe(Rc::new(move |delta, _elapsed| {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().on_tick(delta);
            }
        }));
        self.subscription = Some(subscription);
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.clock.unsubscribe(subscription);
        }
    }

    fn on_tick(&mut self, delta: f64) {
        if self.play_state != PlayState::Running {
            self.release();
            return;
        }

        let duration = self.timing.duration;
        self.local_time += delta * self.playback_rate;

        let done = if self.playback_rate >= 0.0 {
            self.local_time >= duration
        } else {
            self.local_time <= 0.0
        };
        if done {
            self.local_time = self.local_time.clamp(0.0, duration);
            self.play_state = PlayState::Finished;
            self.release();
            tracing::trace!("KeyframeAnimation `{}` finished", self.target.id());
        }
        self.render();
    }
}

/// A keyframe animation of one target, driven by its own clock subscription
pub struct KeyframeAnimation {
    state: Rc<RefCell<AnimationState>>,
}

impl KeyframeAnimation {
    pub fn new(
        target: Target,
        keyframes: Vec<Keyframe>,
        timing: AnimationTiming,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let timing = AnimationTiming {
            duration: timing.duration.max(0.0),
            ..timing
        };
        Self {
            state: Rc::new(RefCell::new(AnimationState {
                target,
                clock,
                deferred: Some(keyframes),
                keyframes: Vec::new(),
                initial: Vec::new(),
                timing,
                local_time: 0.0,
                playback_rate: 1.0,
                play_state: PlayState::Idle,
                subscription: None,
            })),
        }
    }

    pub fn target(&self) -> Target {
        self.state.borrow().target.clone()
    }

    /// Local time in milliseconds
    pub fn current_time(&self) -> f64 {
        self.state.borrow().local_time
    }

    /// Linear progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        self.state.borrow().progress()
    }

    pub fn playback_rate(&self) -> f64 {
        self.state.borrow().playback_rate
    }

    pub fn timing(&self) -> AnimationTiming {
        self.state.borrow().timing.clone()
    }
}

impl Controller for KeyframeAnimation {
    fn play(&mut self) {
        let weak = Rc::downgrade(&self.state);
        let mut state = self.state.borrow_mut();
        state.ensure_init();

        let duration = state.timing.duration;
        if duration <= 0.0 {
            state.play_state = PlayState::Finished;
            state.release();
            state.render();
            return;
        }

        // Playing from the far edge restarts from the near one
        if state.playback_rate >= 0.0 {
            if state.local_time >= duration {
                state.local_time = 0.0;
            }
        } else if state.local_time <= 0.0 {
            state.local_time = duration;
        }

        state.play_state = PlayState::Running;
        state.ensure_subscribed(weak);
        state.render();
    }

    fn pause(&mut self) {
        let mut state = self.state.borrow_mut();
        state.release();

        // Never started: nothing to hold on screen
        let started = state.play_state != PlayState::Idle;
        state.play_state = PlayState::Paused;
        if started {
            state.ensure_init();
            state.render();
        }
    }

    fn cancel(&mut self) {
        let mut state = self.state.borrow_mut();
        state.release();
        state.play_state = PlayState::Idle;
        state.local_time = 0.0;
        state.restore();
    }

    fn finish(&mut self) {
        let mut state = self.state.borrow_mut();
        state.ensure_init();
        state.local_time = if state.playback_rate >= 0.0 {
            state.timing.duration
        } else {
            0.0
        };
        state.play_state = PlayState::Finished;
        state.release();
        state.render();
    }

    fn seek(&mut self, time: f64) {
        if !time.is_finite() {
            return;
        }
        let mut state = self.state.borrow_mut();
        state.ensure_init();

        let duration = state.timing.duration;
        state.local_time = time.clamp(0.0, duration);

        let at_edge = if state.playback_rate >= 0.0 {
            state.local_time >= duration
        } else {
            state.local_time <= 0.0
        };
        match state.play_state {
            PlayState::Idle => state.play_state = PlayState::Paused,
            PlayState::Finished if !at_edge => state.play_state = PlayState::Paused,
            _ => {}
        }
        state.render();
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if rate.is_finite() {
            self.state.borrow_mut().playback_rate = rate;
        }
    }

    fn reverse(&mut self) {
        let mut state = self.state.borrow_mut();
        state.playback_rate = -state.playback_rate;
    }

    fn play_state(&self) -> PlayState {
        self.state.borrow().play_state
    }

    fn total_duration(&self) -> f64 {
        self.state.borrow().timing.duration
    }
}

impl Drop for KeyframeAnimation {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.release();
        }
    }
}

impl fmt::Debug for KeyframeAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("KeyframeAnimation")
            .field("target", &state.target.id())
            .field("duration", &state.timing.duration)
            .field("local_time", &state.local_time)
            .field("playback_rate", &state.playback_rate)
            .field("play_state", &state.play_state)
            .finish()
    }
}

/// Builds the controller for each resolved target of an `add` call
pub trait ControllerFactory {
    fn create(
        &self,
        target: Target,
        keyframes: Vec<Keyframe>,
        timing: AnimationTiming,
    ) -> Box<dyn Controller>;
}

/// Factory producing [`KeyframeAnimation`]s on a shared clock
pub struct KeyframeAnimationFactory {
    clock: Rc<dyn Clock>,
}

impl KeyframeAnimationFactory {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl ControllerFactory for KeyframeAnimationFactory {
    fn create(
        &self,
        target: Target,
        keyframes: Vec<Keyframe>,
        timing: AnimationTiming,
    ) -> Box<dyn Controller> {
        Box::new(KeyframeAnimation::new(
            target,
            keyframes,
            timing,
            self.clock.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::keyframe::{normalize_keyframes, KeyframeSpec};

    fn fade(clock: &Rc<ManualClock>, target: &Target, duration: f64) -> KeyframeAnimation {
        let frames = normalize_keyframes(&[
            KeyframeSpec::new().prop("opacity", 0.0),
            KeyframeSpec::new().prop("opacity", 1.0),
        ])
        .unwrap();
        KeyframeAnimation::new(
            target.clone(),
            frames,
            AnimationTiming::new(duration),
            clock.clone(),
        )
    }

    #[test]
    fn test_runs_on_own_clock_and_finishes() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box");
        let mut anim = fade(&clock, &target, 100.0);

        anim.play();
        assert_eq!(anim.play_state(), PlayState::Running);
        assert_eq!(target.property("opacity"), Some(0.0));
        assert_eq!(clock.subscriber_count(), 1);

        clock.advance(25.0);
        assert_eq!(anim.current_time(), 25.0);
        assert_eq!(target.property("opacity"), Some(0.25));

        clock.advance(100.0);
        assert_eq!(anim.play_state(), PlayState::Finished);
        assert_eq!(anim.current_time(), 100.0);
        assert_eq!(target.property("opacity"), Some(1.0));
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn test_seek_renders_without_playing() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box");
        let mut anim = fade(&clock, &target, 1000.0);

        anim.seek(500.0);
        assert_eq!(anim.progress(), 0.5);
        assert_eq!(target.property("opacity"), Some(0.5));
        assert_eq!(anim.play_state(), PlayState::Paused);
        assert_eq!(clock.subscriber_count(), 0);

        // Clamped to the animation's own length
        anim.seek(5000.0);
        assert_eq!(anim.current_time(), 1000.0);
    }

    #[test]
    fn test_single_keyframe_starts_from_target() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box").with_property("scale", 2.0);
        let frames = normalize_keyframes(&[KeyframeSpec::new().prop("scale", 4.0)]).unwrap();
        let mut anim =
            KeyframeAnimation::new(target.clone(), frames, AnimationTiming::new(100.0), clock);

        anim.seek(50.0);
        assert_eq!(target.property("scale"), Some(3.0));
    }

    #[test]
    fn test_cancel_restores_target() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box").with_property("opacity", 0.3);
        let mut anim = fade(&clock, &target, 100.0);

        anim.play();
        clock.advance(50.0);
        assert_eq!(target.property("opacity"), Some(0.5));

        anim.cancel();
        assert_eq!(anim.play_state(), PlayState::Idle);
        assert_eq!(anim.current_time(), 0.0);
        assert_eq!(target.property("opacity"), Some(0.3));
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn test_reverse_plays_from_end() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box");
        let mut anim = fade(&clock, &target, 100.0);

        anim.set_playback_rate(-1.0);
        anim.play();
        assert_eq!(anim.current_time(), 100.0);

        clock.advance(40.0);
        assert_eq!(anim.current_time(), 60.0);

        clock.advance(100.0);
        assert_eq!(anim.play_state(), PlayState::Finished);
        assert_eq!(target.property("opacity"), Some(0.0));

        anim.reverse();
        assert_eq!(anim.playback_rate(), 1.0);
    }

    #[test]
    fn test_finish_and_restart() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box");
        let mut anim = fade(&clock, &target, 100.0);

        anim.finish();
        assert_eq!(anim.play_state(), PlayState::Finished);
        assert_eq!(target.property("opacity"), Some(1.0));

        anim.play();
        assert_eq!(anim.current_time(), 0.0);
        assert_eq!(anim.play_state(), PlayState::Running);
    }

    #[test]
    fn test_pause_stops_time() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box");
        let mut anim = fade(&clock, &target, 100.0);

        anim.play();
        clock.advance(30.0);
        anim.pause();
        clock.advance(30.0);

        assert_eq!(anim.current_time(), 30.0);
        assert_eq!(anim.play_state(), PlayState::Paused);

        anim.play();
        clock.advance(10.0);
        assert_eq!(anim.current_time(), 40.0);
    }

    #[test]
    fn test_pause_before_start_leaves_target() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box").with_property("opacity", 0.4);
        let mut anim = fade(&clock, &target, 100.0);

        anim.pause();

        assert_eq!(anim.play_state(), PlayState::Paused);
        assert_eq!(target.property("opacity"), Some(0.4));

        anim.seek(50.0);
        assert_eq!(target.property("opacity"), Some(0.5));
    }

    #[test]
    fn test_zero_duration_finishes_on_play() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box");
        let mut anim = fade(&clock, &target, 0.0);

        anim.play();
        assert_eq!(anim.play_state(), PlayState::Finished);
        assert_eq!(target.property("opacity"), Some(1.0));
    }

    #[test]
    fn test_drop_releases_subscription() {
        let clock = Rc::new(ManualClock::new());
        let target = Target::new("box");
        let mut anim = fade(&clock, &target, 100.0);

        anim.play();
        assert_eq!(clock.subscriber_count(), 1);
        drop(anim);
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn test_factory_builds_boxed_controller() {
        let clock = Rc::new(ManualClock::new());
        let factory = KeyframeAnimationFactory::new(clock.clone());
        let frames = normalize_keyframes(&[KeyframeSpec::new().prop("opacity", 1.0)]).unwrap();

        let mut controller = factory.create(
            Target::new("box"),
            frames,
            AnimationTiming::new(250.0).with_easing(Easing::resolve("easeIn")),
        );

        assert_eq!(controller.total_duration(), 250.0);
        controller.set_play_state(PlayState::Running);
        assert_eq!(controller.play_state(), PlayState::Running);
    }
}
