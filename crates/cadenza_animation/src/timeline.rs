//! Timeline engine
//!
//! A [`Timeline`] owns a segment table, a current time, a signed playback
//! rate and a play state. It subscribes to a [`Clock`] while playing and, on
//! every tick, advances its time and arms the segments whose window holds it.
//!
//! Lifecycle transitions (`play`, `pause`, `cancel`, `finish`) are applied to
//! the timeline state first and then announced on the timeline's
//! [`EventBus`], so a listener always observes the state the transition
//! produced. Listeners may call back into the timeline.
//!
//! Controllers are driven with the segment table detached from the
//! timeline state, so a nested timeline's listeners may read or drive their
//! parent while the parent is driving them.
//!
//! # Example
//!
//! ```rust
//! use cadenza_animation::{
//!     AddOptions, KeyframeSpec, ManualClock, PlayState, Target, Timeline, FINISH,
//! };
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let clock = Rc::new(ManualClock::new());
//! let dot = Target::new("dot");
//!
//! let timeline = Timeline::new(clock.clone());
//! timeline
//!     .add(
//!         AddOptions::new(dot.clone())
//!             .duration(100.0)
//!             .keyframe(KeyframeSpec::new().prop("x", 0.0))
//!             .keyframe(KeyframeSpec::new().prop("x", 50.0)),
//!     )
//!     .unwrap();
//!
//! let finished = Rc::new(Cell::new(false));
//! let flag = finished.clone();
//! timeline.on(FINISH, move |_| flag.set(true));
//!
//! for _ in 0..10 {
//!     clock.advance(16.0);
//! }
//!
//! assert!(finished.get());
//! assert_eq!(timeline.play_state(), PlayState::Finished);
//! assert_eq!(dot.property("translateX"), Some(50.0));
//! ```

use crate::clock::{Clock, TickSubscription};
use crate::controller::{AnimationTiming, ControllerFactory, KeyframeAnimationFactory};
use crate::easing::Easing;
use crate::keyframe::normalize_keyframes;
use crate::options::{AddBatch, AddOptions};
use crate::presets::{PresetLookup, PresetRegistry};
use crate::segment::{Segment, SegmentTable};
use crate::target::{TargetRegistry, TargetResolver};
use cadenza_core::{CadenzaError, Controller, EventBus, ListenerId, PlayState, Result};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Announced after `play()`
pub const PLAY: &str = "play";
/// Announced after `pause()`, and on ticks received while paused
pub const PAUSE: &str = "pause";
/// Announced after `cancel()`
pub const CANCEL: &str = "cancel";
/// Announced after `finish()`, including when time runs out
pub const FINISH: &str = "finish";
/// Announced after the play state is set through `set_play_state()`
pub const SET: &str = "set";

/// Snapshot of a timeline delivered to listeners
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineEvent {
    pub topic: &'static str,
    pub play_state: PlayState,
    pub current_time: Option<f64>,
    pub playback_rate: f64,
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transition {
    Play,
    Pause,
    Cancel,
    Finish,
}

impl Transition {
    fn topic(self) -> &'static str {
        match self {
            Transition::Play => PLAY,
            Transition::Pause => PAUSE,
            Transition::Cancel => CANCEL,
            Transition::Finish => FINISH,
        }
    }
}

/// What a transition needs from the clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClockRequest {
    Subscribe,
    Unsubscribe,
}

/// Result of advancing the timeline by one tick
#[derive(Clone, Copy, Debug, PartialEq)]
enum TickOutcome {
    Advanced { time: f64, rate: f64 },
    Announce(Transition),
}

#[derive(Debug, Default)]
struct TimelineState {
    current_time: Option<f64>,
    play_state: PlayState,
    playback_rate: f64,
    segments: SegmentTable,
    duration: f64,
    subscription: Option<TickSubscription>,
    /// Bumped by every cancel
    epoch: u64,
}

/// Apply a lifecycle transition to the timeline state
fn apply_transition(state: &mut TimelineState, transition: Transition) -> ClockRequest {
    match transition {
        Transition::Play => {
            state.play_state = PlayState::Pending;
            ClockRequest::Subscribe
        }
        Transition::Pause => {
            state.play_state = PlayState::Paused;
            ClockRequest::Unsubscribe
        }
        Transition::Cancel => {
            state.play_state = PlayState::Idle;
            state.current_time = None;
            state.duration = 0.0;
            state.epoch += 1;
            ClockRequest::Unsubscribe
        }
        Transition::Finish => {
            state.play_state = PlayState::Finished;
            state.current_time = Some(0.0);
            ClockRequest::Unsubscribe
        }
    }
}

/// Carry a lifecycle transition to the segment controllers
fn drive_segments(segments: &mut SegmentTable, transition: Transition, rate: f64) {
    match transition {
        Transition::Play => segments.disarm_all(),
        Transition::Pause => segments.pause_all(),
        Transition::Cancel => segments.cancel_all(),
        Transition::Finish => segments.finish_all(rate),
    }
}

/// Advance the state by one clock delta
fn advance(state: &mut TimelineState, delta: f64) -> TickOutcome {
    match state.play_state {
        PlayState::Idle => return TickOutcome::Announce(Transition::Cancel),
        PlayState::Finished => return TickOutcome::Announce(Transition::Finish),
        PlayState::Paused => return TickOutcome::Announce(Transition::Pause),
        PlayState::Pending | PlayState::Running => {}
    }

    let rate = state.playback_rate;
    let duration = state.duration;
    let (range_start, range_end) = if rate < 0.0 {
        (duration, 0.0)
    } else {
        (0.0, duration)
    };

    if state.play_state == PlayState::Pending {
        // Resume mid-range; restart from the near edge otherwise
        match state.current_time {
            Some(time) if time != range_end => {}
            _ => state.current_time = Some(range_start),
        }
        state.play_state = PlayState::Running;
    }

    let time = state.current_time.unwrap_or(range_start) + delta * rate;
    state.current_time = Some(time);

    if !(0.0..=duration).contains(&time) {
        return TickOutcome::Announce(Transition::Finish);
    }
    TickOutcome::Advanced { time, rate }
}

struct TimelineInner {
    state: RefCell<TimelineState>,
    events: EventBus<TimelineEvent>,
    clock: Rc<dyn Clock>,
    resolver: Rc<dyn TargetResolver>,
    presets: Rc<dyn PresetLookup>,
    factory: Rc<dyn ControllerFactory>,
}

impl TimelineInner {
    fn transition(self: &Rc<Self>, transition: Transition) {
        let (request, rate) = {
            let mut state = self.state.borrow_mut();
            (apply_transition(&mut state, transition), state.playback_rate)
        };
        self.with_segments(|segments| drive_segments(segments, transition, rate));

        match request {
            ClockRequest::Subscribe => self.subscribe(),
            ClockRequest::Unsubscribe => self.unsubscribe(),
        }
        debug!("Timeline {}", transition.topic());
        self.announce(transition.topic());
    }

    /// Drive the segment controllers without holding the state borrow
    ///
    /// Controllers (nested timelines in particular) may call back into this
    /// timeline. While `f` runs the table is detached: segments added in the
    /// meantime are kept after the detached ones, and if the timeline was
    /// cancelled in the meantime the detached segments are cancelled too.
    fn with_segments<R>(&self, f: impl FnOnce(&mut SegmentTable) -> R) -> R {
        let (mut segments, epoch) = {
            let mut state = self.state.borrow_mut();
            (mem::take(&mut state.segments), state.epoch)
        };

        let result = f(&mut segments);

        let mut state = self.state.borrow_mut();
        if state.epoch == epoch {
            let added = mem::replace(&mut state.segments, segments);
            state.segments.extend(added);
        } else {
            drop(state);
            segments.cancel_all();
        }
        result
    }

    /// Ensure exactly one clock subscription
    fn subscribe(self: &Rc<Self>) {
        if self.state.borrow().subscription.is_some() {
            return;
        }
        let weak: Weak<TimelineInner> = Rc::downgrade(self);
        let subscription = self.clock.subscribe(Rc::new(move |delta, _elapsed| {
            if let Some(inner) = weak.upgrade() {
                inner.on_tick(delta);
            }
        }));
        self.state.borrow_mut().subscription = Some(subscription);
    }

    fn unsubscribe(&self) {
        let subscription = self.state.borrow_mut().subscription.take();
        if let Some(subscription) = subscription {
            self.clock.unsubscribe(subscription);
        }
    }

    fn on_tick(self: &Rc<Self>, delta: f64) {
        let outcome = advance(&mut self.state.borrow_mut(), delta);
        match outcome {
            TickOutcome::Advanced { time, rate } => {
                let activated = self.with_segments(|segments| segments.activate(time, rate));
                trace!("Timeline tick at {time}ms, {activated} segment(s) armed");
            }
            TickOutcome::Announce(transition) => self.transition(transition),
        }
    }

    fn announce(&self, topic: &'static str) {
        let event = {
            let state = self.state.borrow();
            TimelineEvent {
                topic,
                play_state: state.play_state,
                current_time: state.current_time,
                playback_rate: state.playback_rate,
                duration: state.duration,
            }
        };
        self.events.trigger(topic, &event);
    }

    /// Turn one options record into segments placed after `basis`
    fn build_segments(&self, mut options: AddOptions, basis: f64) -> Result<Vec<Segment>> {
        if let Some(name) = options.preset.clone() {
            let preset = self.presets.lookup(&name).ok_or_else(|| {
                CadenzaError::invalid_arg("preset", format!("unknown preset `{name}`"))
            })?;
            options.inherit(&preset);
        }

        let targets = options
            .targets
            .as_ref()
            .ok_or_else(|| CadenzaError::invalid_arg("targets", "no targets given"))?;
        let duration = options
            .duration
            .ok_or_else(|| CadenzaError::invalid_arg("duration", "no duration given"))?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(CadenzaError::invalid_arg(
                "duration",
                format!("expected a non-negative number, got {duration}"),
            ));
        }
        let from = finite_offset("from", options.from)?;
        let to = finite_offset("to", options.to)?;

        let entities = self.resolver.resolve(targets);
        if entities.is_empty() {
            debug!("Timeline add resolved no targets for {targets:?}");
            return Ok(Vec::new());
        }

        let easing = Easing::resolve(options.easing.as_deref().unwrap_or("linear"));
        let keyframes = if options.keyframes.is_empty() {
            Vec::new()
        } else {
            normalize_keyframes(&options.keyframes)?
        };

        let start = basis + from;
        let segments = entities
            .into_iter()
            .map(|target| {
                let timing = AnimationTiming {
                    duration,
                    easing: easing.clone(),
                };
                let controller = self.factory.create(target, keyframes.clone(), timing);
                let end = (basis + to).max(start + controller.total_duration());
                Segment::new(start, end, controller)
            })
            .collect();
        Ok(segments)
    }
}

fn finite_offset(field: &str, value: Option<f64>) -> Result<f64> {
    let value = value.unwrap_or(0.0);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CadenzaError::invalid_arg(
            field,
            format!("expected a finite offset, got {value}"),
        ))
    }
}

impl Drop for TimelineInner {
    fn drop(&mut self) {
        if let Some(subscription) = self.state.get_mut().subscription.take() {
            self.clock.unsubscribe(subscription);
        }
    }
}

/// A master timeline sequencing controllers on a shared clock
///
/// `Timeline` is a cheap handle; clones drive the same timeline.
#[derive(Clone)]
pub struct Timeline {
    inner: Rc<TimelineInner>,
}

impl Timeline {
    /// Create a timeline with the default collaborators and start it
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self::builder(clock).build()
    }

    pub fn builder(clock: Rc<dyn Clock>) -> TimelineBuilder {
        TimelineBuilder::new(clock)
    }

    /// Append one or more options records
    ///
    /// Every record of the batch is placed relative to the duration the
    /// timeline had before this call. Nothing is added if any record fails.
    pub fn add(&self, batch: impl Into<AddBatch>) -> Result<&Self> {
        let AddBatch(records) = batch.into();
        let basis = self.duration();

        let mut built = Vec::new();
        for options in records {
            built.extend(self.inner.build_segments(options, basis)?);
        }

        let count = built.len();
        let mut state = self.inner.state.borrow_mut();
        state.segments.extend(built);
        state.duration = state.duration.max(state.segments.duration());
        debug!(
            "Timeline added {count} segment(s) after {basis}ms, duration {}ms",
            state.duration
        );
        Ok(self)
    }

    /// Append a prebuilt controller `offset` after the current end
    ///
    /// The segment spans the controller's own duration.
    pub fn add_controller(&self, offset: f64, controller: Box<dyn Controller>) -> &Self {
        let mut state = self.inner.state.borrow_mut();
        let start = state.duration + offset;
        let end = start + controller.total_duration();
        state.segments.push(Segment::new(start, end, controller));
        state.duration = state.duration.max(end);
        self
    }

    pub fn play(&self) -> &Self {
        self.inner.transition(Transition::Play);
        self
    }

    pub fn pause(&self) -> &Self {
        self.inner.transition(Transition::Pause);
        self
    }

    /// Stop, unsubscribe, cancel every controller and discard the segments
    pub fn cancel(&self) -> &Self {
        self.inner.transition(Transition::Cancel);
        self
    }

    /// Finish every controller and pin the current time to 0
    pub fn finish(&self) -> &Self {
        self.inner.transition(Transition::Finish);
        self
    }

    pub fn reverse(&self) -> &Self {
        let rate = self.playback_rate();
        self.set_playback_rate(-rate)
    }

    /// Move to a time and bring every controller to its matching local time
    ///
    /// Segments are armed on the next tick, not by this call.
    pub fn set_current_time(&self, time: f64) -> &Self {
        if !time.is_finite() {
            return self;
        }
        let rate = {
            let mut state = self.inner.state.borrow_mut();
            state.current_time = Some(time);
            state.playback_rate
        };
        self.inner.with_segments(|segments| segments.resync(time, rate));
        self
    }

    pub fn set_playback_rate(&self, rate: f64) -> &Self {
        if !rate.is_finite() {
            return self;
        }
        let mut state = self.inner.state.borrow_mut();
        state.playback_rate = rate;
        state.segments.disarm_all();
        self
    }

    /// Set the play state through its transition, then announce [`SET`]
    pub fn set_play_state(&self, play_state: PlayState) -> &Self {
        let transition = match play_state {
            PlayState::Idle => Transition::Cancel,
            PlayState::Pending | PlayState::Running => Transition::Play,
            PlayState::Paused => Transition::Pause,
            PlayState::Finished => Transition::Finish,
        };
        self.inner.transition(transition);
        self.inner.announce(SET);
        self
    }

    /// Current time, `None` before the first tick and after `cancel()`
    pub fn current_time(&self) -> Option<f64> {
        self.inner.state.borrow().current_time
    }

    pub fn playback_rate(&self) -> f64 {
        self.inner.state.borrow().playback_rate
    }

    /// Latest end offset across all segments
    pub fn duration(&self) -> f64 {
        self.inner.state.borrow().duration
    }

    pub fn play_state(&self) -> PlayState {
        self.inner.state.borrow().play_state
    }

    pub fn segment_count(&self) -> usize {
        self.inner.state.borrow().segments.len()
    }

    /// `(start, end)` of every segment, in insertion order
    pub fn segment_offsets(&self) -> Vec<(f64, f64)> {
        self.inner
            .state
            .borrow()
            .segments
            .iter()
            .map(|segment| (segment.start_offset(), segment.end_offset()))
            .collect()
    }

    /// Listen to a lifecycle topic
    pub fn on<F>(&self, topic: &str, listener: F) -> ListenerId
    where
        F: Fn(&TimelineEvent) + 'static,
    {
        self.inner.events.on(topic, listener)
    }

    pub fn off(&self, topic: &str, id: ListenerId) -> bool {
        self.inner.events.off(topic, id)
    }
}

impl Controller for Timeline {
    fn play(&mut self) {
        Timeline::play(self);
    }

    fn pause(&mut self) {
        Timeline::pause(self);
    }

    fn cancel(&mut self) {
        Timeline::cancel(self);
    }

    fn finish(&mut self) {
        Timeline::finish(self);
    }

    fn seek(&mut self, time: f64) {
        Timeline::set_current_time(self, time);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        Timeline::set_playback_rate(self, rate);
    }

    fn reverse(&mut self) {
        Timeline::reverse(self);
    }

    fn play_state(&self) -> PlayState {
        Timeline::play_state(self)
    }

    fn set_play_state(&mut self, state: PlayState) {
        Timeline::set_play_state(self, state);
    }

    fn total_duration(&self) -> f64 {
        self.duration()
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Timeline")
            .field("play_state", &state.play_state)
            .field("current_time", &state.current_time)
            .field("playback_rate", &state.playback_rate)
            .field("duration", &state.duration)
            .field("segments", &state.segments.len())
            .finish()
    }
}

/// Configures the collaborators of a [`Timeline`]
pub struct TimelineBuilder {
    clock: Rc<dyn Clock>,
    resolver: Option<Rc<dyn TargetResolver>>,
    presets: Option<Rc<dyn PresetLookup>>,
    factory: Option<Rc<dyn ControllerFactory>>,
    autoplay: bool,
    playback_rate: f64,
}

impl TimelineBuilder {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            resolver: None,
            presets: None,
            factory: None,
            autoplay: true,
            playback_rate: 1.0,
        }
    }

    /// Resolver for target references (default: an empty [`TargetRegistry`],
    /// which still resolves entity references)
    pub fn resolver(mut self, resolver: Rc<dyn TargetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Preset lookup (default: [`PresetRegistry::with_builtins`])
    pub fn presets(mut self, presets: Rc<dyn PresetLookup>) -> Self {
        self.presets = Some(presets);
        self
    }

    /// Controller factory (default: keyframe animations on the same clock)
    pub fn factory(mut self, factory: Rc<dyn ControllerFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Start playing on creation (default: true)
    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn playback_rate(mut self, rate: f64) -> Self {
        self.playback_rate = rate;
        self
    }

    pub fn build(self) -> Timeline {
        let clock = self.clock;
        let factory = self
            .factory
            .unwrap_or_else(|| Rc::new(KeyframeAnimationFactory::new(clock.clone())));
        let playback_rate = if self.playback_rate.is_finite() {
            self.playback_rate
        } else {
            1.0
        };

        let timeline = Timeline {
            inner: Rc::new(TimelineInner {
                state: RefCell::new(TimelineState {
                    playback_rate,
                    ..TimelineState::default()
                }),
                events: EventBus::new(),
                clock,
                resolver: self
                    .resolver
                    .unwrap_or_else(|| Rc::new(TargetRegistry::new())),
                presets: self
                    .presets
                    .unwrap_or_else(|| Rc::new(PresetRegistry::with_builtins())),
                factory,
            }),
        };

        if self.autoplay {
            timeline.play();
        }
        timeline
    }
}
