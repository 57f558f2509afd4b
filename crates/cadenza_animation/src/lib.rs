//! Cadenza Animation System
//!
//! Timeline sequencing of independently playable animations.
//!
//! # Features
//!
//! - **Timelines**: One master timeline with its own play state, current time and
//!   signed playback rate, driving child controllers as time passes
//! - **Sequential Scheduling**: Each `add` batch is placed after everything added
//!   before it, with `from`/`to` offsets for overlap and gaps
//! - **Keyframe Animations**: Native controllers that interpolate numeric
//!   properties on targets with their own clock subscription
//! - **Clocks**: Host-driven (`ManualClock`) and wall-clock (`FrameClock`) tick sources
//! - **Easing**: Named easing table with cubic-bezier and steps curves
//! - **Animation Presets**: Built-in and TOML-defined named option records
//! - **Nested Timelines**: A timeline is itself a controller
//!
//! # Example
//!
//! ```rust
//! use cadenza_animation::{AddOptions, KeyframeSpec, ManualClock, Target, Timeline};
//! use std::rc::Rc;
//!
//! let clock = Rc::new(ManualClock::new());
//! let card = Target::new("card").with_property("opacity", 0.0);
//!
//! let timeline = Timeline::new(clock.clone());
//! timeline
//!     .add(
//!         AddOptions::new(card.clone())
//!             .duration(1000.0)
//!             .keyframe(KeyframeSpec::new().prop("opacity", 0.0))
//!             .keyframe(KeyframeSpec::new().prop("opacity", 1.0)),
//!     )
//!     .unwrap();
//!
//! assert_eq!(timeline.duration(), 1000.0);
//!
//! timeline.pause().set_current_time(500.0);
//! assert_eq!(card.property("opacity"), Some(0.5));
//! ```

pub mod clock;
pub mod controller;
pub mod easing;
pub mod keyframe;
pub mod options;
pub mod presets;
pub mod segment;
pub mod target;
pub mod timeline;

pub use clock::{Clock, FrameClock, ManualClock, TickCallback, TickSubscription};
pub use controller::{
    AnimationTiming, ControllerFactory, KeyframeAnimation, KeyframeAnimationFactory,
};
pub use easing::Easing;
pub use keyframe::{normalize_keyframes, sample, Keyframe, KeyframeSpec};
pub use options::{AddBatch, AddOptions};
pub use presets::{PresetDefinition, PresetEntry, PresetLookup, PresetRegistry};
pub use segment::{Direction, Placement, Segment, SegmentTable, ACTIVATION_PADDING};
pub use target::{Target, TargetRef, TargetRegistry, TargetResolver};
pub use timeline::{Timeline, TimelineBuilder, TimelineEvent, CANCEL, FINISH, PAUSE, PLAY, SET};

pub use cadenza_core::{CadenzaError, Controller, EventBus, ListenerId, PlayState, Result};
