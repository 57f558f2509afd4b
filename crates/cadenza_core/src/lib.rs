//! Cadenza Core
//!
//! Foundational primitives shared by every Cadenza crate:
//!
//! - **Play States**: The lifecycle vocabulary (`idle`, `pending`, `running`, `paused`, `finished`)
//! - **Controllers**: The capability set every playable animation implements
//! - **Event Dispatch**: Topic keyed publish/subscribe for lifecycle notifications
//! - **Errors**: The error taxonomy surfaced by scheduling calls
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::{EventBus, PlayState};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let bus: EventBus<PlayState> = EventBus::new();
//! let seen = Rc::new(Cell::new(PlayState::Idle));
//!
//! let seen_clone = seen.clone();
//! let id = bus.on("set", move |state| seen_clone.set(*state));
//!
//! bus.trigger("set", &PlayState::Running);
//! assert_eq!(seen.get(), PlayState::Running);
//!
//! bus.off("set", id);
//! ```

pub mod controller;
pub mod error;
pub mod events;
pub mod state;

pub use controller::Controller;
pub use error::{CadenzaError, Result};
pub use events::{EventBus, Listener, ListenerId};
pub use state::PlayState;
