//! Tick sources
//!
//! A [`Clock`] periodically delivers `(delta, elapsed_total)` to its
//! subscribers. Timelines subscribe while they are pending or running, and
//! keyframe animations subscribe while they play.
//!
//! Two clocks are provided:
//! - [`ManualClock`] - advanced explicitly by the host (tests, offline rendering)
//! - [`FrameClock`] - measures wall-clock time between calls to [`FrameClock::tick`]
//!
//! Ticks are delivered sequentially to the subscribers registered when the
//! delivery started. A subscriber removed during delivery is skipped; one
//! added during delivery receives the next tick.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

new_key_type! {
    /// Handle to a clock subscription
    pub struct TickSubscription;
}

/// Callback receiving `(delta, elapsed_total)` in milliseconds
pub type TickCallback = Rc<dyn Fn(f64, f64)>;

/// A source of ticks
pub trait Clock {
    /// Start receiving ticks
    fn subscribe(&self, callback: TickCallback) -> TickSubscription;

    /// Stop receiving ticks
    ///
    /// Returns `false` if the subscription was already gone.
    fn unsubscribe(&self, subscription: TickSubscription) -> bool;
}

/// Subscriber storage shared by the clock implementations
#[derive(Default)]
struct Subscribers {
    callbacks: SlotMap<TickSubscription, TickCallback>,
    /// Delivery order (subscription order)
    order: Vec<TickSubscription>,
    elapsed: f64,
}

impl Subscribers {
    fn insert(&mut self, callback: TickCallback) -> TickSubscription {
        let key = self.callbacks.insert(callback);
        self.order.push(key);
        key
    }

    fn remove(&mut self, key: TickSubscription) -> bool {
        if self.callbacks.remove(key).is_none() {
            return false;
        }
        self.order.retain(|k| *k != key);
        true
    }
}

fn deliver(subscribers: &RefCell<Subscribers>, delta: f64) {
    let (elapsed, snapshot) = {
        let mut subs = subscribers.borrow_mut();
        subs.elapsed += delta;
        let snapshot: SmallVec<[TickSubscription; 8]> = subs.order.iter().copied().collect();
        (subs.elapsed, snapshot)
    };

    for key in snapshot {
        let callback = subscribers.borrow().callbacks.get(key).cloned();
        if let Some(callback) = callback {
            callback(delta, elapsed);
        }
    }
}

/// A clock advanced explicitly by the host
///
/// ```rust
/// use cadenza_animation::{Clock, ManualClock};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let clock = ManualClock::new();
/// let total = Rc::new(Cell::new(0.0));
///
/// let total_clone = total.clone();
/// clock.subscribe(Rc::new(move |delta, _elapsed| {
///     total_clone.set(total_clone.get() + delta);
/// }));
///
/// clock.advance(16.0);
/// clock.advance(16.0);
/// assert_eq!(total.get(), 32.0);
/// ```
#[derive(Default)]
pub struct ManualClock {
    subscribers: RefCell<Subscribers>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one tick of `delta` milliseconds
    pub fn advance(&self, delta: f64) {
        deliver(&self.subscribers, delta);
    }

    /// Total time delivered so far
    pub fn elapsed(&self) -> f64 {
        self.subscribers.borrow().elapsed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().callbacks.len()
    }
}

impl Clock for ManualClock {
    fn subscribe(&self, callback: TickCallback) -> TickSubscription {
        let key = self.subscribers.borrow_mut().insert(callback);
        tracing::trace!("ManualClock: subscribed {:?}", key);
        key
    }

    fn unsubscribe(&self, subscription: TickSubscription) -> bool {
        let removed = self.subscribers.borrow_mut().remove(subscription);
        tracing::trace!("ManualClock: unsubscribed {:?} ({})", subscription, removed);
        removed
    }
}

/// A clock measuring wall-clock time between frames
///
/// Call [`FrameClock::tick`] once per frame from the host's event loop. The
/// delta is the time since the previous tick in milliseconds.
pub struct FrameClock {
    subscribers: RefCell<Subscribers>,
    last_frame: Cell<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Subscribers::default()),
            last_frame: Cell::new(Instant::now()),
        }
    }

    /// Measure the frame delta and deliver it
    ///
    /// Returns the delta in milliseconds.
    pub fn tick(&self) -> f64 {
        let now = Instant::now();
        let delta = (now - self.last_frame.get()).as_secs_f64() * 1000.0;
        self.last_frame.set(now);
        deliver(&self.subscribers, delta);
        delta
    }

    /// Restart delta measurement from now
    ///
    /// Call after the host stopped ticking for a while so the next frame does
    /// not deliver the whole idle period at once.
    pub fn reset(&self) {
        self.last_frame.set(Instant::now());
    }

    /// Total time delivered so far
    pub fn elapsed(&self) -> f64 {
        self.subscribers.borrow().elapsed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().callbacks.len()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FrameClock {
    fn subscribe(&self, callback: TickCallback) -> TickSubscription {
        // A new subscriber should not receive the time spent idle before it
        if self.subscribers.borrow().callbacks.is_empty() {
            self.reset();
        }
        self.subscribers.borrow_mut().insert(callback)
    }

    fn unsubscribe(&self, subscription: TickSubscription) -> bool {
        self.subscribers.borrow_mut().remove(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TickLog = Rc<RefCell<Vec<(&'static str, f64, f64)>>>;

    fn counter(clock: &dyn Clock, log: &TickLog, name: &'static str) -> TickSubscription {
        let log = log.clone();
        clock.subscribe(Rc::new(move |delta, elapsed| {
            log.borrow_mut().push((name, delta, elapsed));
        }))
    }

    #[test]
    fn test_manual_clock_delivers_in_order() {
        let clock = ManualClock::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        counter(&clock, &log, "a");
        counter(&clock, &log, "b");

        clock.advance(10.0);
        clock.advance(5.0);

        assert_eq!(
            *log.borrow(),
            vec![
                ("a", 10.0, 10.0),
                ("b", 10.0, 10.0),
                ("a", 5.0, 15.0),
                ("b", 5.0, 15.0),
            ]
        );
        assert_eq!(clock.elapsed(), 15.0);
    }

    #[test]
    fn test_unsubscribe_stops_ticks() {
        let clock = ManualClock::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let sub = counter(&clock, &log, "a");
        clock.advance(1.0);

        assert!(clock.unsubscribe(sub));
        assert!(!clock.unsubscribe(sub));
        clock.advance(1.0);

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn test_changes_during_delivery() {
        let clock = Rc::new(ManualClock::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim: Rc<Cell<Option<TickSubscription>>> = Rc::new(Cell::new(None));

        // The first subscriber removes the second and adds a third
        {
            let clock_weak = Rc::downgrade(&clock);
            let log = log.clone();
            let victim = victim.clone();
            clock.subscribe(Rc::new(move |_, _| {
                log.borrow_mut().push("first");
                let Some(clock) = clock_weak.upgrade() else {
                    return;
                };
                if let Some(sub) = victim.take() {
                    clock.unsubscribe(sub);
                    let log = log.clone();
                    clock.subscribe(Rc::new(move |_, _| log.borrow_mut().push("late")));
                }
            }));
        }
        {
            let log = log.clone();
            victim.set(Some(
                clock.subscribe(Rc::new(move |_, _| log.borrow_mut().push("second"))),
            ));
        }

        clock.advance(1.0);
        assert_eq!(*log.borrow(), vec!["first"]);

        clock.advance(1.0);
        assert_eq!(*log.borrow(), vec!["first", "first", "late"]);
    }

    #[test]
    fn test_frame_clock_measures_delta() {
        let clock = FrameClock::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        counter(&clock, &log, "frame");

        std::thread::sleep(std::time::Duration::from_millis(2));
        let delta = clock.tick();

        assert!(delta >= 2.0);
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, delta);
        assert_eq!(clock.elapsed(), delta);
    }
}
