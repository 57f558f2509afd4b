//! Topic keyed event dispatch
//!
//! A minimal publish/subscribe bus. Listeners are registered per topic and
//! called synchronously, in registration order, whenever that topic is
//! triggered. Nothing is buffered: events triggered while a topic has no
//! listeners are simply dropped.
//!
//! Closures cannot be compared, so [`EventBus::on`] hands back a
//! [`ListenerId`] which is what [`EventBus::off`] takes to unsubscribe.
//!
//! Dispatch iterates over a snapshot of the topic's listeners, which makes it
//! safe for a listener to call back into the bus: listeners added during a
//! dispatch only see later events, and listeners removed before they are
//! reached are skipped.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

new_key_type! {
    /// Handle to a registered listener
    pub struct ListenerId;
}

/// A shared event listener
pub type Listener<T> = Rc<dyn Fn(&T)>;

type TopicListeners = SmallVec<[ListenerId; 4]>;

struct BusInner<T> {
    listeners: SlotMap<ListenerId, Listener<T>>,
    topics: FxHashMap<String, TopicListeners>,
}

/// Synchronous, in-order publish/subscribe keyed by string topic
pub struct EventBus<T> {
    inner: RefCell<BusInner<T>>,
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(BusInner {
                listeners: SlotMap::with_key(),
                topics: FxHashMap::default(),
            }),
        }
    }

    /// Register a listener for a topic
    pub fn on<F>(&self, topic: &str, listener: F) -> ListenerId
    where
        F: Fn(&T) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.listeners.insert(Rc::new(listener));
        inner.topics.entry(topic.to_string()).or_default().push(id);
        id
    }

    /// Remove a listener from a topic
    ///
    /// Returns `false` if the listener was not registered on that topic.
    pub fn off(&self, topic: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(ids) = inner.topics.get_mut(topic) else {
            return false;
        };
        let Some(position) = ids.iter().position(|registered| *registered == id) else {
            return false;
        };
        ids.remove(position);
        if ids.is_empty() {
            inner.topics.remove(topic);
        }
        inner.listeners.remove(id);
        true
    }

    /// Call every listener of `topic` with `payload`
    pub fn trigger(&self, topic: &str, payload: &T) {
        let snapshot: TopicListeners = match self.inner.borrow().topics.get(topic) {
            Some(ids) => ids.clone(),
            None => return,
        };

        for id in snapshot {
            // Look each listener up again: an earlier listener may have removed it
            let listener = self.inner.borrow().listeners.get(id).cloned();
            if let Some(listener) = listener {
                listener(payload);
            }
        }
    }

    /// Number of listeners registered on a topic
    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner
            .borrow()
            .topics
            .get(topic)
            .map_or(0, |ids| ids.len())
    }

    /// Remove every listener from every topic
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.listeners.clear();
        inner.topics.clear();
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_trigger_in_registration_order() {
        let bus: EventBus<u32> = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = log.clone();
            bus.on("tick", move |value| log.borrow_mut().push((name, *value)));
        }

        bus.trigger("tick", &7);

        assert_eq!(
            *log.borrow(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus: EventBus<()> = EventBus::new();
        let finishes = Rc::new(Cell::new(0));

        let finishes_clone = finishes.clone();
        bus.on("finish", move |_| finishes_clone.set(finishes_clone.get() + 1));

        bus.trigger("pause", &());
        bus.trigger("finish", &());

        assert_eq!(finishes.get(), 1);
        assert_eq!(bus.listener_count("finish"), 1);
        assert_eq!(bus.listener_count("pause"), 0);
    }

    #[test]
    fn test_off_removes_listener() {
        let bus: EventBus<()> = EventBus::new();
        let calls = Rc::new(Cell::new(0));

        let calls_clone = calls.clone();
        let id = bus.on("cancel", move |_| calls_clone.set(calls_clone.get() + 1));

        // Wrong topic leaves the listener in place
        assert!(!bus.off("finish", id));
        bus.trigger("cancel", &());
        assert_eq!(calls.get(), 1);

        assert!(bus.off("cancel", id));
        assert!(!bus.off("cancel", id));
        bus.trigger("cancel", &());
        assert_eq!(calls.get(), 1);
        assert_eq!(bus.listener_count("cancel"), 0);
    }

    #[test]
    fn test_no_buffering() {
        let bus: EventBus<()> = EventBus::new();
        bus.trigger("play", &());

        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        bus.on("play", move |_| calls_clone.set(calls_clone.get() + 1));

        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_reentrant_listener_changes() {
        let bus: Rc<EventBus<()>> = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let second_id = Rc::new(Cell::new(None));

        // The first listener removes the second one and adds a third
        {
            let bus_weak = Rc::downgrade(&bus);
            let log = log.clone();
            let second_id = second_id.clone();
            bus.on("finish", move |_| {
                log.borrow_mut().push("first");
                let Some(bus) = bus_weak.upgrade() else {
                    return;
                };
                if let Some(id) = second_id.take() {
                    bus.off("finish", id);
                }
                let log = log.clone();
                bus.on("finish", move |_| log.borrow_mut().push("late"));
            });
        }
        {
            let log = log.clone();
            second_id.set(Some(
                bus.on("finish", move |_| log.borrow_mut().push("second")),
            ));
        }

        bus.trigger("finish", &());
        assert_eq!(*log.borrow(), vec!["first"]);

        log.borrow_mut().clear();
        bus.trigger("finish", &());
        assert_eq!(*log.borrow(), vec!["first", "late"]);
    }

    #[test]
    fn test_clear() {
        let bus: EventBus<()> = EventBus::new();
        bus.on("play", |_| {});
        bus.on("pause", |_| {});

        bus.clear();

        assert_eq!(bus.listener_count("play"), 0);
        assert_eq!(bus.listener_count("pause"), 0);
    }
}
