//! An in-process push source with named listeners.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::{Event, EventSource, Listener, ListenerId};

struct Registration<E> {
    id: ListenerId,
    name: String,
    listener: Listener<E>,

    // Set on removal, so that a dispatch already in progress skips the listener.
    removed: Rc<Cell<bool>>,
}

struct TargetInner<E> {
    registrations: RefCell<Vec<Registration<E>>>,
    next_listener_id: Cell<u64>,
}

/// A push source that dispatches events to listeners registered under an event name.
///
/// Cloning an `EventTarget` creates another handle to the same listener registry.
///
/// Dispatch works on a snapshot of the listeners registered when it starts:
///
/// * A listener added while an event is being dispatched is not called for that event.
/// * A listener removed while an event is being dispatched is not called anymore, even if it
///   was part of the snapshot.
///
/// Listeners may freely add and remove listeners (including themselves) and dispatch further
/// events while being called.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use event_bridge::{Aborted, Event, EventSource, EventTarget};
///
/// #[derive(Clone, Debug)]
/// struct Tick(u32);
///
/// impl Event for Tick {
///     type Error = Aborted;
///
///     fn into_error(self) -> Aborted {
///         Aborted
///     }
/// }
///
/// let target = EventTarget::<Tick>::new();
/// let total = Rc::new(Cell::new(0));
///
/// let id = target.add_listener("tick", {
///     let total = Rc::clone(&total);
///     Rc::new(move |tick: &Tick| total.set(total.get() + tick.0))
/// });
///
/// target.dispatch("tick", &Tick(2));
/// target.dispatch("tick", &Tick(3));
/// assert_eq!(total.get(), 5);
///
/// assert!(target.remove_listener("tick", id));
/// assert_eq!(target.listener_count(), 0);
/// ```
pub struct EventTarget<E> {
    inner: Rc<TargetInner<E>>,
}

impl<E> EventTarget<E>
where
    E: Event,
{
    /// Creates a target without any listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TargetInner {
                registrations: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(0),
            }),
        }
    }

    /// Calls every listener registered under `name` with `event`.
    ///
    /// Returns the number of listeners that were called.
    pub fn dispatch(&self, name: &str, event: &E) -> usize {
        // Listeners may modify the registry, so no borrow may be held while they run.
        let snapshot: Vec<(Listener<E>, Rc<Cell<bool>>)> = self
            .inner
            .registrations
            .borrow()
            .iter()
            .filter(|registration| registration.name == name)
            .map(|registration| {
                (
                    Rc::clone(&registration.listener),
                    Rc::clone(&registration.removed),
                )
            })
            .collect();

        let mut called: usize = 0;

        for (listener, removed) in snapshot {
            if removed.get() {
                continue;
            }

            listener(event);
            called = called.wrapping_add(1);
        }

        trace!(event = name, listeners = called, "dispatched");

        called
    }

    /// The number of listeners currently registered, across all event names.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registrations.borrow().len()
    }

    /// The number of listeners currently registered under `name`.
    #[must_use]
    pub fn listener_count_for(&self, name: &str) -> usize {
        self.inner
            .registrations
            .borrow()
            .iter()
            .filter(|registration| registration.name == name)
            .count()
    }
}

impl<E> EventSource for EventTarget<E>
where
    E: Event,
{
    type Event = E;

    fn add_listener(&self, name: &str, listener: Listener<E>) -> ListenerId {
        let raw = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(raw.wrapping_add(1));
        let id = ListenerId::new(raw);

        self.inner.registrations.borrow_mut().push(Registration {
            id,
            name: name.to_owned(),
            listener,
            removed: Rc::new(Cell::new(false)),
        });

        id
    }

    fn remove_listener(&self, name: &str, id: ListenerId) -> bool {
        let mut registrations = self.inner.registrations.borrow_mut();

        let Some(index) = registrations
            .iter()
            .position(|registration| registration.id == id && registration.name == name)
        else {
            return false;
        };

        let registration = registrations.remove(index);
        registration.removed.set(true);

        true
    }
}

impl<E> Clone for EventTarget<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventTarget<E>
where
    E: Event,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventTarget<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("listener_count", &self.inner.registrations.borrow().len())
            .finish_non_exhaustive()
    }
}
