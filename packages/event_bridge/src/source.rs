//! The contract between adapters and the push-based sources they listen to.

use std::fmt;
use std::rc::Rc;

use crate::Aborted;

/// A callback registered with an [`EventSource`].
///
/// Sources invoke the callback synchronously, on the thread that dispatches the event.
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Identifies one listener registration on a source, for later removal.
///
/// Identifiers are issued by the source and only have meaning to the source that issued them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Creates an identifier from a source-specific raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value this identifier was created from.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    #[cfg_attr(test, mutants::skip)] // No API contract for the formatted identifier.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A payload dispatched by an [`EventSource`].
///
/// The same type is dispatched under every event name of a source, including the
/// [error event][crate::ERROR_EVENT]. When an adapter receives an error event, it turns the
/// event into a failure via [`Event::into_error()`].
pub trait Event: Clone + 'static {
    /// The failure value reported by adapters listening to sources of this event type.
    ///
    /// Cancellation also has to be expressible as this type, hence the conversion from
    /// [`Aborted`].
    type Error: Clone + From<Aborted> + 'static;

    /// Converts an event received under the error event name into a failure value.
    ///
    /// Implementations return the error payload carried by the event if there is one and
    /// otherwise represent the event itself as the failure.
    fn into_error(self) -> Self::Error;
}

/// Something that notifies named listeners of events on its own schedule.
///
/// Adapters keep a clone of the source for as long as they have listeners attached, so that
/// they can detach from inside a listener callback. Implementations are expected to be cheap
/// handles to shared state, like [`EventTarget`][crate::EventTarget].
pub trait EventSource {
    /// The payload type dispatched to listeners.
    type Event: Event;

    /// Registers `listener` to be called whenever an event named `name` is dispatched.
    fn add_listener(&self, name: &str, listener: Listener<Self::Event>) -> ListenerId;

    /// Removes a registration previously returned by [`add_listener()`][Self::add_listener].
    ///
    /// Returns `false` if no such registration exists, which is not an error: removing the same
    /// registration twice must be harmless.
    fn remove_listener(&self, name: &str, id: ListenerId) -> bool;
}

/// The failure type reported by adapters listening to `S`.
pub type ErrorOf<S> = <<S as EventSource>::Event as Event>::Error;
