//! Cooperative cancellation: an [`AbortController`] owns the right to abort, any number of
//! [`AbortSignal`] clones observe it.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::ListenerId;

/// The generic failure reported when an operation is cancelled without an explicit reason.
///
/// Failure types used with this crate convert from this type (see
/// [`Event::Error`][crate::Event::Error]), so every adapter can report cancellation.
#[derive(Clone, Copy, Debug, Default, Eq, Error, Hash, PartialEq)]
#[error("The operation was aborted.")]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct Aborted;

impl Aborted {
    /// The conventional name of this kind of failure.
    pub const NAME: &'static str = "AbortError";

    /// The conventional name of this kind of failure, for failure types that carry one.
    #[must_use]
    pub const fn name(self) -> &'static str {
        Self::NAME
    }
}

/// Determines the failure to report for an operation cancelled via `signal`.
///
/// Returns the reason carried by the signal verbatim if there is one. Without a signal, or if
/// the signal carries no reason, returns the generic [`Aborted`] failure.
///
/// # Example
///
/// ```rust
/// use event_bridge::{AbortSignal, Aborted, abort_reason};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Failure {
///     Aborted,
///     Stopped(&'static str),
/// }
///
/// impl From<Aborted> for Failure {
///     fn from(_: Aborted) -> Self {
///         Self::Aborted
///     }
/// }
///
/// let signal = AbortSignal::aborted(Some(Failure::Stopped("stop")));
/// assert_eq!(abort_reason(Some(&signal)), Failure::Stopped("stop"));
///
/// let signal = AbortSignal::<Failure>::aborted(None);
/// assert_eq!(abort_reason(Some(&signal)), Failure::Aborted);
/// assert_eq!(abort_reason::<Failure>(None), Failure::Aborted);
/// ```
#[must_use]
pub fn abort_reason<X>(signal: Option<&AbortSignal<X>>) -> X
where
    X: Clone + From<Aborted>,
{
    signal
        .and_then(AbortSignal::reason)
        .unwrap_or_else(|| X::from(Aborted))
}

enum SignalState<X> {
    Pending,
    Aborted(Option<X>),
}

struct SignalInner<X> {
    state: RefCell<SignalState<X>>,
    listeners: RefCell<Vec<(ListenerId, Rc<dyn Fn()>)>>,
    next_listener_id: Cell<u64>,
}

/// Observes whether an operation has been cancelled and notifies listeners when it is.
///
/// Clones of a signal observe the same cancellation state. A signal is aborted at most once,
/// either through its [`AbortController`] or by being created via [`AbortSignal::aborted()`].
///
/// `X` is the type of the reason an abort may carry.
pub struct AbortSignal<X> {
    inner: Rc<SignalInner<X>>,
}

impl<X> AbortSignal<X> {
    fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                state: RefCell::new(SignalState::Pending),
                listeners: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(0),
            }),
        }
    }

    /// Creates a signal that is already aborted, optionally carrying `reason`.
    #[must_use]
    pub fn aborted(reason: Option<X>) -> Self {
        let signal = Self::new();
        signal.abort(reason);
        signal
    }

    /// Whether the signal has been aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(*self.inner.state.borrow(), SignalState::Aborted(_))
    }

    /// The reason the signal was aborted with, if it has been aborted with one.
    #[must_use]
    pub fn reason(&self) -> Option<X>
    where
        X: Clone,
    {
        match &*self.inner.state.borrow() {
            SignalState::Aborted(reason) => reason.clone(),
            SignalState::Pending => None,
        }
    }

    /// Registers `callback` to be called once, when the signal is aborted.
    ///
    /// If the signal is already aborted, the callback will never be called; check
    /// [`is_aborted()`][Self::is_aborted] first.
    pub fn on_abort(&self, callback: impl Fn() + 'static) -> ListenerId {
        let raw = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(raw.wrapping_add(1));
        let id = ListenerId::new(raw);

        if !self.is_aborted() {
            self.inner.listeners.borrow_mut().push((id, Rc::new(callback)));
        }

        id
    }

    /// Removes a callback registered via [`on_abort()`][Self::on_abort].
    ///
    /// Returns `false` if the callback was not registered (anymore), including when it has
    /// already been called.
    pub fn remove_abort_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let count_before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);

        listeners.len() != count_before
    }

    /// The number of callbacks that will be called when the signal is aborted.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn abort(&self, reason: Option<X>) {
        {
            let mut state = self.inner.state.borrow_mut();

            if matches!(*state, SignalState::Aborted(_)) {
                return;
            }

            *state = SignalState::Aborted(reason);
        }

        // Callbacks may call back into the signal, so no borrow may be held while they run.
        let listeners = mem::take(&mut *self.inner.listeners.borrow_mut());

        debug!(listeners = listeners.len(), "signal aborted");

        for (_, callback) in listeners {
            callback();
        }
    }
}

impl<X> Clone for AbortSignal<X> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<X> fmt::Debug for AbortSignal<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("is_aborted", &self.is_aborted())
            .field("listener_count", &self.listener_count())
            .finish_non_exhaustive()
    }
}

/// Owns the right to abort the [`AbortSignal`] it hands out.
///
/// # Example
///
/// ```rust
/// use event_bridge::AbortController;
///
/// let controller = AbortController::<String>::new();
/// let signal = controller.signal();
///
/// assert!(!signal.is_aborted());
/// controller.abort_with("shutting down".to_string());
///
/// assert!(signal.is_aborted());
/// assert_eq!(signal.reason().as_deref(), Some("shutting down"));
/// ```
pub struct AbortController<X> {
    signal: AbortSignal<X>,
}

impl<X> AbortController<X> {
    /// Creates a controller whose signal is not aborted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::new(),
        }
    }

    /// Returns a signal that observes this controller.
    #[must_use]
    pub fn signal(&self) -> AbortSignal<X> {
        self.signal.clone()
    }

    /// Aborts the signal without a reason.
    ///
    /// Does nothing if the signal has already been aborted.
    pub fn abort(&self) {
        self.signal.abort(None);
    }

    /// Aborts the signal, carrying `reason` to whoever observes it.
    ///
    /// Does nothing if the signal has already been aborted; the first reason is kept.
    pub fn abort_with(&self, reason: X) {
        self.signal.abort(Some(reason));
    }
}

impl<X> Default for AbortController<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X> fmt::Debug for AbortController<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("signal", &self.signal)
            .finish()
    }
}
