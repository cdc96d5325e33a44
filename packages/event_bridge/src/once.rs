//! Adapts the first occurrence of an event into a future.

use std::any::type_name;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use tracing::trace;

use crate::{
    AbortSignal, Aborted, ErrorOf, Event, EventSource, ListenOptions, Listener, Subscription,
    abort_reason,
};

type Outcome<S> = Result<<S as EventSource>::Event, ErrorOf<S>>;

/// Listens for a single occurrence of an event on a source.
///
/// Created via [`Once::new()`], started via [`Once::listen()`]. The resulting [`Listening`]
/// future settles with the first of:
///
/// * the target event, as `Ok(event)`;
/// * the [error event][crate::ERROR_EVENT], as `Err` with the failure carried by the event;
/// * the abort of the signal in the [`ListenOptions`], as `Err` with the
///   [abort reason][crate::abort_reason].
///
/// All listeners are detached as soon as the future settles, so later occurrences are never
/// observed.
///
/// # Example
///
/// ```rust
/// use event_bridge::{Aborted, Event, EventTarget, ListenOptions, Once};
/// use futures::executor::block_on;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Ready(&'static str);
///
/// impl Event for Ready {
///     type Error = Aborted;
///
///     fn into_error(self) -> Aborted {
///         Aborted
///     }
/// }
///
/// let target = EventTarget::new();
/// let ready = Once::new(&target, "ready", ListenOptions::new()).listen();
///
/// target.dispatch("ready", &Ready("database"));
///
/// assert_eq!(block_on(ready), Ok(Ready("database")));
/// assert_eq!(target.listener_count(), 0);
/// ```
pub struct Once<'a, S>
where
    S: EventSource,
{
    source: &'a S,
    name: Cow<'static, str>,
    options: ListenOptions<ErrorOf<S>>,
}

impl<'a, S> Once<'a, S>
where
    S: EventSource + Clone + 'static,
{
    /// Prepares to listen for the event called `name` on `source`.
    ///
    /// Nothing is attached to the source until [`listen()`][Self::listen] is called.
    #[must_use]
    pub fn new(
        source: &'a S,
        name: impl Into<Cow<'static, str>>,
        options: ListenOptions<ErrorOf<S>>,
    ) -> Self {
        Self {
            source,
            name: name.into(),
            options,
        }
    }

    /// Attaches the listeners and returns a future that settles on the first occurrence.
    ///
    /// Events dispatched after this call are observed even if the future is not polled yet.
    ///
    /// If the signal is already aborted, the returned future is ready immediately and the
    /// source is never touched.
    ///
    /// Dropping the future before it settles detaches the listeners.
    #[must_use]
    pub fn listen(self) -> Listening<S> {
        let signal = self.options.into_signal();
        let (sender, receiver) = oneshot::channel();

        if let Some(signal) = signal.as_ref().filter(|signal| signal.is_aborted()) {
            trace!(event = %self.name, "signal already aborted, not listening");

            // The receiver is alive, so this cannot fail.
            drop(sender.send(Err(abort_reason(Some(signal)))));

            return Listening {
                receiver: Some(receiver),
                shared: None,
            };
        }

        let shared = Rc::new(RefCell::new(OnceShared {
            sender: Some(sender),
            subscription: None,
        }));

        let mut subscription = Subscription::attach(
            self.source.clone(),
            self.name,
            on_event::<S>(Rc::downgrade(&shared)),
            on_error::<S>(Rc::downgrade(&shared)),
        );

        if let Some(signal) = signal {
            let on_abort = on_abort::<S>(Rc::downgrade(&shared), signal.clone());
            subscription.observe_abort(&signal, on_abort);
        }

        {
            let mut state = shared.borrow_mut();

            if state.sender.is_some() {
                state.subscription = Some(subscription);
            } else {
                // A listener fired while we were still attaching the rest.
                subscription.detach();
            }
        }

        Listening {
            receiver: Some(receiver),
            shared: Some(shared),
        }
    }
}

impl<S> fmt::Debug for Once<'_, S>
where
    S: EventSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

struct OnceShared<S>
where
    S: EventSource,
{
    // `None` once settled.
    sender: Option<oneshot::Sender<Outcome<S>>>,
    subscription: Option<Subscription<S>>,
}

fn on_event<S>(shared: Weak<RefCell<OnceShared<S>>>) -> Listener<S::Event>
where
    S: EventSource + 'static,
{
    Rc::new(move |event: &S::Event| {
        if let Some(shared) = shared.upgrade() {
            settle(&shared, Ok(event.clone()));
        }
    })
}

fn on_error<S>(shared: Weak<RefCell<OnceShared<S>>>) -> Listener<S::Event>
where
    S: EventSource + 'static,
{
    Rc::new(move |event: &S::Event| {
        if let Some(shared) = shared.upgrade() {
            settle(&shared, Err(event.clone().into_error()));
        }
    })
}

fn on_abort<S>(
    shared: Weak<RefCell<OnceShared<S>>>,
    signal: AbortSignal<ErrorOf<S>>,
) -> impl Fn() + 'static
where
    S: EventSource + 'static,
{
    move || {
        if let Some(shared) = shared.upgrade() {
            settle(&shared, Err(abort_reason(Some(&signal))));
        }
    }
}

/// Settles the future with `outcome` unless it has already settled.
fn settle<S>(shared: &RefCell<OnceShared<S>>, outcome: Outcome<S>)
where
    S: EventSource,
{
    let sender = {
        let mut state = shared.borrow_mut();

        let Some(sender) = state.sender.take() else {
            return;
        };

        if let Some(mut subscription) = state.subscription.take() {
            subscription.detach();
        }

        sender
    };

    trace!(is_ok = outcome.is_ok(), "settled");

    // If the receiver is gone, nobody is interested in the outcome anymore.
    drop(sender.send(outcome));
}

/// A future that resolves with the first occurrence of an event, created by [`Once::listen()`].
///
/// Resolves to `Ok(event)` for the target event, or `Err` for an error event or a cancellation.
///
/// Dropping the future before it resolves detaches all its listeners.
///
/// # Panics
///
/// Panics if polled again after it has resolved.
pub struct Listening<S>
where
    S: EventSource,
{
    // `None` once resolved.
    receiver: Option<oneshot::Receiver<Outcome<S>>>,

    // `None` if never attached or once resolved.
    shared: Option<Rc<RefCell<OnceShared<S>>>>,
}

impl<S> Future for Listening<S>
where
    S: EventSource,
{
    type Output = Outcome<S>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let receiver = this
            .receiver
            .as_mut()
            .expect("Listening polled after completion");

        match Pin::new(receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.receiver = None;
                this.shared = None;

                match result {
                    Ok(outcome) => Poll::Ready(outcome),
                    // The sender was dropped without settling, so the event can no longer arrive.
                    Err(oneshot::RecvError) => Poll::Ready(Err(<ErrorOf<S>>::from(Aborted))),
                }
            }
        }
    }
}

impl<S> Drop for Listening<S>
where
    S: EventSource,
{
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        let mut state = shared.borrow_mut();

        if state.sender.take().is_some() {
            trace!("abandoned before settling");
        }

        if let Some(mut subscription) = state.subscription.take() {
            subscription.detach();
        }
    }
}

impl<S> fmt::Debug for Listening<S>
where
    S: EventSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("is_resolved", &self.receiver.is_none())
            .field(
                "subscription",
                &self.shared.as_ref().map(|shared| shared.borrow().subscription.is_some()),
            )
            .finish()
    }
}
