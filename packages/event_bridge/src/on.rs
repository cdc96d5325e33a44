//! Adapts a repeating event into a pull-based sequence.
//!
//! Events are pushed by the source on its own schedule and pulled by consumers on theirs. The
//! two meet in a [`Sequence`], which holds either events nobody has asked for yet (the queue) or
//! consumers waiting for an event that has not arrived yet (the waiters), never both:
//!
//! * An arriving event goes to the oldest waiter if there is one, otherwise to the back of the
//!   queue.
//! * A pull takes the head of the queue if there is one, otherwise it becomes the newest waiter.
//!
//! Once finalized, the sequence detaches from the source, settles every waiter with its
//! terminal outcome and discards whatever is still queued.

use std::any::type_name;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::FusedStream;
use tracing::trace;

use crate::{
    AbortSignal, ErrorOf, Event, EventSource, ListenOptions, Listener, Subscription, abort_reason,
};

type Step<S> = Result<Option<<S as EventSource>::Event>, ErrorOf<S>>;

/// How a finalized sequence ended.
#[derive(Clone, Debug)]
enum Terminal<X> {
    Closed,
    Failed(X),
}

impl<X> Terminal<X>
where
    X: Clone,
{
    fn step<E>(&self) -> Result<Option<E>, X> {
        match self {
            Self::Closed => Ok(None),
            Self::Failed(error) => Err(error.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Placement {
    Back,
    Front,
}

struct Sequence<S>
where
    S: EventSource,
{
    name: Cow<'static, str>,

    // `None` while active.
    terminal: Option<Terminal<ErrorOf<S>>>,

    queue: VecDeque<S::Event>,
    waiters: VecDeque<oneshot::Sender<Step<S>>>,

    // `None` once finalized or if never attached.
    subscription: Option<Subscription<S>>,
}

fn on_event<S>(sequence: Weak<RefCell<Sequence<S>>>) -> Listener<S::Event>
where
    S: EventSource + 'static,
{
    Rc::new(move |event: &S::Event| {
        if let Some(sequence) = sequence.upgrade() {
            deliver(&sequence, event.clone(), Placement::Back);
        }
    })
}

fn on_error<S>(sequence: Weak<RefCell<Sequence<S>>>) -> Listener<S::Event>
where
    S: EventSource + 'static,
{
    Rc::new(move |event: &S::Event| {
        if let Some(sequence) = sequence.upgrade() {
            finalize(&sequence, Terminal::Failed(event.clone().into_error()));
        }
    })
}

fn on_abort<S>(
    sequence: Weak<RefCell<Sequence<S>>>,
    signal: AbortSignal<ErrorOf<S>>,
) -> impl Fn() + 'static
where
    S: EventSource + 'static,
{
    move || {
        if let Some(sequence) = sequence.upgrade() {
            finalize(&sequence, Terminal::Failed(abort_reason(Some(&signal))));
        }
    }
}

/// Hands `event` to the oldest waiter that is still interested, or queues it if there is none.
fn deliver<S>(sequence: &RefCell<Sequence<S>>, mut event: S::Event, placement: Placement)
where
    S: EventSource,
{
    loop {
        let waiter = {
            let mut sequence = sequence.borrow_mut();

            if sequence.terminal.is_some() {
                trace!(event = %sequence.name, "discarded event arriving after finalization");
                return;
            }

            let Some(waiter) = sequence.waiters.pop_front() else {
                match placement {
                    Placement::Back => sequence.queue.push_back(event),
                    Placement::Front => sequence.queue.push_front(event),
                }

                trace!(event = %sequence.name, queued = sequence.queue.len(), "queued event");
                return;
            };

            waiter
        };

        match waiter.send(Ok(Some(event))) {
            Ok(()) => return,
            Err(error) => {
                // That consumer stopped waiting; the event goes to the next one in line.
                let Ok(Some(returned)) = error.into_inner() else {
                    unreachable!("only events are delivered to waiters while active");
                };

                event = returned;
            }
        }
    }
}

/// Ends the sequence unless it has already ended. The first terminal outcome wins.
fn finalize<S>(sequence: &RefCell<Sequence<S>>, terminal: Terminal<ErrorOf<S>>)
where
    S: EventSource,
{
    let waiters = {
        let mut sequence = sequence.borrow_mut();

        if sequence.terminal.is_some() {
            return;
        }

        if let Some(mut subscription) = sequence.subscription.take() {
            subscription.detach();
        }

        trace!(
            event = %sequence.name,
            discarded = sequence.queue.len(),
            waiters = sequence.waiters.len(),
            failed = matches!(terminal, Terminal::Failed(_)),
            "finalized"
        );

        sequence.queue.clear();
        sequence.terminal = Some(terminal.clone());

        mem::take(&mut sequence.waiters)
    };

    for waiter in waiters {
        // A waiter that stopped waiting does not need to hear about the end.
        drop(waiter.send(terminal.step()));
    }
}

/// A pull-based sequence of the occurrences of an event on a source.
///
/// The sequence starts listening when created. Events that arrive before anyone pulls them are
/// buffered in order; pulls that arrive before an event exists wait in order. Every event is
/// delivered to exactly one pull, in the order the source emitted them.
///
/// The sequence ends when:
///
/// * the source dispatches the [error event][crate::ERROR_EVENT];
/// * the signal in the [`ListenOptions`] is aborted;
/// * the owner calls [`close()`][Self::close] or [`fail()`][Self::fail], or drops the sequence.
///
/// Ending detaches all listeners, settles all waiting pulls and discards buffered events that
/// nobody has pulled yet. A sequence that ended with a failure keeps reporting that failure from
/// [`next()`][Self::next]; a closed sequence keeps reporting its end.
///
/// The sequence is also a [`Stream`] of `Result`s. As a stream, it yields a failure only once
/// and then ends.
///
/// # Example
///
/// ```rust
/// use event_bridge::{Aborted, Event, EventTarget, ListenOptions, On};
/// use futures::executor::block_on;
///
/// #[derive(Clone, Debug, PartialEq)]
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
/// let target = EventTarget::new();
/// let ticks = On::new(&target, "tick", ListenOptions::new());
///
/// let pending = ticks.next();
/// target.dispatch("tick", &Tick(7));
/// assert_eq!(block_on(pending), Ok(Some(Tick(7))));
///
/// ticks.close();
/// assert_eq!(block_on(ticks.next()), Ok(None));
/// assert_eq!(target.listener_count(), 0);
/// ```
pub struct On<S>
where
    S: EventSource,
{
    sequence: Rc<RefCell<Sequence<S>>>,

    // The pull the `Stream` implementation is waiting on, if any.
    in_flight: Option<Next<S>>,
    stream_ended: bool,
}

impl<S> On<S>
where
    S: EventSource + Clone + 'static,
{
    /// Starts listening for the event called `name` on `source`.
    ///
    /// If the signal is already aborted, the source is never touched and the sequence starts
    /// out ended with the [abort reason][crate::abort_reason].
    #[must_use]
    pub fn new(
        source: &S,
        name: impl Into<Cow<'static, str>>,
        options: ListenOptions<ErrorOf<S>>,
    ) -> Self {
        let name = name.into();
        let signal = options.into_signal();

        if let Some(signal) = signal.as_ref().filter(|signal| signal.is_aborted()) {
            trace!(event = %name, "signal already aborted, not listening");

            return Self::from_sequence(Sequence {
                name,
                terminal: Some(Terminal::Failed(abort_reason(Some(signal)))),
                queue: VecDeque::new(),
                waiters: VecDeque::new(),
                subscription: None,
            });
        }

        let this = Self::from_sequence(Sequence {
            name: name.clone(),
            terminal: None,
            queue: VecDeque::new(),
            waiters: VecDeque::new(),
            subscription: None,
        });

        let mut subscription = Subscription::attach(
            source.clone(),
            name,
            on_event::<S>(Rc::downgrade(&this.sequence)),
            on_error::<S>(Rc::downgrade(&this.sequence)),
        );

        if let Some(signal) = signal {
            let on_abort = on_abort::<S>(Rc::downgrade(&this.sequence), signal.clone());
            subscription.observe_abort(&signal, on_abort);
        }

        {
            let mut sequence = this.sequence.borrow_mut();

            if sequence.terminal.is_none() {
                sequence.subscription = Some(subscription);
            } else {
                // The error event fired while we were still attaching the rest.
                subscription.detach();
            }
        }

        this
    }
}

impl<S> On<S>
where
    S: EventSource,
{
    fn from_sequence(sequence: Sequence<S>) -> Self {
        Self {
            sequence: Rc::new(RefCell::new(sequence)),
            in_flight: None,
            stream_ended: false,
        }
    }

    /// Pulls the next event.
    ///
    /// The returned future resolves to:
    ///
    /// * `Ok(Some(event))` with the next event;
    /// * `Ok(None)` if the sequence has been closed;
    /// * `Err(error)` if the sequence has failed, on this and every later pull.
    ///
    /// If an event is already buffered, the future is ready immediately. Otherwise the pull
    /// takes its place in line right away, so pulls are served in the order `next()` was
    /// called, regardless of the order in which their futures are polled.
    ///
    /// Dropping a future that has been handed an event it did not yet return puts the event
    /// back at the head of the sequence.
    #[must_use]
    pub fn next(&self) -> Next<S> {
        let mut sequence = self.sequence.borrow_mut();

        if let Some(event) = sequence.queue.pop_front() {
            return Next {
                state: NextState::Taken {
                    event,
                    sequence: Rc::downgrade(&self.sequence),
                },
            };
        }

        if let Some(terminal) = &sequence.terminal {
            return Next::ready(terminal.step());
        }

        let (sender, receiver) = oneshot::channel();
        sequence.waiters.push_back(sender);

        trace!(event = %sequence.name, waiters = sequence.waiters.len(), "waiting for event");

        Next {
            state: NextState::Waiting {
                receiver,
                sequence: Rc::downgrade(&self.sequence),
            },
        }
    }

    /// Ends the sequence cleanly.
    ///
    /// Waiting pulls and all later pulls resolve to `Ok(None)`. Does nothing if the sequence
    /// has already ended.
    pub fn close(&self) {
        finalize(&self.sequence, Terminal::Closed);
    }

    /// Ends the sequence with `reason` as its failure.
    ///
    /// Waiting pulls and all later pulls resolve to `Err(reason)`. Does nothing if the sequence
    /// has already ended, in which case the first ending is kept.
    pub fn fail(&self, reason: ErrorOf<S>) {
        finalize(&self.sequence, Terminal::Failed(reason));
    }

    /// Whether the sequence has ended.
    ///
    /// Events buffered before a clean end are discarded, so an ended sequence never yields
    /// another event.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.sequence.borrow().terminal.is_some()
    }
}

impl<S> Drop for On<S>
where
    S: EventSource,
{
    fn drop(&mut self) {
        finalize(&self.sequence, Terminal::Closed);
    }
}

impl<S> Stream for On<S>
where
    S: EventSource,
{
    type Item = Result<S::Event, ErrorOf<S>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.stream_ended {
            return Poll::Ready(None);
        }

        let mut next = this.in_flight.take().unwrap_or_else(|| this.next());

        match Pin::new(&mut next).poll(cx) {
            Poll::Pending => {
                this.in_flight = Some(next);
                Poll::Pending
            }
            Poll::Ready(Ok(Some(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Ok(None)) => {
                this.stream_ended = true;
                Poll::Ready(None)
            }
            Poll::Ready(Err(error)) => {
                this.stream_ended = true;
                Poll::Ready(Some(Err(error)))
            }
        }
    }
}

impl<S> FusedStream for On<S>
where
    S: EventSource,
{
    fn is_terminated(&self) -> bool {
        self.stream_ended
    }
}

impl<S> fmt::Debug for On<S>
where
    S: EventSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sequence = self.sequence.borrow();

        f.debug_struct(type_name::<Self>())
            .field("name", &sequence.name)
            .field("is_finalized", &sequence.terminal.is_some())
            .field("queued", &sequence.queue.len())
            .field("waiters", &sequence.waiters.len())
            .field("stream_ended", &self.stream_ended)
            .finish_non_exhaustive()
    }
}

enum NextState<S>
where
    S: EventSource,
{
    Ready(Step<S>),
    // Taken from the queue; goes back to the head of the sequence if never returned.
    Taken {
        event: S::Event,
        sequence: Weak<RefCell<Sequence<S>>>,
    },
    Waiting {
        receiver: oneshot::Receiver<Step<S>>,
        sequence: Weak<RefCell<Sequence<S>>>,
    },
    Done,
}

/// A pending pull from an [`On`] sequence, created by [`On::next()`].
///
/// # Panics
///
/// Panics if polled again after it has resolved.
pub struct Next<S>
where
    S: EventSource,
{
    state: NextState<S>,
}

impl<S> Next<S>
where
    S: EventSource,
{
    fn ready(step: Step<S>) -> Self {
        Self {
            state: NextState::Ready(step),
        }
    }
}

// Results are moved out by value when the future resolves and are never pinned.
impl<S> Unpin for Next<S> where S: EventSource {}

impl<S> Future for Next<S>
where
    S: EventSource,
{
    type Output = Step<S>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match mem::replace(&mut this.state, NextState::Done) {
            NextState::Ready(step) => Poll::Ready(step),
            NextState::Taken { event, .. } => Poll::Ready(Ok(Some(event))),
            NextState::Waiting {
                mut receiver,
                sequence,
            } => match Pin::new(&mut receiver).poll(cx) {
                Poll::Pending => {
                    this.state = NextState::Waiting { receiver, sequence };
                    Poll::Pending
                }
                Poll::Ready(Ok(step)) => Poll::Ready(step),
                // The sequence itself is gone, which ends it cleanly.
                Poll::Ready(Err(oneshot::RecvError)) => Poll::Ready(Ok(None)),
            },
            NextState::Done => panic!("Next polled after completion"),
        }
    }
}

impl<S> Drop for Next<S>
where
    S: EventSource,
{
    fn drop(&mut self) {
        let (event, sequence) = match mem::replace(&mut self.state, NextState::Done) {
            NextState::Taken { event, sequence } => (event, sequence),
            NextState::Waiting { receiver, sequence } => match receiver.try_recv() {
                Ok(Ok(Some(event))) => (event, sequence),
                _ => return,
            },
            NextState::Ready(_) | NextState::Done => return,
        };

        if let Some(sequence) = sequence.upgrade() {
            trace!("returning unobserved event to the sequence");
            deliver(&sequence, event, Placement::Front);
        }
    }
}

impl<S> fmt::Debug for Next<S>
where
    S: EventSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            NextState::Ready(_) | NextState::Taken { .. } => "ready",
            NextState::Waiting { .. } => "waiting",
            NextState::Done => "done",
        };

        f.debug_struct(type_name::<Self>())
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use futures::{FutureExt, StreamExt};
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::test_utils::{TestError, TestEvent, with_watchdog};
    use crate::{AbortController, Aborted, ERROR_EVENT, EventTarget};

    type TestOn = On<EventTarget<TestEvent>>;

    assert_not_impl_any!(TestOn: Send, Sync);
    assert_not_impl_any!(Next<EventTarget<TestEvent>>: Send, Sync);

    fn on(target: &EventTarget<TestEvent>) -> TestOn {
        On::new(target, "tick", ListenOptions::new())
    }

    fn tick(target: &EventTarget<TestEvent>, value: i32) {
        target.dispatch("tick", &TestEvent::Value(value));
    }

    fn fail(target: &EventTarget<TestEvent>, reason: &'static str) {
        target.dispatch(ERROR_EVENT, &TestEvent::Failure(TestError::Reason(reason)));
    }

    #[test]
    fn pending_pull_resolves_with_event_then_close_ends() {
        with_watchdog(|| {
            let target = EventTarget::<TestEvent>::new();
            let ticks = on(&target);

            let pending = ticks.next();
            tick(&target, 7);
            assert_eq!(block_on(pending), Ok(Some(TestEvent::Value(7))));

            ticks.close();
            assert_eq!(block_on(ticks.next()), Ok(None));
        });
    }

    #[test]
    fn buffered_events_are_pulled_in_order() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        for value in 1..=3 {
            tick(&target, value);
        }

        for value in 1..=3 {
            assert_eq!(
                ticks.next().now_or_never(),
                Some(Ok(Some(TestEvent::Value(value))))
            );
        }

        assert!(ticks.next().now_or_never().is_none());
    }

    #[test]
    fn waiting_pulls_are_served_in_call_order() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        let first = ticks.next();
        let second = ticks.next();
        tick(&target, 1);
        tick(&target, 2);

        // Polling order does not matter, only the order of the `next()` calls.
        assert_eq!(second.now_or_never(), Some(Ok(Some(TestEvent::Value(2)))));
        assert_eq!(first.now_or_never(), Some(Ok(Some(TestEvent::Value(1)))));
    }

    #[test]
    fn queue_and_waiters_are_never_both_populated() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        let pending = ticks.next();
        tick(&target, 1);
        tick(&target, 2);

        {
            let sequence = ticks.sequence.borrow();
            assert!(sequence.waiters.is_empty());
            assert_eq!(sequence.queue.len(), 1);
        }

        assert_eq!(pending.now_or_never(), Some(Ok(Some(TestEvent::Value(1)))));
        assert_eq!(
            ticks.next().now_or_never(),
            Some(Ok(Some(TestEvent::Value(2))))
        );
    }

    #[test]
    fn error_fails_waiters_and_sticks() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        let first = ticks.next();
        let second = ticks.next();
        fail(&target, "boom");

        let expected = Err(TestError::Reason("boom"));
        assert_eq!(first.now_or_never(), Some(expected.clone()));
        assert_eq!(second.now_or_never(), Some(expected.clone()));
        assert_eq!(ticks.next().now_or_never(), Some(expected.clone()));
        assert_eq!(ticks.next().now_or_never(), Some(expected));
        assert_eq!(target.listener_count(), 0);
    }

    #[test]
    fn error_discards_buffered_events() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        tick(&target, 1);
        tick(&target, 2);
        fail(&target, "boom");

        assert_eq!(
            ticks.next().now_or_never(),
            Some(Err(TestError::Reason("boom")))
        );
    }

    #[test]
    fn error_without_payload_fails_with_raw_event() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        target.dispatch(ERROR_EVENT, &TestEvent::Bare);

        assert_eq!(
            ticks.next().now_or_never(),
            Some(Err(TestError::RawEvent(Box::new(TestEvent::Bare))))
        );
    }

    #[test]
    fn close_ends_waiters_and_is_idempotent() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        let pending = ticks.next();
        ticks.close();
        ticks.close();

        assert_eq!(pending.now_or_never(), Some(Ok(None)));
        assert_eq!(ticks.next().now_or_never(), Some(Ok(None)));
        assert!(ticks.is_finalized());
        assert_eq!(target.listener_count(), 0);
    }

    #[test]
    fn close_discards_buffered_events() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        tick(&target, 1);
        ticks.close();

        assert_eq!(ticks.next().now_or_never(), Some(Ok(None)));
    }

    #[test]
    fn fail_records_reason() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        let pending = ticks.next();
        ticks.fail(TestError::Reason("misuse"));

        assert_eq!(pending.now_or_never(), Some(Err(TestError::Reason("misuse"))));
        assert_eq!(
            ticks.next().now_or_never(),
            Some(Err(TestError::Reason("misuse")))
        );
    }

    #[test]
    fn first_ending_wins() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        ticks.close();
        ticks.fail(TestError::Reason("late"));
        fail(&target, "later");

        assert_eq!(ticks.next().now_or_never(), Some(Ok(None)));
    }

    #[test]
    fn abort_fails_every_waiter_with_reason() {
        let target = EventTarget::<TestEvent>::new();
        let controller = AbortController::new();
        let ticks = On::new(
            &target,
            "tick",
            ListenOptions::new().with_signal(controller.signal()),
        );

        let pending: Vec<_> = (0..3).map(|_| ticks.next()).collect();
        controller.abort_with(TestError::Reason("stop"));
        tick(&target, 1);

        for next in pending {
            assert_eq!(next.now_or_never(), Some(Err(TestError::Reason("stop"))));
        }

        assert_eq!(
            ticks.next().now_or_never(),
            Some(Err(TestError::Reason("stop")))
        );
        assert_eq!(target.listener_count(), 0);
        assert_eq!(controller.signal().listener_count(), 0);
    }

    #[test]
    fn abort_without_reason_fails_with_generic_abort() {
        let target = EventTarget::<TestEvent>::new();
        let controller = AbortController::new();
        let ticks = On::new(
            &target,
            "tick",
            ListenOptions::new().with_signal(controller.signal()),
        );

        controller.abort();

        assert_eq!(
            ticks.next().now_or_never(),
            Some(Err(TestError::Aborted(Aborted)))
        );
    }

    #[test]
    fn already_aborted_signal_fails_first_pull_without_attaching() {
        let target = EventTarget::<TestEvent>::new();
        let signal = AbortSignal::aborted(Some(TestError::Reason("stop")));

        let ticks = On::new(&target, "tick", ListenOptions::new().with_signal(signal.clone()));

        assert_eq!(target.listener_count(), 0);
        assert_eq!(signal.listener_count(), 0);
        assert!(ticks.is_finalized());
        assert_eq!(
            ticks.next().now_or_never(),
            Some(Err(TestError::Reason("stop")))
        );
    }

    #[test]
    fn dropping_sequence_detaches_and_ends_pending_pulls() {
        let target = EventTarget::<TestEvent>::new();
        let controller = AbortController::new();
        let ticks = On::new(
            &target,
            "tick",
            ListenOptions::new().with_signal(controller.signal()),
        );
        let pending = ticks.next();

        drop(ticks);

        assert_eq!(target.listener_count(), 0);
        assert_eq!(controller.signal().listener_count(), 0);
        assert_eq!(pending.now_or_never(), Some(Ok(None)));
    }

    #[test]
    fn dropped_waiter_is_skipped() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        let abandoned = ticks.next();
        let kept = ticks.next();
        drop(abandoned);

        tick(&target, 1);

        assert_eq!(kept.now_or_never(), Some(Ok(Some(TestEvent::Value(1)))));
    }

    #[test]
    fn dropped_waiter_with_unobserved_event_returns_it() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        let abandoned = ticks.next();
        tick(&target, 1);
        tick(&target, 2);
        drop(abandoned);

        assert_eq!(
            ticks.next().now_or_never(),
            Some(Ok(Some(TestEvent::Value(1))))
        );
        assert_eq!(
            ticks.next().now_or_never(),
            Some(Ok(Some(TestEvent::Value(2))))
        );
    }

    #[test]
    fn dropped_unpolled_pull_of_buffered_event_returns_it() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        tick(&target, 1);
        tick(&target, 2);
        drop(ticks.next());

        assert_eq!(
            ticks.next().now_or_never(),
            Some(Ok(Some(TestEvent::Value(1))))
        );
        assert_eq!(
            ticks.next().now_or_never(),
            Some(Ok(Some(TestEvent::Value(2))))
        );
    }

    #[test]
    fn dropped_unpolled_pull_of_buffered_event_feeds_waiter() {
        let target = EventTarget::<TestEvent>::new();
        let ticks = on(&target);

        tick(&target, 1);
        let abandoned = ticks.next();
        let waiting = ticks.next();
        drop(abandoned);

        assert_eq!(waiting.now_or_never(), Some(Ok(Some(TestEvent::Value(1)))));
    }

    #[test]
    fn sequence_on_error_event_yields_error_events() {
        let target = EventTarget::<TestEvent>::new();
        let errors = On::new(&target, ERROR_EVENT, ListenOptions::new());
        assert_eq!(target.listener_count(), 1);

        target.dispatch(ERROR_EVENT, &TestEvent::Bare);

        assert_eq!(errors.next().now_or_never(), Some(Ok(Some(TestEvent::Bare))));
    }

    #[test]
    fn stream_yields_events_until_closed() {
        with_watchdog(|| {
            let target = EventTarget::<TestEvent>::new();
            let mut ticks = on(&target);

            tick(&target, 1);
            tick(&target, 2);
            ticks.close();

            // Closing discards what was buffered.
            let collected: Vec<_> = block_on((&mut ticks).collect());
            assert!(collected.is_empty());
            assert!(ticks.is_terminated());
        });
    }

    #[test]
    fn stream_yields_error_once_then_ends() {
        with_watchdog(|| {
            let target = EventTarget::<TestEvent>::new();
            let mut ticks = on(&target);

            let first = ticks.next();
            tick(&target, 1);
            assert_eq!(block_on(first), Ok(Some(TestEvent::Value(1))));

            tick(&target, 2);
            assert_eq!(
                block_on(ticks.next()),
                Ok(Some(TestEvent::Value(2)))
            );

            fail(&target, "boom");

            let collected: Vec<_> = block_on((&mut ticks).collect());
            assert_eq!(collected, vec![Err(TestError::Reason("boom"))]);
            assert!(ticks.is_terminated());

            // The inherent pull keeps reporting the failure.
            assert_eq!(block_on(ticks.next()), Err(TestError::Reason("boom")));
        });
    }

    #[test]
    fn stream_waits_for_events() {
        let target = EventTarget::<TestEvent>::new();
        let mut ticks = on(&target);

        assert!(ticks.next_stream_item().is_none());

        tick(&target, 4);

        assert_eq!(
            ticks.next_stream_item(),
            Some(Some(Ok(TestEvent::Value(4))))
        );
    }

    impl TestOn {
        fn next_stream_item(&mut self) -> Option<Option<Result<TestEvent, TestError>>> {
            StreamExt::next(self).now_or_never()
        }
    }
}
