//! Adapts push-based event sources into futures and pull-based sequences.
//!
//! A push-based source calls its listeners whenever something happens, on its own schedule.
//! Async code prefers to ask for the next thing when it is ready for it. This crate bridges the
//! two for any [`EventSource`]:
//!
//! * [`Once`] turns the first occurrence of an event into a future.
//! * [`On`] turns every occurrence of an event into a sequence that is pulled via
//!   [`On::next()`] or consumed as a [`Stream`][futures::Stream].
//!
//! Both adapters treat the [`ERROR_EVENT`] on the same source as a failure and both can be
//! cancelled through an [`AbortSignal`] passed in [`ListenOptions`]. When an adapter ends for
//! any reason, every listener it attached is detached again.
//!
//! [`EventTarget`] is a ready-made in-process source with named listeners. Any other source can
//! take part by implementing [`EventSource`].
//!
//! Everything here is single-threaded: sources, adapters and signals are neither `Send` nor
//! `Sync` and are meant to be driven by a single-threaded executor.
//!
//! # Example
//!
//! ```rust
//! use event_bridge::{AbortController, Aborted, Event, EventTarget, ListenOptions, On, Once};
//! use futures::executor::block_on;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Signal {
//!     Ready,
//!     Tick(u32),
//! }
//!
//! impl Event for Signal {
//!     type Error = Aborted;
//!
//!     fn into_error(self) -> Aborted {
//!         Aborted
//!     }
//! }
//!
//! let target = EventTarget::new();
//! let controller = AbortController::new();
//!
//! let ready = Once::new(&target, "ready", ListenOptions::new()).listen();
//! let ticks = On::new(
//!     &target,
//!     "tick",
//!     ListenOptions::new().with_signal(controller.signal()),
//! );
//!
//! target.dispatch("ready", &Signal::Ready);
//! target.dispatch("tick", &Signal::Tick(1));
//! target.dispatch("tick", &Signal::Tick(2));
//!
//! assert_eq!(block_on(ready), Ok(Signal::Ready));
//! assert_eq!(block_on(ticks.next()), Ok(Some(Signal::Tick(1))));
//!
//! controller.abort();
//! assert_eq!(block_on(ticks.next()), Err(Aborted));
//! assert_eq!(target.listener_count(), 0);
//! ```

mod abort;
mod constants;
mod on;
mod once;
mod options;
mod source;
mod subscription;
mod target;

#[cfg(test)]
mod test_utils;

pub use abort::*;
pub use constants::*;
pub use on::*;
pub use once::*;
pub use options::*;
pub use source::*;
pub(crate) use subscription::Subscription;
pub use target::*;
