//! Bookkeeping of the listeners one adapter has attached, so that it can detach exactly those.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;

use tracing::trace;

use crate::{AbortSignal, ERROR_EVENT, ErrorOf, EventSource, Listener, ListenerId};

/// The listener registrations made on behalf of one adapter.
///
/// Every registration recorded here is removed exactly once, by the first call to
/// [`detach()`][Self::detach]. Later calls find nothing left to remove.
pub(crate) struct Subscription<S>
where
    S: EventSource,
{
    source: S,
    name: Cow<'static, str>,
    target_listener: Option<ListenerId>,
    error_listener: Option<ListenerId>,
    abort_listener: Option<(AbortSignal<ErrorOf<S>>, ListenerId)>,
}

impl<S> Subscription<S>
where
    S: EventSource,
{
    /// Attaches `on_event` under `name` and, unless `name` is itself the error event,
    /// `on_error` under the error event.
    pub(crate) fn attach(
        source: S,
        name: Cow<'static, str>,
        on_event: Listener<S::Event>,
        on_error: Listener<S::Event>,
    ) -> Self {
        let target_listener = Some(source.add_listener(&name, on_event));

        let error_listener =
            (name != ERROR_EVENT).then(|| source.add_listener(ERROR_EVENT, on_error));

        trace!(event = %name, "attached listeners");

        Self {
            source,
            name,
            target_listener,
            error_listener,
            abort_listener: None,
        }
    }

    /// Registers `on_abort` with `signal`, to be removed again on detach.
    pub(crate) fn observe_abort(
        &mut self,
        signal: &AbortSignal<ErrorOf<S>>,
        on_abort: impl Fn() + 'static,
    ) {
        let id = signal.on_abort(on_abort);
        self.abort_listener = Some((signal.clone(), id));
    }

    /// Removes every registration made by this subscription that has not been removed yet.
    pub(crate) fn detach(&mut self) {
        if let Some(id) = self.target_listener.take() {
            self.source.remove_listener(&self.name, id);
        }

        if let Some(id) = self.error_listener.take() {
            self.source.remove_listener(ERROR_EVENT, id);
        }

        if let Some((signal, id)) = self.abort_listener.take() {
            signal.remove_abort_listener(id);
        }

        trace!(event = %self.name, "detached listeners");
    }

    #[cfg(test)]
    pub(crate) fn is_attached(&self) -> bool {
        self.target_listener.is_some()
            || self.error_listener.is_some()
            || self.abort_listener.is_some()
    }
}

impl<S> fmt::Debug for Subscription<S>
where
    S: EventSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("target_listener", &self.target_listener)
            .field("error_listener", &self.error_listener)
            .field("abort_listener", &self.abort_listener)
            .finish_non_exhaustive()
    }
}
