//! Configuration of how adapters listen to their source.

use std::any::type_name;
use std::fmt;

use crate::AbortSignal;

/// Configures how an adapter listens to its source.
///
/// The only recognized setting is the [`AbortSignal`] that cancels the adapter.
///
/// # Example
///
/// ```rust
/// use event_bridge::{AbortController, Aborted, ListenOptions};
///
/// let controller = AbortController::<Aborted>::new();
/// let options = ListenOptions::new().with_signal(controller.signal());
///
/// assert!(options.signal().is_some());
/// ```
pub struct ListenOptions<X> {
    signal: Option<AbortSignal<X>>,
}

impl<X> ListenOptions<X> {
    /// Creates options without a signal; the adapter can then only end through its source or
    /// by being closed or dropped.
    #[must_use]
    pub fn new() -> Self {
        Self { signal: None }
    }

    /// Cancels the adapter when `signal` is aborted.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal<X>) -> Self {
        self.signal = Some(signal);
        self
    }

    /// The signal that cancels the adapter, if any.
    #[must_use]
    pub fn signal(&self) -> Option<&AbortSignal<X>> {
        self.signal.as_ref()
    }

    pub(crate) fn into_signal(self) -> Option<AbortSignal<X>> {
        self.signal
    }
}

impl<X> Clone for ListenOptions<X> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<X> Default for ListenOptions<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X> fmt::Debug for ListenOptions<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("signal", &self.signal)
            .finish()
    }
}
