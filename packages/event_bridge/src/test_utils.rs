//! Testing utilities shared by the unit tests of this crate.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::{Aborted, Event};

/// Runs a test with a 10-second timeout, so that a future that never settles fails the test
/// instead of hanging it.
pub(crate) fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out.
        drop(tx.send(result));
    });

    match rx.recv_timeout(Duration::from_secs(10)) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded 10-second timeout - likely awaiting an adapter that never settles");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// Failure type used by [`TestEvent`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub(crate) enum TestError {
    #[error(transparent)]
    Aborted(#[from] Aborted),

    #[error("{0}")]
    Reason(&'static str),

    #[error("error event without payload: {0:?}")]
    RawEvent(Box<TestEvent>),
}

/// Event type dispatched by test sources.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum TestEvent {
    Value(i32),
    Failure(TestError),
    Bare,
}

impl Event for TestEvent {
    type Error = TestError;

    fn into_error(self) -> TestError {
        match self {
            Self::Failure(error) => error,
            other => TestError::RawEvent(Box::new(other)),
        }
    }
}
