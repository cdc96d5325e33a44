//! Waits for a request to complete by turning its "success" and "error" events into a future.
//!
//! A request reports its outcome exactly once, through one of two events. `Once` settles on
//! whichever arrives first and detaches from the request right after.

use event_bridge::{
    AbortController, Aborted, ERROR_EVENT, Event, EventTarget, ListenOptions, Once,
};
use futures::executor::block_on;
use thiserror::Error;
use tracing::Level;

#[derive(Clone, Debug, Error)]
enum RequestError {
    #[error(transparent)]
    Aborted(#[from] Aborted),

    #[error("request failed: {0}")]
    Failed(String),
}

#[derive(Clone, Debug)]
enum Completion {
    Succeeded(u64),
    Failed(String),
}

impl Event for Completion {
    type Error = RequestError;

    fn into_error(self) -> RequestError {
        match self {
            Self::Failed(message) => RequestError::Failed(message),
            Self::Succeeded(value) => RequestError::Failed(format!("unexpected result {value}")),
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::TRACE).init();

    println!("=== Request that succeeds ===");

    let request = EventTarget::new();
    let outcome = Once::new(&request, "success", ListenOptions::new()).listen();

    request.dispatch("success", &Completion::Succeeded(42));

    match block_on(outcome) {
        Ok(completion) => println!("Completed with {completion:?}"),
        Err(error) => println!("Failed: {error}"),
    }

    println!("=== Request that fails ===");

    let request = EventTarget::new();
    let outcome = Once::new(&request, "success", ListenOptions::new()).listen();

    request.dispatch(ERROR_EVENT, &Completion::Failed("constraint violated".to_owned()));

    match block_on(outcome) {
        Ok(completion) => println!("Completed with {completion:?}"),
        Err(error) => println!("Failed: {error}"),
    }

    println!("=== Request that is abandoned ===");

    let request = EventTarget::<Completion>::new();
    let controller = AbortController::new();
    let outcome = Once::new(
        &request,
        "success",
        ListenOptions::new().with_signal(controller.signal()),
    )
    .listen();

    controller.abort();

    match block_on(outcome) {
        Ok(completion) => println!("Completed with {completion:?}"),
        Err(error) => println!("Failed: {error}"),
    }

    println!(
        "Listeners left on the last request: {}",
        request.listener_count()
    );
}
