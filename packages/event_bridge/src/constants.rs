/// The event name under which sources report failures.
///
/// Adapters listen for this event alongside their target event, unless the target event is
/// itself the error event.
pub const ERROR_EVENT: &str = "error";
