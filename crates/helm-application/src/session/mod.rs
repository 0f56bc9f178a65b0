//! Session registry and the buffer for events that outrun registration.

mod pending;
mod registry;

pub use pending::{PendingEvent, PendingEventBuffer};
pub use registry::{ApplyOutcome, Registration, SessionRegistry};
