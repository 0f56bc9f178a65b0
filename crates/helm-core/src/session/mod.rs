//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Session record and lifecycle classes (`SessionRecord`, `StatusClass`)
//! - `event`: Typed session push events (`SessionEvent`, `MessageKind`)

mod event;
mod model;

// Re-export public API
pub use event::{MessageKind, SessionEvent};
pub use model::{SessionAck, SessionRecord, StatusClass, TokenUsage, ViewHint};
