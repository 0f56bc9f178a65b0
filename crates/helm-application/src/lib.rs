//! Application layer for HELM.
//!
//! This crate holds the stateful components of the console core and the
//! `ConsoleContext` that composes them. Backend access goes through the
//! `BackendChannel` seam from `helm-core`; views only read the
//! `ViewUpdate` stream and cloned records.

pub mod capability;
pub mod context;
pub mod preference;
pub mod recording;
pub mod resource;
pub mod session;
pub mod streaming;
pub mod view;

pub use capability::{CapabilityCache, RefreshOutcome};
pub use context::ConsoleContext;
pub use preference::PreferenceWriter;
pub use recording::RecordingController;
pub use resource::ResourceManager;
pub use session::{ApplyOutcome, SessionRegistry};
pub use streaming::{StreamingReconciler, TranscriptMessage};
pub use view::{Notice, NoticeAction, ViewBus, ViewUpdate};
