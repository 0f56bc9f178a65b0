//! Agent capability lists (models, modes, reasoning efforts).

mod model;

pub use model::{CapabilityCacheEntry, CapabilityItem, CapabilityKey, CapabilityKind};
