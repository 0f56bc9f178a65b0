//! Versioned schemas for persisted documents.
//!
//! DTOs stay private to the infrastructure layer; the domain only sees
//! `helm_core` types.
//!
//! ### LastUsedOptions Version History
//! - **1.0.0**: one model id per agent (`models.<agent>`)
//! - **1.1.0**: one option per agent and kind (`agents.<agent>.<kind>`)

mod preferences;

pub use preferences::{
    LastUsedOptionsDTO, LastUsedOptionsV1_0, LastUsedOptionsV1_1, PREFERENCES_ENTITY,
    create_preferences_migrator,
};
