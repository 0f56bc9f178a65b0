//! Preference repository trait.

use async_trait::async_trait;

use super::model::LastUsedOptions;
use crate::error::Result;

/// Storage for the last-used option record.
///
/// Implementations write the whole record on every save; coalescing of rapid
/// edits happens upstream in the preference writer.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Loads the record, returning an empty one if nothing has been stored yet.
    async fn load(&self) -> Result<LastUsedOptions>;

    /// Replaces the stored record.
    async fn save(&self, options: &LastUsedOptions) -> Result<()>;
}
