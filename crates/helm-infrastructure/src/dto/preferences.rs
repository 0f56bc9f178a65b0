//! Last-used option DTOs and migrations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use version_migrate::{FromDomain, IntoDomain, MigratesTo, Versioned};

use helm_core::capability::CapabilityKind;
use helm_core::error::Result;
use helm_core::preference::LastUsedOptions;

/// Entity name the preference document is registered under.
pub const PREFERENCES_ENTITY: &str = "last_used_options";

/// V1.0.0: one remembered model per agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
pub struct LastUsedOptionsV1_0 {
    /// agent id -> model id
    #[serde(default)]
    pub models: BTreeMap<String, String>,
}

/// V1.1.0: one remembered option per agent and capability kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.1.0")]
pub struct LastUsedOptionsV1_1 {
    /// agent id -> kind -> option id
    #[serde(default)]
    pub agents: BTreeMap<String, BTreeMap<String, String>>,
}

/// Type alias for the latest preference version.
pub type LastUsedOptionsDTO = LastUsedOptionsV1_1;

// ============================================================================
// Migration implementations
// ============================================================================

/// V1.0 models become the `model` entry of each agent's table.
impl MigratesTo<LastUsedOptionsV1_1> for LastUsedOptionsV1_0 {
    fn migrate(self) -> LastUsedOptionsV1_1 {
        let model = CapabilityKind::Model.to_string();
        let agents = self
            .models
            .into_iter()
            .map(|(agent, option)| (agent, BTreeMap::from([(model.clone(), option)])))
            .collect();
        LastUsedOptionsV1_1 { agents }
    }
}

// ============================================================================
// Domain model conversions
// ============================================================================

impl IntoDomain<LastUsedOptions> for LastUsedOptionsV1_1 {
    fn into_domain(self) -> LastUsedOptions {
        LastUsedOptions {
            agents: self.agents,
        }
    }
}

impl FromDomain<LastUsedOptions> for LastUsedOptionsV1_1 {
    fn from_domain(options: LastUsedOptions) -> Self {
        LastUsedOptionsV1_1 {
            agents: options.agents,
        }
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Creates the migrator for the preference document.
///
/// # Migration Path
///
/// - V1.0 → V1.1: `models.<agent>` moves to `agents.<agent>.model`
/// - V1.1 → LastUsedOptions
pub fn create_preferences_migrator() -> Result<version_migrate::Migrator> {
    let mut migrator = version_migrate::Migrator::builder().build();

    let path = version_migrate::Migrator::define(PREFERENCES_ENTITY)
        .from::<LastUsedOptionsV1_0>()
        .step::<LastUsedOptionsV1_1>()
        .into_with_save::<LastUsedOptions>();

    migrator.register(path)?;
    Ok(migrator)
}
