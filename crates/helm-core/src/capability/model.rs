use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Kind of option list an agent exposes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CapabilityKind {
    Model,
    Mode,
    ReasoningEffort,
}

/// Cache key: one option list per agent and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityKey {
    pub agent_id: String,
    pub kind: CapabilityKind,
}

impl CapabilityKey {
    pub fn new(agent_id: impl Into<String>, kind: CapabilityKind) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind,
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.agent_id, self.kind)
    }
}

/// One selectable option in a capability list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityItem {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CapabilityItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
        }
    }
}

/// A cached option list and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityCacheEntry {
    pub key: CapabilityKey,
    pub items: Vec<CapabilityItem>,
    pub fetched_at: DateTime<Utc>,
}

impl CapabilityCacheEntry {
    pub fn new(key: CapabilityKey, items: Vec<CapabilityItem>) -> Self {
        Self {
            key,
            items,
            fetched_at: Utc::now(),
        }
    }

    /// Returns true if `id` is one of the cached options.
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }
}
