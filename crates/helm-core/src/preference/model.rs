//! Last-used option record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capability::CapabilityKind;

/// Remembered option per agent and capability kind.
///
/// Keys are stored as strings so the record maps directly onto a TOML table:
/// `agents.<agent_id>.<kind> = "<option_id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LastUsedOptions {
    #[serde(default)]
    pub agents: BTreeMap<String, BTreeMap<String, String>>,
}

impl LastUsedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the remembered option for `agent_id` and `kind`.
    pub fn get(&self, agent_id: &str, kind: CapabilityKind) -> Option<&str> {
        self.agents
            .get(agent_id)
            .and_then(|kinds| kinds.get(kind.to_string().as_str()))
            .map(String::as_str)
    }

    /// Records `option_id`; returns false if it was already the remembered value.
    pub fn set(&mut self, agent_id: &str, kind: CapabilityKind, option_id: &str) -> bool {
        let kinds = self.agents.entry(agent_id.to_string()).or_default();
        let previous = kinds.insert(kind.to_string(), option_id.to_string());
        previous.as_deref() != Some(option_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut options = LastUsedOptions::new();
        assert!(options.set("codex", CapabilityKind::Model, "gpt-5"));
        assert_eq!(options.get("codex", CapabilityKind::Model), Some("gpt-5"));
        assert_eq!(options.get("codex", CapabilityKind::Mode), None);
    }

    #[test]
    fn test_set_reports_unchanged_value() {
        let mut options = LastUsedOptions::new();
        options.set("codex", CapabilityKind::Model, "gpt-5");
        assert!(!options.set("codex", CapabilityKind::Model, "gpt-5"));
        assert!(options.set("codex", CapabilityKind::Model, "o3"));
    }
}
