//! Legacy-client classification.

/// Classifies callers by User-Agent and carries the per-class entry caps.
///
/// The signature list is configuration data, not code; the defaults cover
/// the clients this gateway was built for. A missing User-Agent classifies
/// as legacy, the more conservative policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyClientPolicy {
    /// Substrings that identify a legacy client.
    pub signatures: Vec<String>,
    /// Maximum feed entries served to a legacy client.
    pub legacy_entry_cap: usize,
    /// Maximum feed entries served to everyone else.
    pub modern_entry_cap: usize,
}

impl Default for LegacyClientPolicy {
    fn default() -> Self {
        let mut signatures = vec!["NetNewsWire/3".to_string()];
        signatures.extend((1..=10).map(|major| format!("iTunes/{major}.")));
        Self {
            signatures,
            legacy_entry_cap: 10,
            modern_entry_cap: 30,
        }
    }
}

impl LegacyClientPolicy {
    /// True when `user_agent` identifies a legacy client, or is absent.
    #[must_use]
    pub fn is_legacy_user_agent(&self, user_agent: Option<&str>) -> bool {
        let Some(user_agent) = user_agent else {
            return true;
        };
        self.signatures
            .iter()
            .any(|signature| user_agent.contains(signature.as_str()))
    }

    /// The entry cap for the given class.
    #[must_use]
    pub fn entry_cap(&self, legacy: bool) -> usize {
        if legacy {
            self.legacy_entry_cap
        } else {
            self.modern_entry_cap
        }
    }
}
