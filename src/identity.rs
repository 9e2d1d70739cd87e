//! Stable, session-spanning identity (§3 `Identity`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stable self-concept carried across restarts. `signature` is computed
/// once at first creation from `(core_values, wisdom_domains, birth_time)`
/// and never recomputed; `total_*` counters are monotonic non-decreasing
/// across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub signature: String,
    pub core_values: Vec<String>,
    pub wisdom_domains: Vec<String>,
    pub birth_time: DateTime<Utc>,
    total_uptime_secs: u64,
    total_cycles: u64,
    total_thoughts: u64,
    session_count: u64,
}

impl Identity {
    #[must_use]
    pub fn new(core_values: Vec<String>, wisdom_domains: Vec<String>) -> Self {
        let birth_time = Utc::now();
        let signature = compute_signature(&core_values, &wisdom_domains, birth_time);
        Self {
            signature,
            core_values,
            wisdom_domains,
            birth_time,
            total_uptime_secs: 0,
            total_cycles: 0,
            total_thoughts: 0,
            session_count: 0,
        }
    }

    #[must_use]
    pub fn total_uptime_secs(&self) -> u64 {
        self.total_uptime_secs
    }

    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    #[must_use]
    pub fn total_thoughts(&self) -> u64 {
        self.total_thoughts
    }

    #[must_use]
    pub fn session_count(&self) -> u64 {
        self.session_count
    }

    pub fn begin_session(&mut self) {
        self.session_count += 1;
    }

    pub fn add_uptime(&mut self, secs: u64) {
        self.total_uptime_secs += secs;
    }

    pub fn add_cycles(&mut self, cycles: u64) {
        self.total_cycles += cycles;
    }

    pub fn add_thoughts(&mut self, thoughts: u64) {
        self.total_thoughts += thoughts;
    }
}

/// `sha2`-based signature hash, truncated to 16 hex chars. Kept deterministic
/// over `(core_values, wisdom_domains, birth_time_unix)` so a given Identity
/// always reproduces the same signature if ever recomputed from the same
/// inputs, though in practice it is computed once and carried thereafter.
fn compute_signature(core_values: &[String], wisdom_domains: &[String], birth_time: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    for value in core_values {
        hasher.update(value.as_bytes());
        hasher.update(b"\0");
    }
    for domain in wisdom_domains {
        hasher.update(domain.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(birth_time.timestamp().to_le_bytes());
    let digest = hasher.finalize();
    let full_hex = format!("{digest:x}");
    full_hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_nonempty_and_fixed_length() {
        let identity = Identity::new(vec!["curiosity".into()], vec!["systems".into()]);
        assert_eq!(identity.signature.len(), 16);
    }

    #[test]
    fn signature_is_deterministic_for_identical_inputs() {
        let birth_time = Utc::now();
        let a = compute_signature(&["x".to_string()], &["y".to_string()], birth_time);
        let b = compute_signature(&["x".to_string()], &["y".to_string()], birth_time);
        assert_eq!(a, b);
    }

    #[test]
    fn signature_differs_for_different_values() {
        let birth_time = Utc::now();
        let a = compute_signature(&["x".to_string()], &["y".to_string()], birth_time);
        let b = compute_signature(&["z".to_string()], &["y".to_string()], birth_time);
        assert_ne!(a, b);
    }

    #[test]
    fn counters_are_monotonic() {
        let mut identity = Identity::new(vec![], vec![]);
        identity.add_cycles(5);
        identity.add_cycles(3);
        assert_eq!(identity.total_cycles(), 8);
    }
}
