//! Shared store for episodic traces, patterns, and wisdom (§3 "Data
//! relationships": Thought → EpisodicTrace → Pattern → Wisdom).
//!
//! The stream engine promotes qualifying Thoughts into traces here; the
//! dream pipeline consolidates traces already sitting in the same store.
//! `tokio::sync::Mutex` rather than `std::sync::Mutex`: consolidation holds
//! the lock across the `.await` points inside `dream::consolidate`.

use tokio::sync::Mutex;

use crate::types::{EpisodicTrace, Pattern, Wisdom};

pub struct MemoryStore {
    pub traces: Mutex<Vec<EpisodicTrace>>,
    pub patterns: Mutex<Vec<Pattern>>,
    pub wisdom: Mutex<Vec<Wisdom>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(traces: Vec<EpisodicTrace>, patterns: Vec<Pattern>, wisdom: Vec<Wisdom>) -> Self {
        Self {
            traces: Mutex::new(traces),
            patterns: Mutex::new(patterns),
            wisdom: Mutex::new(wisdom),
        }
    }

    /// Push a newly promoted trace. Callers are responsible for notifying
    /// the lifecycle manager of the new unconsolidated count separately.
    pub async fn push_trace(&self, trace: EpisodicTrace) {
        self.traces.lock().await.push(trace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Thought, ThoughtSource, ThoughtType};

    #[tokio::test]
    async fn push_trace_appends_to_store() {
        let store = MemoryStore::new(Vec::new(), Vec::new(), Vec::new());
        let thought = Thought::new(ThoughtType::Insight, "content", ThoughtSource::Stream);
        store.push_trace(EpisodicTrace::new(thought, 0.8)).await;
        assert_eq!(store.traces.lock().await.len(), 1);
    }
}
