//! Core data model: the atomic cognitive artifacts that flow through every
//! subsystem.
//!
//! `Thought` is the single concrete record for everything the runtime
//! produces; type-specific behavior lives in producers/consumers that branch
//! on `ThoughtType`, not in a class hierarchy of thought variants.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(ThoughtId);
uuid_id!(TraceId);
uuid_id!(PatternId);
uuid_id!(WisdomId);

/// One of the three phase-offset engine lanes. A newtype rather than a bare
/// `u8` so the pairwise-distinctness invariant is checked against a typed
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(u8);

impl EngineId {
    /// # Panics
    /// Panics if `id` is not 0, 1, or 2.
    #[must_use]
    pub fn new(id: u8) -> Self {
        assert!(id < 3, "EngineId must be 0, 1, or 2");
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The three engines' phase offsets, in engine-id order: {0, 4, 8}.
    #[must_use]
    pub const fn phase_offset(self) -> u8 {
        self.0 * 4
    }

    pub const ALL: [EngineId; 3] = [EngineId(0), EngineId(1), EngineId(2)];
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of thought kinds the stream-of-consciousness engine may
/// produce. All type-specific behavior branches on this tag; there is no
/// per-type struct hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThoughtType {
    Perception,
    Reflection,
    Question,
    Insight,
    Planning,
    Memory,
    MetaCognition,
    Wonder,
    Doubt,
    Connection,
}

impl ThoughtType {
    /// All ten variants, in a fixed order used for weighted sampling.
    pub const ALL: [ThoughtType; 10] = [
        ThoughtType::Perception,
        ThoughtType::Reflection,
        ThoughtType::Question,
        ThoughtType::Insight,
        ThoughtType::Planning,
        ThoughtType::Memory,
        ThoughtType::MetaCognition,
        ThoughtType::Wonder,
        ThoughtType::Doubt,
        ThoughtType::Connection,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ThoughtType::Perception => "perception",
            ThoughtType::Reflection => "reflection",
            ThoughtType::Question => "question",
            ThoughtType::Insight => "insight",
            ThoughtType::Planning => "planning",
            ThoughtType::Memory => "memory",
            ThoughtType::MetaCognition => "meta_cognition",
            ThoughtType::Wonder => "wonder",
            ThoughtType::Doubt => "doubt",
            ThoughtType::Connection => "connection",
        }
    }
}

impl fmt::Display for ThoughtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a `Thought` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThoughtSource {
    SchedulerStep,
    Stream,
    ExternalStimulus,
    DreamInsight,
    Template,
}

impl ThoughtSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ThoughtSource::SchedulerStep => "scheduler-step",
            ThoughtSource::Stream => "stream",
            ThoughtSource::ExternalStimulus => "external-stimulus",
            ThoughtSource::DreamInsight => "dream-insight",
            ThoughtSource::Template => "template",
        }
    }
}

impl fmt::Display for ThoughtSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// The atomic cognitive artifact. Produced by a scheduler step or the stream
/// generator, appended to the bounded history, optionally promoted to an
/// `EpisodicTrace`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    pub id: ThoughtId,
    pub timestamp: DateTime<Utc>,
    pub kind: ThoughtType,
    pub content: String,
    pub source: ThoughtSource,
    confidence: f64,
    depth: f64,
    pub emotion_tag: String,
    pub tags: Vec<String>,
    pub context: HashMap<String, String>,
}

impl Thought {
    #[must_use]
    pub fn new(kind: ThoughtType, content: impl Into<String>, source: ThoughtSource) -> Self {
        Self {
            id: ThoughtId::new(),
            timestamp: Utc::now(),
            kind,
            content: content.into(),
            source,
            confidence: 0.5,
            depth: 0.5,
            emotion_tag: "neutral".to_string(),
            tags: Vec::new(),
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub fn depth(&self) -> f64 {
        self.depth
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp01(confidence);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = clamp01(depth);
        self
    }

    #[must_use]
    pub fn with_emotion_tag(mut self, tag: impl Into<String>) -> Self {
        self.emotion_tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: HashMap<String, String>) -> Self {
        self.context = context;
        self
    }

    /// Whether this thought clears the consolidation-candidacy bar:
    /// `confidence * depth > threshold`.
    #[must_use]
    pub fn clears_trace_threshold(&self, threshold: f64) -> bool {
        self.confidence * self.depth > threshold
    }
}

/// A `Thought` promoted for dream consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicTrace {
    pub id: TraceId,
    pub thought: Thought,
    importance: f64,
    pub consolidated: bool,
}

impl EpisodicTrace {
    #[must_use]
    pub fn new(thought: Thought, importance: f64) -> Self {
        Self {
            id: TraceId::new(),
            thought,
            importance: clamp01(importance),
            consolidated: false,
        }
    }

    #[must_use]
    pub fn importance(&self) -> f64 {
        self.importance
    }

    /// Prune score: `importance / (1 + age_in_days)`.
    #[must_use]
    pub fn prune_score(&self, now: DateTime<Utc>) -> f64 {
        let age_days = (now - self.thought.timestamp).num_seconds().max(0) as f64 / 86_400.0;
        self.importance / (1.0 + age_days)
    }
}

/// A recurring structure extracted from ≥2 episodic traces during Dreaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub supporting_trace_ids: Vec<TraceId>,
    strength: f64,
    pub last_seen: DateTime<Utc>,
    pub domain_tag: String,
}

impl Pattern {
    /// # Panics
    /// Panics if fewer than 2 supporting traces are supplied: a `Pattern`
    /// must never exist without the minimum supporting evidence.
    #[must_use]
    pub fn new(description: impl Into<String>, supporting_trace_ids: Vec<TraceId>, domain_tag: impl Into<String>, strength: f64) -> Self {
        assert!(
            supporting_trace_ids.len() >= 2,
            "Pattern must have at least 2 supporting traces at creation"
        );
        let now = Utc::now();
        Self {
            id: PatternId::new(),
            created_at: now,
            description: description.into(),
            supporting_trace_ids,
            strength: clamp01(strength),
            last_seen: now,
            domain_tag: domain_tag.into(),
        }
    }

    #[must_use]
    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn reinforce(&mut self) {
        self.strength = (self.strength + 0.1).min(1.0);
        self.last_seen = Utc::now();
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.supporting_trace_ids.len() >= 2
    }
}

/// A higher-order insight derived from ≥2 Patterns during Dreaming.
/// Immutable once created; may be superseded by a newer Wisdom, never
/// mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wisdom {
    pub id: WisdomId,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub supporting_pattern_ids: Vec<PatternId>,
    pub confidence: f64,
    pub applicability: f64,
    pub depth: f64,
    pub domain_tag: String,
    pub superseded_by: Option<WisdomId>,
}

impl Wisdom {
    /// # Panics
    /// Panics if fewer than 2 supporting patterns are supplied.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        supporting_pattern_ids: Vec<PatternId>,
        confidence: f64,
        applicability: f64,
        depth: f64,
        domain_tag: impl Into<String>,
    ) -> Self {
        assert!(
            supporting_pattern_ids.len() >= 2,
            "Wisdom must be derived from at least 2 patterns"
        );
        Self {
            id: WisdomId::new(),
            created_at: Utc::now(),
            content: content.into(),
            supporting_pattern_ids,
            confidence: clamp01(confidence),
            applicability: clamp01(applicability),
            depth: clamp01(depth),
            domain_tag: domain_tag.into(),
            superseded_by: None,
        }
    }
}

/// A bounded list that evicts its oldest element on overflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounded<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Bounded<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Last `n` items, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&T>
    where
        T: Sized,
    {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).collect()
    }
}

/// Mutable working state driving thought production and lifecycle
/// transitions. All scalar fields are clipped to `[0,1]`; bounded lists
/// evict their oldest element on overflow.
#[derive(Debug, Clone)]
pub struct CognitiveState {
    awareness: f64,
    cognitive_load: f64,
    fatigue: f64,
    pub current_focus: String,
    pub emotional_tone: HashMap<String, f64>,
    pub recent_topics: Bounded<String>,
    pub working_memory: Bounded<Thought>,
}

impl Default for CognitiveState {
    fn default() -> Self {
        Self {
            awareness: 0.5,
            cognitive_load: 0.2,
            fatigue: 0.0,
            current_focus: String::new(),
            emotional_tone: HashMap::new(),
            recent_topics: Bounded::new(10),
            working_memory: Bounded::new(7),
        }
    }
}

impl CognitiveState {
    #[must_use]
    pub fn awareness(&self) -> f64 {
        self.awareness
    }

    pub fn set_awareness(&mut self, value: f64) {
        self.awareness = clamp01(value);
    }

    #[must_use]
    pub fn cognitive_load(&self) -> f64 {
        self.cognitive_load
    }

    pub fn set_cognitive_load(&mut self, value: f64) {
        self.cognitive_load = clamp01(value);
    }

    pub fn bump_cognitive_load(&mut self, delta: f64) {
        self.set_cognitive_load(self.cognitive_load + delta);
    }

    /// Decay cognitive load by a multiplicative factor (≤1).
    pub fn decay_cognitive_load(&mut self, factor: f64) {
        self.cognitive_load = clamp01(self.cognitive_load * factor);
    }

    #[must_use]
    pub fn fatigue(&self) -> f64 {
        self.fatigue
    }

    pub fn set_fatigue(&mut self, value: f64) {
        self.fatigue = clamp01(value);
    }

    /// `energy = 1 - fatigue`, a documentation convenience only: this is
    /// never stored independently.
    #[must_use]
    pub fn energy(&self) -> f64 {
        1.0 - self.fatigue
    }

    pub fn nudge_emotion(&mut self, key: &str, delta: f64) {
        let entry = self.emotional_tone.entry(key.to_string()).or_insert(0.0);
        *entry = clamp01(*entry + delta);
    }

    #[must_use]
    pub fn emotion(&self, key: &str) -> f64 {
        self.emotional_tone.get(key).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn curiosity_tone(&self) -> f64 {
        self.emotion("curiosity")
    }

    pub fn record_thought(&mut self, thought: &Thought) {
        for tag in &thought.tags {
            self.recent_topics.push(tag.clone());
        }
        self.working_memory.push(thought.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thought_ids_are_unique() {
        assert_ne!(ThoughtId::new(), ThoughtId::new());
    }

    #[test]
    fn thought_clamps_confidence_and_depth() {
        let thought = Thought::new(ThoughtType::Insight, "x", ThoughtSource::Stream)
            .with_confidence(1.5)
            .with_depth(-0.2);
        assert_eq!(thought.confidence(), 1.0);
        assert_eq!(thought.depth(), 0.0);
    }

    #[test]
    fn clears_trace_threshold_respects_product() {
        let thought = Thought::new(ThoughtType::Insight, "x", ThoughtSource::Stream)
            .with_confidence(0.8)
            .with_depth(0.8);
        assert!(thought.clears_trace_threshold(0.3));
        assert!(!thought.clears_trace_threshold(0.7));
    }

    #[test]
    #[should_panic(expected = "at least 2 supporting traces")]
    fn pattern_requires_two_traces() {
        let _ = Pattern::new("desc", vec![TraceId::new()], "domain", 0.5);
    }

    #[test]
    fn pattern_reinforce_caps_at_one() {
        let mut pattern = Pattern::new(
            "desc",
            vec![TraceId::new(), TraceId::new()],
            "domain",
            0.95,
        );
        pattern.reinforce();
        assert_eq!(pattern.strength(), 1.0);
    }

    #[test]
    #[should_panic(expected = "at least 2 patterns")]
    fn wisdom_requires_two_patterns() {
        let _ = Wisdom::new("content", vec![PatternId::new()], 0.9, 0.5, 0.5, "domain");
    }

    #[test]
    fn wisdom_clamps_confidence() {
        let wisdom = Wisdom::new(
            "content",
            vec![PatternId::new(), PatternId::new()],
            1.7,
            -0.3,
            0.5,
            "domain",
        );
        assert_eq!(wisdom.confidence, 1.0);
        assert_eq!(wisdom.applicability, 0.0);
    }

    #[test]
    fn bounded_evicts_oldest() {
        let mut bounded = Bounded::new(3);
        bounded.push(1);
        bounded.push(2);
        bounded.push(3);
        bounded.push(4);
        assert_eq!(bounded.len(), 3);
        assert_eq!(bounded.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn cognitive_state_scalars_stay_in_unit_interval() {
        let mut state = CognitiveState::default();
        state.set_awareness(5.0);
        state.set_cognitive_load(-5.0);
        state.set_fatigue(2.0);
        assert_eq!(state.awareness(), 1.0);
        assert_eq!(state.cognitive_load(), 0.0);
        assert_eq!(state.fatigue(), 1.0);
    }

    #[test]
    fn energy_is_one_minus_fatigue() {
        let mut state = CognitiveState::default();
        state.set_fatigue(0.3);
        assert!((state.energy() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn working_memory_bounded_to_seven() {
        let mut state = CognitiveState::default();
        for i in 0..10 {
            let thought = Thought::new(ThoughtType::Memory, format!("t{i}"), ThoughtSource::Stream);
            state.record_thought(&thought);
        }
        assert_eq!(state.working_memory.len(), 7);
    }

    #[test]
    fn recent_topics_bounded_to_ten() {
        let mut state = CognitiveState::default();
        for i in 0..15 {
            let thought = Thought::new(ThoughtType::Memory, "t", ThoughtSource::Stream)
                .with_tags(vec![format!("tag{i}")]);
            state.record_thought(&thought);
        }
        assert_eq!(state.recent_topics.len(), 10);
    }
}
