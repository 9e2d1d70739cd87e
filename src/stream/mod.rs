//! Stream-of-Consciousness Engine (§4.2): continuously produces Thoughts
//! driven by internal cognitive state rather than external requests.
//!
//! Modeled as `ThoughtStreamActor`, the generalization of a
//! thought-assembly actor: where that actor turned `(Content, Salience)`
//! pairs into a `Thought`, this one turns `(ThoughtType, CognitiveState
//! snapshot)` into a `Thought`, via either the LLM manager or the template
//! fallback.

mod context;
mod selection;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::identity::Identity;
use crate::lifecycle::LifecycleMessage;
use crate::llm::{GenerationOptions, ProviderManager, TemplateProvider};
use crate::memory::MemoryStore;
use crate::types::{Bounded, CognitiveState, EpisodicTrace, Thought, ThoughtSource, ThoughtType};

use selection::StreakTracker;

/// Messages understood by [`ThoughtStreamActor`].
pub enum StreamMessage {
    Start,
    Stop(RpcReplyPort<()>),
    GenerateAutonomous {
        type_hint: Option<ThoughtType>,
        reply: RpcReplyPort<Thought>,
    },
    React {
        stimulus: String,
        reply: RpcReplyPort<Thought>,
    },
    Recent {
        n: usize,
        reply: RpcReplyPort<Vec<Thought>>,
    },
    SetActiveGoals(bool),
    /// Fire-and-forget request for one autonomous Thought, driven by a
    /// scheduler step handler (§4.1: "each step may request a thought from
    /// the Stream-of-Consciousness"). Unlike `GenerateAutonomous`, there is
    /// no reply port: the scheduler does not block a tick on generation.
    TriggerAutonomous(Option<ThoughtType>),
    /// Internal per-second cadence tick; reschedules itself while running.
    CadenceTick,
}

pub struct ThoughtStreamActor;

pub struct StreamArgs {
    pub identity: Arc<Identity>,
    pub llm: Arc<ProviderManager>,
    pub memory: Arc<MemoryStore>,
    pub lifecycle: Option<ActorRef<LifecycleMessage>>,
    pub config: RuntimeConfig,
}

pub struct StreamState {
    identity: Arc<Identity>,
    llm: Arc<ProviderManager>,
    memory: Arc<MemoryStore>,
    lifecycle: Option<ActorRef<LifecycleMessage>>,
    template: TemplateProvider,
    cognitive_state: CognitiveState,
    history: Bounded<Thought>,
    streaks: StreakTracker,
    rng: rand::rngs::StdRng,
    running: bool,
    has_active_goals: bool,
    seconds_since_insight: u64,
    seconds_since_metacognition: u64,
    history_size: usize,
    trace_threshold: f64,
}

#[ractor::async_trait]
impl Actor for ThoughtStreamActor {
    type Msg = StreamMessage;
    type State = StreamState;
    type Arguments = StreamArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: StreamArgs,
    ) -> Result<Self::State, ActorProcessingErr> {
        use rand::SeedableRng;
        Ok(StreamState {
            identity: args.identity,
            llm: args.llm,
            memory: args.memory,
            lifecycle: args.lifecycle,
            template: TemplateProvider::new(),
            cognitive_state: CognitiveState::default(),
            history: Bounded::new(args.config.history_size),
            streaks: StreakTracker::new(),
            rng: rand::rngs::StdRng::from_rng(&mut rand::rng()),
            running: false,
            has_active_goals: false,
            seconds_since_insight: 0,
            seconds_since_metacognition: 0,
            history_size: args.config.history_size,
            trace_threshold: args.config.trace_threshold,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StreamMessage::Start => {
                if !state.running {
                    state.running = true;
                    info!("stream-of-consciousness engine starting");
                    myself.send_after(Duration::from_secs(1), || StreamMessage::CadenceTick);
                }
            }
            StreamMessage::Stop(reply) => {
                state.running = false;
                info!("stream-of-consciousness engine stopped");
                let _ = reply.send(());
            }
            StreamMessage::GenerateAutonomous { type_hint, reply } => {
                let thought = generate(state, type_hint, ThoughtSource::SchedulerStep).await;
                let _ = reply.send(thought);
            }
            StreamMessage::React { stimulus, reply } => {
                let thought = react(state, &stimulus).await;
                let _ = reply.send(thought);
            }
            StreamMessage::Recent { n, reply } => {
                let recent: Vec<Thought> = state.history.recent(n).into_iter().cloned().collect();
                let _ = reply.send(recent);
            }
            StreamMessage::SetActiveGoals(active) => {
                state.has_active_goals = active;
            }
            StreamMessage::TriggerAutonomous(type_hint) => {
                let thought = generate(state, type_hint, ThoughtSource::SchedulerStep).await;
                debug!(kind = %thought.kind, "scheduler-driven thought generated");
            }
            StreamMessage::CadenceTick => {
                if !state.running {
                    return Ok(());
                }
                tick_cadence(state).await;
                myself.send_after(Duration::from_secs(1), || StreamMessage::CadenceTick);
            }
        }
        Ok(())
    }
}

/// Probability of emitting a Thought in the current 1-second window (§4.2).
fn emission_probability(state: &CognitiveState) -> f64 {
    let curiosity = state.curiosity_tone();
    let p = 0.3 + 0.3 * curiosity + 0.2 * state.awareness() + 0.1 * (state.working_memory.len() as f64 / 7.0)
        - 0.3 * state.cognitive_load();
    p.clamp(0.0, 1.0)
}

async fn tick_cadence(state: &mut StreamState) {
    state.seconds_since_insight += 1;
    state.seconds_since_metacognition += 1;

    let probability = emission_probability(&state.cognitive_state);
    let roll: f64 = state.rng.random();

    let forced_type = if state.seconds_since_insight >= 30 {
        state.seconds_since_insight = 0;
        Some(ThoughtType::Insight)
    } else if state.seconds_since_metacognition >= 60 {
        state.seconds_since_metacognition = 0;
        Some(ThoughtType::MetaCognition)
    } else {
        None
    };

    if forced_type.is_some() || roll < probability {
        let thought = generate(state, forced_type, ThoughtSource::Stream).await;
        debug!(kind = %thought.kind, confidence = thought.confidence(), "stream emitted thought");
    }
}

async fn generate(state: &mut StreamState, type_hint: Option<ThoughtType>, source: ThoughtSource) -> Thought {
    let kind = type_hint.unwrap_or_else(|| {
        selection::select_thought_type(&state.cognitive_state, state.has_active_goals, &mut state.streaks, &mut state.rng)
    });

    let recent_refs: Vec<&Thought> = state.history.recent(5);
    let prompt = context::build_prompt(&state.identity, &state.cognitive_state, &recent_refs, kind);

    let thought = match state.llm.generate(&prompt, &GenerationOptions::default()).await {
        Ok(content) => Thought::new(kind, content, source).with_confidence(0.7).with_depth(0.6),
        Err(err) => {
            warn!(error = %err, "llm generation failed, falling back to template");
            let content = state.template.render(kind);
            Thought::new(kind, content, ThoughtSource::Template).with_confidence(0.35).with_depth(0.3)
        }
    };

    apply_state_updates(state, &thought).await;
    thought
}

async fn react(state: &mut StreamState, stimulus: &str) -> Thought {
    let kind = ThoughtType::Perception;
    let recent_refs: Vec<&Thought> = state.history.recent(5);
    let mut prompt = context::build_prompt(&state.identity, &state.cognitive_state, &recent_refs, kind);
    prompt.push_str(&format!("\nRespond to this external stimulus: {stimulus}"));

    let thought = match state.llm.generate(&prompt, &GenerationOptions::default()).await {
        Ok(content) => Thought::new(kind, content, ThoughtSource::ExternalStimulus)
            .with_confidence(0.6)
            .with_depth(0.5),
        Err(_) => {
            let content = state.template.render(kind);
            Thought::new(kind, content, ThoughtSource::Template).with_confidence(0.35).with_depth(0.3)
        }
    };

    apply_state_updates(state, &thought).await;
    thought
}

/// §4.2 "State updates on each Thought", plus §3's trace-promotion rule:
/// a Thought whose `confidence * depth` clears `trace_threshold` is recorded
/// as an `EpisodicTrace` and counted toward the lifecycle's dream trigger.
async fn apply_state_updates(state: &mut StreamState, thought: &Thought) {
    state.history.push(thought.clone());
    state.cognitive_state.record_thought(thought);

    match thought.kind {
        ThoughtType::Insight | ThoughtType::Connection => {
            state.cognitive_state.nudge_emotion("satisfaction", 0.1);
            state.cognitive_state.nudge_emotion("confidence", 0.1);
        }
        ThoughtType::Doubt => state.cognitive_state.nudge_emotion("confidence", -0.1),
        ThoughtType::Question | ThoughtType::Wonder => state.cognitive_state.nudge_emotion("curiosity", 0.1),
        _ => {}
    }

    state.cognitive_state.bump_cognitive_load(0.02);

    if thought.clears_trace_threshold(state.trace_threshold) {
        let trace = EpisodicTrace::new(thought.clone(), thought.confidence());
        state.memory.push_trace(trace).await;
        if let Some(lifecycle) = &state.lifecycle {
            let _ = lifecycle.cast(LifecycleMessage::AddUnconsolidatedTraces(1));
        }
    }

    let _ = state.history_size;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_probability_is_clamped() {
        let mut state = CognitiveState::default();
        state.set_cognitive_load(1.0);
        assert!(emission_probability(&state) >= 0.0);
        state.set_cognitive_load(0.0);
        state.set_awareness(1.0);
        state.nudge_emotion("curiosity", 1.0);
        assert!(emission_probability(&state) <= 1.0);
    }

    #[tokio::test]
    async fn generate_falls_back_to_template_when_no_providers() {
        let identity = Arc::new(Identity::new(vec![], vec![]));
        let llm = Arc::new(ProviderManager::new());
        let mut state = StreamState {
            identity,
            llm,
            memory: Arc::new(MemoryStore::new(Vec::new(), Vec::new(), Vec::new())),
            lifecycle: None,
            template: TemplateProvider::new(),
            cognitive_state: CognitiveState::default(),
            history: Bounded::new(1000),
            streaks: StreakTracker::new(),
            rng: {
                use rand::SeedableRng;
                rand::rngs::StdRng::seed_from_u64(1)
            },
            running: false,
            has_active_goals: false,
            seconds_since_insight: 0,
            seconds_since_metacognition: 0,
            history_size: 1000,
            trace_threshold: 0.3,
        };

        let thought = generate(&mut state, Some(ThoughtType::Insight), ThoughtSource::Stream).await;
        assert_eq!(thought.source, ThoughtSource::Template);
        assert!(thought.confidence() <= 0.4);
    }

    #[tokio::test]
    async fn qualifying_thought_is_promoted_to_a_trace() {
        let identity = Arc::new(Identity::new(vec![], vec![]));
        let llm = Arc::new(ProviderManager::new());
        let memory = Arc::new(MemoryStore::new(Vec::new(), Vec::new(), Vec::new()));
        let mut state = StreamState {
            identity,
            llm,
            memory: memory.clone(),
            lifecycle: None,
            template: TemplateProvider::new(),
            cognitive_state: CognitiveState::default(),
            history: Bounded::new(1000),
            streaks: StreakTracker::new(),
            rng: {
                use rand::SeedableRng;
                rand::rngs::StdRng::seed_from_u64(1)
            },
            running: false,
            has_active_goals: false,
            seconds_since_insight: 0,
            seconds_since_metacognition: 0,
            history_size: 1000,
            trace_threshold: 0.1,
        };

        let thought = Thought::new(ThoughtType::Insight, "qualifies", ThoughtSource::Stream)
            .with_confidence(0.9)
            .with_depth(0.9);
        apply_state_updates(&mut state, &thought).await;

        assert_eq!(memory.traces.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn sub_threshold_thought_is_not_promoted() {
        let identity = Arc::new(Identity::new(vec![], vec![]));
        let llm = Arc::new(ProviderManager::new());
        let memory = Arc::new(MemoryStore::new(Vec::new(), Vec::new(), Vec::new()));
        let mut state = StreamState {
            identity,
            llm,
            memory: memory.clone(),
            lifecycle: None,
            template: TemplateProvider::new(),
            cognitive_state: CognitiveState::default(),
            history: Bounded::new(1000),
            streaks: StreakTracker::new(),
            rng: {
                use rand::SeedableRng;
                rand::rngs::StdRng::seed_from_u64(1)
            },
            running: false,
            has_active_goals: false,
            seconds_since_insight: 0,
            seconds_since_metacognition: 0,
            history_size: 1000,
            trace_threshold: 0.9,
        };

        let thought = Thought::new(ThoughtType::Perception, "below bar", ThoughtSource::Stream)
            .with_confidence(0.2)
            .with_depth(0.2);
        apply_state_updates(&mut state, &thought).await;

        assert!(memory.traces.lock().await.is_empty());
    }
}
