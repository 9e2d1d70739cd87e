//! Wake/Rest/Dream Lifecycle Manager (§4.3): the exact three-state diagram,
//! no other transitions, no terminal state.
//!
//! Generalizes a sleep-state-machine actor, collapsing its
//! richer six-phase state (Awake/EnteringSleep/LightSleep/DeepSleep/
//! Dreaming/Waking) down to exactly `Awake | Resting | Dreaming` — any
//! settling behavior a richer state machine would model as a transitional
//! state happens synchronously inside the transition handler here, not as
//! an observable extra state.

use std::sync::Arc;
use std::time::Duration;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{info, warn};

use crate::config::RuntimeConfig;

/// The exact three states named in §3/§4.3. No terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Awake,
    Resting,
    Dreaming,
}

/// Best-effort transition callback: raising an error is logged and does not
/// prevent the transition (§4.3 "Callbacks").
pub type TransitionCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_wake: Vec<TransitionCallback>,
    on_rest: Vec<TransitionCallback>,
    on_dream_start: Vec<TransitionCallback>,
    on_dream_end: Vec<TransitionCallback>,
}

fn fire_all(callbacks: &[TransitionCallback], name: &str) {
    for callback in callbacks {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback()));
        if result.is_err() {
            warn!(callback = name, "transition callback panicked, continuing");
        }
    }
}

pub enum LifecycleMessage {
    SecondTick,
    SetFatigue(f64),
    SetCognitiveLoad(f64),
    AddUnconsolidatedTraces(usize),
    ClearUnconsolidatedTraces,
    RegisterOnWake(TransitionCallback),
    RegisterOnRest(TransitionCallback),
    RegisterOnDreamStart(TransitionCallback),
    RegisterOnDreamEnd(TransitionCallback),
    GetState(RpcReplyPort<LifecycleState>),
    GetFatigue(RpcReplyPort<f64>),
}

pub struct LifecycleActor;

pub struct LifecycleArgs {
    pub config: RuntimeConfig,
}

pub struct LifecycleActorState {
    config: RuntimeConfig,
    state: LifecycleState,
    time_in_state_secs: u64,
    load_above_threshold_secs: u64,
    fatigue: f64,
    cognitive_load: f64,
    unconsolidated_traces: usize,
    callbacks: Callbacks,
}

impl LifecycleActorState {
    fn consolidation_need(&self) -> f64 {
        (self.unconsolidated_traces as f64 / 50.0).clamp(0.0, 1.0)
    }

    fn should_rest(&self) -> bool {
        self.fatigue >= self.config.fatigue_rest_threshold
            || self.load_above_threshold_secs >= 60
            || self.time_in_state_secs as u64 >= self.config.max_awake.as_secs()
    }

    fn should_wake_from_rest(&self) -> bool {
        (self.fatigue <= self.config.fatigue_wake_threshold
            && self.time_in_state_secs >= self.config.min_rest.as_secs())
            || self.time_in_state_secs >= self.config.max_rest.as_secs()
    }

    fn should_dream(&self) -> bool {
        self.time_in_state_secs >= self.config.min_rest.as_secs() / 2
            && self.consolidation_need() >= self.config.consolidation_need_threshold
    }

    fn should_end_dream(&self, consolidation_complete: bool) -> bool {
        consolidation_complete || self.time_in_state_secs >= self.config.max_dream.as_secs()
    }
}

#[ractor::async_trait]
impl Actor for LifecycleActor {
    type Msg = LifecycleMessage;
    type State = LifecycleActorState;
    type Arguments = LifecycleArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: LifecycleArgs,
    ) -> Result<Self::State, ActorProcessingErr> {
        myself.send_after(Duration::from_secs(1), || LifecycleMessage::SecondTick);
        Ok(LifecycleActorState {
            config: args.config,
            state: LifecycleState::Awake,
            time_in_state_secs: 0,
            load_above_threshold_secs: 0,
            fatigue: 0.0,
            cognitive_load: 0.2,
            unconsolidated_traces: 0,
            callbacks: Callbacks::default(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            LifecycleMessage::SecondTick => {
                tick(state);
                myself.send_after(Duration::from_secs(1), || LifecycleMessage::SecondTick);
            }
            LifecycleMessage::SetFatigue(value) => state.fatigue = value.clamp(0.0, 1.0),
            LifecycleMessage::SetCognitiveLoad(value) => state.cognitive_load = value.clamp(0.0, 1.0),
            LifecycleMessage::AddUnconsolidatedTraces(n) => state.unconsolidated_traces += n,
            LifecycleMessage::ClearUnconsolidatedTraces => state.unconsolidated_traces = 0,
            LifecycleMessage::RegisterOnWake(cb) => state.callbacks.on_wake.push(cb),
            LifecycleMessage::RegisterOnRest(cb) => state.callbacks.on_rest.push(cb),
            LifecycleMessage::RegisterOnDreamStart(cb) => state.callbacks.on_dream_start.push(cb),
            LifecycleMessage::RegisterOnDreamEnd(cb) => state.callbacks.on_dream_end.push(cb),
            LifecycleMessage::GetState(reply) => {
                let _ = reply.send(state.state);
            }
            LifecycleMessage::GetFatigue(reply) => {
                let _ = reply.send(state.fatigue);
            }
        }
        Ok(())
    }
}

/// Per-second accounting (§4.3 "Accounting") plus transition evaluation.
fn tick(state: &mut LifecycleActorState) {
    state.time_in_state_secs += 1;

    match state.state {
        LifecycleState::Awake => {
            state.fatigue = (state.fatigue + 1.0 / (240.0 * 60.0)).min(1.0);
            state.cognitive_load *= 0.99;
            if state.cognitive_load >= state.config.load_rest_threshold {
                state.load_above_threshold_secs += 1;
            } else {
                state.load_above_threshold_secs = 0;
            }

            if state.time_in_state_secs >= state.config.min_awake.as_secs() && state.should_rest() {
                transition_to(state, LifecycleState::Resting);
            }
        }
        LifecycleState::Resting => {
            state.fatigue *= 0.995;

            if state.should_dream() {
                transition_to(state, LifecycleState::Dreaming);
            } else if state.should_wake_from_rest() {
                transition_to(state, LifecycleState::Awake);
            }
        }
        LifecycleState::Dreaming => {
            state.fatigue *= 0.995;

            // Consolidation completion is driven externally (the dream
            // consolidator signals via `ClearUnconsolidatedTraces`); this
            // tick only enforces the `max_dream` upper bound.
            if state.should_end_dream(state.unconsolidated_traces == 0) {
                fire_all(&state.callbacks.on_dream_end, "on_dream_end");
                transition_to(state, LifecycleState::Awake);
            }
        }
    }
}

fn transition_to(state: &mut LifecycleActorState, next: LifecycleState) {
    info!(from = ?state.state, to = ?next, "lifecycle transition");
    match next {
        LifecycleState::Awake => fire_all(&state.callbacks.on_wake, "on_wake"),
        LifecycleState::Resting => fire_all(&state.callbacks.on_rest, "on_rest"),
        LifecycleState::Dreaming => fire_all(&state.callbacks.on_dream_start, "on_dream_start"),
    }
    state.state = next;
    state.time_in_state_secs = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_state() -> LifecycleActorState {
        LifecycleActorState {
            config: RuntimeConfig::dev(),
            state: LifecycleState::Awake,
            time_in_state_secs: 0,
            load_above_threshold_secs: 0,
            fatigue: 0.0,
            cognitive_load: 0.2,
            unconsolidated_traces: 0,
            callbacks: Callbacks::default(),
        }
    }

    #[test]
    fn no_transition_before_min_awake() {
        let mut state = fresh_state();
        state.fatigue = 0.9;
        for _ in 0..10 {
            tick(&mut state);
        }
        assert_eq!(state.state, LifecycleState::Awake);
    }

    #[test]
    fn high_fatigue_triggers_rest_after_min_awake() {
        let mut state = fresh_state();
        state.fatigue = 0.9;
        for _ in 0..state.config.min_awake.as_secs() + 1 {
            tick(&mut state);
        }
        assert_eq!(state.state, LifecycleState::Resting);
    }

    #[test]
    fn rest_transitions_to_dreaming_when_consolidation_needed() {
        let mut state = fresh_state();
        state.state = LifecycleState::Resting;
        state.time_in_state_secs = 0;
        state.unconsolidated_traces = 40;
        for _ in 0..(state.config.min_rest.as_secs() / 2 + 1) {
            tick(&mut state);
        }
        assert_eq!(state.state, LifecycleState::Dreaming);
    }

    #[test]
    fn dream_ends_at_max_dream_even_if_unconsolidated_remain() {
        let mut state = fresh_state();
        state.state = LifecycleState::Dreaming;
        state.time_in_state_secs = 0;
        state.unconsolidated_traces = 5;
        for _ in 0..state.config.max_dream.as_secs() + 1 {
            tick(&mut state);
        }
        assert_eq!(state.state, LifecycleState::Awake);
    }

    #[test]
    fn callback_panic_does_not_abort_transition() {
        let mut state = fresh_state();
        state.callbacks.on_rest.push(Arc::new(|| panic!("boom")));
        state.fatigue = 0.9;
        for _ in 0..state.config.min_awake.as_secs() + 1 {
            tick(&mut state);
        }
        assert_eq!(state.state, LifecycleState::Resting);
    }
}
