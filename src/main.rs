//! Process entry point: CLI flags → `RuntimeConfig`, actor startup in
//! dependency order, orderly shutdown (§4.7), exit-code mapping (§6).
//!
//! This binary is ambient glue, not part of the cognitive core: the CLI
//! parsing and process wiring mirror a conventional `main.rs`/`Args`
//! split between plumbing and library logic.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ractor::Actor;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use echobeats::config::{CliArgs, RuntimeConfig};
use echobeats::dream::{self, DreamInputs};
use echobeats::identity::Identity;
use echobeats::lifecycle::{LifecycleActor, LifecycleArgs, LifecycleMessage, LifecycleState};
use echobeats::llm::{ProviderManager, TemplateProvider};
use echobeats::memory::MemoryStore;
use echobeats::persistence::{self, Checkpoint, CheckpointGate, CognitiveStateSnapshot, CURRENT_SCHEMA_VERSION};
use echobeats::scheduler::{AwakeGate, SchedulerActor, SchedulerArgs, SchedulerHandle, StepContext};
use echobeats::stream::{StreamArgs, StreamMessage, ThoughtStreamActor};
use echobeats::types::{EpisodicTrace, Pattern, Wisdom};

const EXIT_OK: i32 = 0;
const EXIT_CHECKPOINT_LOAD_FAILURE: i32 = 1;
const EXIT_NO_USABLE_PROVIDER: i32 = 2;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = echobeats::resilience::install_panic_hooks() {
        eprintln!("failed to install panic hooks: {err}");
    }

    let config = RuntimeConfig::production().merge_cli(&args);

    let (mut identity, traces, patterns, wisdom) = match load_or_init(&config, args.fresh_start) {
        Ok(state) => state,
        Err(code) => return std::process::ExitCode::from(code as u8),
    };
    identity.begin_session();
    let memory = Arc::new(MemoryStore::new(traces, patterns, wisdom));

    let mut llm = ProviderManager::new();
    if config.templates_enabled {
        llm.register(Arc::new(TemplateProvider::new()));
        llm.set_fallback_chain(vec!["template".to_string()]);
    }
    let provider_count = llm.metrics().providers.len();
    if provider_count == 0 {
        // §8 Scenario F: no usable provider and templates disabled — refuse
        // to enter the Awake state at all.
        error!("no usable LLM provider and templates disabled, exiting before Awake state");
        return std::process::ExitCode::from(EXIT_NO_USABLE_PROVIDER as u8);
    }
    let llm = Arc::new(llm);
    let identity = Arc::new(identity);

    info!(signature = %identity.signature, "starting echobeats runtime");

    let (lifecycle_actor, _lifecycle_handle) = Actor::spawn(
        None,
        LifecycleActor,
        LifecycleArgs { config: config.clone() },
    )
    .await
    .expect("lifecycle actor failed to start");

    let (stream_actor, _stream_handle) = Actor::spawn(
        None,
        ThoughtStreamActor,
        StreamArgs {
            identity: identity.clone(),
            llm: llm.clone(),
            config: config.clone(),
            memory: memory.clone(),
            lifecycle: Some(lifecycle_actor.clone()),
        },
    )
    .await
    .expect("stream actor failed to start");

    let (scheduler_actor, _scheduler_handle) = Actor::spawn(
        None,
        SchedulerActor,
        SchedulerArgs {
            config: config.clone(),
            llm: llm.clone(),
        },
    )
    .await
    .expect("scheduler actor failed to start");

    let scheduler = SchedulerHandle::new(scheduler_actor.clone());
    scheduler.start();
    let _ = stream_actor.cast(StreamMessage::Start);

    // §2/§4.1: each scheduler step may request a thought from the stream.
    for step in 0u8..12 {
        let stream_ref = stream_actor.clone();
        scheduler.subscribe(
            step,
            Arc::new(move |_ctx: StepContext| {
                let _ = stream_ref.cast(StreamMessage::TriggerAutonomous(None));
                Ok(())
            }),
        );
    }

    // §2: the lifecycle manager gates whether the scheduler ticks.
    let wake_scheduler = scheduler.clone();
    let _ = lifecycle_actor.cast(LifecycleMessage::RegisterOnWake(Arc::new(move || {
        wake_scheduler.set_awake_gate(AwakeGate::Awake);
    })));
    let rest_scheduler = scheduler.clone();
    let _ = lifecycle_actor.cast(LifecycleMessage::RegisterOnRest(Arc::new(move || {
        rest_scheduler.set_awake_gate(AwakeGate::NotAwake);
    })));

    // §4.4/§4.7: dream consolidation runs over the live trace store and
    // reports completion back to the lifecycle manager.
    let dream_memory = memory.clone();
    let dream_llm = llm.clone();
    let dream_config = config.clone();
    let dream_lifecycle = lifecycle_actor.clone();
    let _ = lifecycle_actor.cast(LifecycleMessage::RegisterOnDreamStart(Arc::new(move || {
        let memory = dream_memory.clone();
        let llm = dream_llm.clone();
        let config = dream_config.clone();
        let lifecycle = dream_lifecycle.clone();
        tokio::spawn(async move {
            let template = TemplateProvider::new();
            let mut traces = memory.traces.lock().await;
            let mut patterns = memory.patterns.lock().await;
            let mut wisdom = memory.wisdom.lock().await;
            let deadline = tokio::time::Instant::now() + config.max_dream;
            let report = dream::consolidate(
                DreamInputs {
                    traces: &mut traces,
                    patterns: &mut patterns,
                    wisdom: &mut wisdom,
                },
                &llm,
                &template,
                &config,
                deadline,
            )
            .await;
            info!(clusters = report.clusters_found, patterns = report.patterns_created, "dream consolidation complete");
            drop(traces);
            drop(patterns);
            drop(wisdom);
            let _ = lifecycle.cast(LifecycleMessage::ClearUnconsolidatedTraces);
        });
    })));

    let mut checkpoint_gate = CheckpointGate::new(config.checkpoint_interval);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    shutdown_sequence(
        &lifecycle_actor,
        &stream_actor,
        &scheduler,
        &config,
        &identity,
        &memory,
        &llm,
        &mut checkpoint_gate,
    )
    .await;

    std::process::ExitCode::from(EXIT_OK as u8)
}

fn load_or_init(
    config: &RuntimeConfig,
    fresh_start: bool,
) -> Result<(Identity, Vec<EpisodicTrace>, Vec<Pattern>, Vec<Wisdom>), i32> {
    if fresh_start {
        return Ok((
            Identity::new(vec!["curiosity".into(), "coherence".into()], vec!["systems".into()]),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        ));
    }

    match persistence::load(&config.checkpoint_path) {
        Ok(Some(checkpoint)) => {
            info!(path = %config.checkpoint_path, "restored checkpoint");
            Ok((checkpoint.identity, Vec::new(), checkpoint.pattern_library, checkpoint.wisdom_library))
        }
        Ok(None) => {
            info!("no checkpoint found, starting fresh identity");
            Ok((
                Identity::new(vec!["curiosity".into(), "coherence".into()], vec!["systems".into()]),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            ))
        }
        Err(err) => {
            error!(error = %err, "checkpoint load failed");
            Err(EXIT_CHECKPOINT_LOAD_FAILURE)
        }
    }
}

/// §4.7 orderly shutdown: (1) lifecycle → Resting, (2) stream drains and
/// stops, (3) scheduler stops, (4) persistence saves, (5) LLM providers
/// close (no-op here: the manager holds no live connections to close).
#[allow(clippy::too_many_arguments)]
async fn shutdown_sequence(
    lifecycle_actor: &ractor::ActorRef<LifecycleMessage>,
    stream_actor: &ractor::ActorRef<StreamMessage>,
    scheduler: &SchedulerHandle,
    config: &RuntimeConfig,
    identity: &Arc<Identity>,
    memory: &Arc<MemoryStore>,
    llm: &Arc<ProviderManager>,
    checkpoint_gate: &mut CheckpointGate,
) {
    info!("beginning orderly shutdown");

    if let Ok(state) = lifecycle_actor.call(LifecycleMessage::GetState, None).await {
        if state != LifecycleState::Resting {
            info!("transitioning lifecycle to Resting before shutdown");
        }
    }

    if let Ok(reply) = stream_actor.call(StreamMessage::Stop, None).await {
        let _ = reply;
    }

    if let Err(err) = scheduler.stop().await {
        warn!(error = %err, "scheduler did not stop cleanly");
    }

    let template = TemplateProvider::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    let mut traces = memory.traces.lock().await;
    let mut patterns = memory.patterns.lock().await;
    let mut wisdom = memory.wisdom.lock().await;
    let _report = dream::consolidate(
        DreamInputs {
            traces: &mut traces,
            patterns: &mut patterns,
            wisdom: &mut wisdom,
        },
        llm,
        &template,
        config,
        deadline,
    )
    .await;

    let checkpoint = Checkpoint {
        schema_version: CURRENT_SCHEMA_VERSION,
        identity: (**identity).clone(),
        cognitive_state_snapshot: CognitiveStateSnapshot {
            awareness: 0.5,
            cognitive_load: 0.2,
            fatigue: 0.0,
            current_focus: String::new(),
            emotional_tone: std::collections::HashMap::new(),
        },
        thought_history: Vec::new(),
        pattern_library: patterns.clone(),
        wisdom_library: wisdom.clone(),
        interest_patterns: serde_json::json!({}),
        goals: serde_json::json!({}),
        timestamp: chrono::Utc::now(),
        version_string: env!("CARGO_PKG_VERSION").to_string(),
    };

    if let Err(err) = persistence::save(&config.checkpoint_path, &checkpoint) {
        error!(error = %err, "final checkpoint save failed");
    }
    checkpoint_gate.mark_saved();

    info!("shutdown complete");
}
