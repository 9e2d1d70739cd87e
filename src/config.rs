//! Runtime configuration (§6 Environment/configuration keys).
//!
//! Named preset constructors plus a `clap`-derived CLI overlay, rather than
//! a single all-defaults constructor.

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Every recognized environment/configuration key from §6, with the §4
/// defaults baked in as `Default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub step_period: Duration,
    pub pivot_timeout: Duration,
    pub event_queue_size: usize,
    pub history_size: usize,
    pub checkpoint_path: String,
    pub checkpoint_interval: Duration,
    pub llm_provider_order: Vec<String>,

    pub min_awake: Duration,
    pub max_awake: Duration,
    pub min_rest: Duration,
    pub max_rest: Duration,
    pub max_dream: Duration,

    pub fatigue_rest_threshold: f64,
    pub fatigue_wake_threshold: f64,
    pub load_rest_threshold: f64,
    pub consolidation_need_threshold: f64,

    pub max_traces: usize,
    pub prune_threshold: f64,
    pub trace_threshold: f64,

    pub templates_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            step_period: Duration::from_secs(1),
            pivot_timeout: Duration::from_millis(250),
            event_queue_size: 1024,
            history_size: 1000,
            checkpoint_path: "echobeats_checkpoint.json".to_string(),
            checkpoint_interval: Duration::from_secs(15 * 60),
            llm_provider_order: Vec::new(),

            min_awake: Duration::from_secs(30 * 60),
            max_awake: Duration::from_secs(4 * 60 * 60),
            min_rest: Duration::from_secs(5 * 60),
            max_rest: Duration::from_secs(30 * 60),
            max_dream: Duration::from_secs(15 * 60),

            fatigue_rest_threshold: 0.75,
            fatigue_wake_threshold: 0.25,
            load_rest_threshold: 0.80,
            consolidation_need_threshold: 0.70,

            max_traces: 10_000,
            prune_threshold: 0.3,
            trace_threshold: 0.3,

            templates_enabled: true,
        }
    }
}

impl RuntimeConfig {
    /// A development preset: fast cycle for interactive observation.
    #[must_use]
    pub fn dev() -> Self {
        Self {
            step_period: Duration::from_millis(100),
            pivot_timeout: Duration::from_millis(50),
            min_awake: Duration::from_secs(30),
            max_awake: Duration::from_secs(120),
            min_rest: Duration::from_secs(10),
            max_rest: Duration::from_secs(30),
            max_dream: Duration::from_secs(15),
            checkpoint_interval: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// The production defaults, spelled out explicitly rather than relying
    /// on `Default` so callers can see the preset name in logs.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_checkpoint_path(mut self, path: impl Into<String>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    #[must_use]
    pub fn with_provider_order(mut self, order: Vec<String>) -> Self {
        self.llm_provider_order = order;
        self
    }

    /// Merge CLI-supplied overrides ([`CliArgs`]) onto this config.
    #[must_use]
    pub fn merge_cli(mut self, args: &CliArgs) -> Self {
        if let Some(secs) = args.step_period_secs {
            self.step_period = Duration::from_secs_f64(secs);
        }
        if let Some(path) = &args.checkpoint_path {
            self.checkpoint_path = path.clone();
        }
        if let Some(mins) = args.checkpoint_interval_mins {
            self.checkpoint_interval = Duration::from_secs(mins * 60);
        }
        if let Some(order) = &args.llm_provider_order {
            self.llm_provider_order = order.split(',').map(str::trim).map(String::from).collect();
        }
        if args.disable_templates {
            self.templates_enabled = false;
        }
        self
    }
}

/// CLI overlay for [`RuntimeConfig`]. Binary-only plumbing; not part of
/// the core's public library surface.
#[derive(Debug, Parser)]
#[command(name = "echobeats", about = "Autonomous cognitive runtime")]
pub struct CliArgs {
    /// Scheduler tick period, in seconds.
    #[arg(long)]
    pub step_period_secs: Option<f64>,

    /// Path to the checkpoint file.
    #[arg(long)]
    pub checkpoint_path: Option<String>,

    /// Checkpoint save interval, in minutes.
    #[arg(long)]
    pub checkpoint_interval_mins: Option<u64>,

    /// Comma-separated LLM provider fallback order.
    #[arg(long)]
    pub llm_provider_order: Option<String>,

    /// Refuse to start without a usable LLM provider chain (§8 Scenario F).
    #[arg(long, default_value_t = false)]
    pub disable_templates: bool,

    /// Start from a fresh Identity even if a checkpoint exists.
    #[arg(long, default_value_t = false)]
    pub fresh_start: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.step_period, Duration::from_secs(1));
        assert_eq!(config.pivot_timeout, Duration::from_millis(250));
        assert_eq!(config.event_queue_size, 1024);
        assert_eq!(config.history_size, 1000);
    }

    #[test]
    fn dev_preset_shortens_durations() {
        let config = RuntimeConfig::dev();
        assert!(config.step_period < RuntimeConfig::default().step_period);
        assert!(config.max_awake < RuntimeConfig::default().max_awake);
    }

    #[test]
    fn merge_cli_overrides_only_set_fields() {
        let args = CliArgs {
            step_period_secs: Some(0.5),
            checkpoint_path: None,
            checkpoint_interval_mins: None,
            llm_provider_order: Some("a, b , c".into()),
            disable_templates: true,
            fresh_start: false,
        };
        let config = RuntimeConfig::default().merge_cli(&args);
        assert_eq!(config.step_period, Duration::from_secs_f64(0.5));
        assert_eq!(config.checkpoint_path, RuntimeConfig::default().checkpoint_path);
        assert_eq!(config.llm_provider_order, vec!["a", "b", "c"]);
        assert!(!config.templates_enabled);
    }
}
