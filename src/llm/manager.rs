//! Priority-ordered fallback chain across registered providers, with
//! per-provider atomic metrics (§4.5 Manager contract).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::llm::{GenerationOptions, LlmProvider, DEFAULT_CALL_TIMEOUT};

/// Per-provider counters, exposed via [`ProviderManager::metrics`]. Atomics
/// rather than a mutex: the manager is required to be thread-safe under
/// concurrent `generate` calls from scheduler engines and the stream engine
/// (§4.5 Concurrency), and these are hot counters on that path.
#[derive(Debug, Default)]
struct ProviderCounters {
    request_count: AtomicU64,
    error_count: AtomicU64,
    total_latency_micros: AtomicU64,
}

/// Snapshot of [`ProviderCounters`] suitable for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetrics {
    pub name: String,
    pub request_count: u64,
    pub error_count: u64,
    pub total_latency: Duration,
}

/// Aggregate manager-level metrics, including the §7 `degraded` flag.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerMetrics {
    pub providers: Vec<ProviderMetrics>,
    pub degraded: bool,
}

struct RegisteredProvider {
    provider: Arc<dyn LlmProvider>,
    counters: ProviderCounters,
}

/// Holds providers behind `Arc<dyn LlmProvider>` plus an explicit fallback
/// order, rather than a duck-typed provider list, per §9's re-architecture
/// note on dynamic duck-typed provider objects.
pub struct ProviderManager {
    providers: HashMap<String, RegisteredProvider>,
    fallback_order: Vec<String>,
    backoff_range: (Duration, Duration),
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            fallback_order: Vec::new(),
            backoff_range: (Duration::from_millis(50), Duration::from_millis(500)),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        self.providers.insert(
            name.clone(),
            RegisteredProvider {
                provider,
                counters: ProviderCounters::default(),
            },
        );
        if !self.fallback_order.contains(&name) {
            self.fallback_order.push(name);
        }
    }

    pub fn set_fallback_chain(&mut self, order: Vec<String>) {
        self.fallback_order = order;
    }

    /// Try providers in chain order (§4.5 Manager contract):
    /// - `unauthorized` / `network` / `server_error` → proceed to next.
    /// - `invalid_request` → fail immediately.
    /// - `rate_limited` → backoff then proceed.
    /// - all fail → return the last error.
    pub async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ProviderError> {
        self.generate_with_timeout(prompt, options, DEFAULT_CALL_TIMEOUT).await
    }

    /// `generate`, parameterized on the per-call timeout so it can be
    /// exercised with a short deadline in tests (§5 "per-call timeout,
    /// default 30s").
    async fn generate_with_timeout(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        call_timeout: Duration,
    ) -> Result<String, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for name in &self.fallback_order {
            let Some(registered) = self.providers.get(name) else {
                continue;
            };
            if !registered.provider.available() {
                continue;
            }

            registered.counters.request_count.fetch_add(1, Ordering::Relaxed);
            let started = Instant::now();
            let result = match tokio::time::timeout(call_timeout, registered.provider.generate(prompt, options)).await {
                Ok(inner) => inner,
                Err(_) => Err(ProviderError::Network(name.clone(), format!("call exceeded {call_timeout:?} timeout"))),
            };
            let elapsed = started.elapsed();
            registered
                .counters
                .total_latency_micros
                .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

            match result {
                Ok(text) => return Ok(text),
                Err(err) => {
                    registered.counters.error_count.fetch_add(1, Ordering::Relaxed);
                    warn!(provider = %name, error = %err, "provider generation failed");

                    if matches!(err, ProviderError::InvalidRequest(_, _)) {
                        return Err(err);
                    }
                    if matches!(err, ProviderError::RateLimited(_)) {
                        sleep(self.random_backoff()).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::ChainExhausted("no providers registered".to_string())))
    }

    fn random_backoff(&self) -> Duration {
        let (lo, hi) = self.backoff_range;
        let span = hi.as_millis().saturating_sub(lo.as_millis()).max(1) as u64;
        let jitter = rand::random::<u64>() % span;
        lo + Duration::from_millis(jitter)
    }

    /// `degraded` is set once every provider currently registered has
    /// recorded at least one error (§3.1 `ProviderMetrics`).
    #[must_use]
    pub fn metrics(&self) -> ManagerMetrics {
        let providers: Vec<ProviderMetrics> = self
            .providers
            .values()
            .map(|registered| ProviderMetrics {
                name: registered.provider.name().to_string(),
                request_count: registered.counters.request_count.load(Ordering::Relaxed),
                error_count: registered.counters.error_count.load(Ordering::Relaxed),
                total_latency: Duration::from_micros(registered.counters.total_latency_micros.load(Ordering::Relaxed)),
            })
            .collect();

        let degraded = !providers.is_empty() && providers.iter().all(|p| p.error_count > 0);
        if degraded {
            debug!("provider manager is degraded: all registered providers have failed at least once");
        }
        ManagerMetrics { providers, degraded }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;

    struct FixedProvider {
        name: &'static str,
        result: Result<&'static str, ProviderError>,
        calls: AtomicUsize,
    }

    struct SlowProvider {
        delay: Duration,
    }

    #[async_trait]
    impl LlmProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        fn available(&self) -> bool {
            true
        }

        fn max_tokens(&self) -> u32 {
            128
        }

        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String, ProviderError> {
            tokio::time::sleep(self.delay).await;
            Ok("too late".to_string())
        }
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn available(&self) -> bool {
            true
        }

        fn max_tokens(&self) -> u32 {
            128
        }

        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.result.clone().map(str::to_string).map_err(|e| e.clone())
        }
    }

    #[tokio::test]
    async fn scenario_d_provider_fallback() {
        let mut manager = ProviderManager::new();
        let provider_a = Arc::new(FixedProvider {
            name: "a",
            result: Err(ProviderError::Unauthorized("a".into())),
            calls: AtomicUsize::new(0),
        });
        let provider_b = Arc::new(FixedProvider {
            name: "b",
            result: Err(ProviderError::Network("b".into(), "down".into())),
            calls: AtomicUsize::new(0),
        });
        let provider_c = Arc::new(FixedProvider {
            name: "c",
            result: Ok("ok-thought"),
            calls: AtomicUsize::new(0),
        });

        manager.register(provider_a.clone());
        manager.register(provider_b.clone());
        manager.register(provider_c.clone());
        manager.set_fallback_chain(vec!["a".into(), "b".into(), "c".into()]);

        let output = manager.generate("prompt", &GenerationOptions::default()).await.unwrap();
        assert_eq!(output, "ok-thought");

        let metrics = manager.metrics();
        let by_name = |n: &str| metrics.providers.iter().find(|p| p.name == n).unwrap().clone();
        assert_eq!(by_name("a").error_count, 1);
        assert_eq!(by_name("b").error_count, 1);
        assert_eq!(by_name("c").request_count, 1);
    }

    #[tokio::test]
    async fn invalid_request_fails_immediately_without_trying_next() {
        let mut manager = ProviderManager::new();
        let provider_a = Arc::new(FixedProvider {
            name: "a",
            result: Err(ProviderError::InvalidRequest("a".into(), "bad".into())),
            calls: AtomicUsize::new(0),
        });
        let provider_b = Arc::new(FixedProvider {
            name: "b",
            result: Ok("should-not-run"),
            calls: AtomicUsize::new(0),
        });
        manager.register(provider_a);
        manager.register(provider_b.clone());
        manager.set_fallback_chain(vec!["a".into(), "b".into()]);

        let result = manager.generate("prompt", &GenerationOptions::default()).await;
        assert!(result.is_err());
        assert_eq!(provider_b.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn degraded_flag_requires_all_providers_to_have_failed() {
        let mut manager = ProviderManager::new();
        let provider_a = Arc::new(FixedProvider {
            name: "a",
            result: Err(ProviderError::Unauthorized("a".into())),
            calls: AtomicUsize::new(0),
        });
        manager.register(provider_a);
        manager.set_fallback_chain(vec!["a".into()]);

        assert!(!manager.metrics().degraded);
        let _ = manager.generate("prompt", &GenerationOptions::default()).await;
        assert!(manager.metrics().degraded);
    }

    #[tokio::test]
    async fn call_exceeding_timeout_is_treated_as_a_recoverable_failure() {
        let mut manager = ProviderManager::new();
        manager.register(Arc::new(SlowProvider {
            delay: Duration::from_millis(50),
        }));
        manager.set_fallback_chain(vec!["slow".into()]);

        let result = manager
            .generate_with_timeout("prompt", &GenerationOptions::default(), Duration::from_millis(5))
            .await;

        assert!(result.is_err());
        assert_eq!(manager.metrics().providers[0].error_count, 1);
    }
}
