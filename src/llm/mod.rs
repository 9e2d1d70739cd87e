//! LLM Provider Abstraction (§4.5): a uniform generation interface plus a
//! priority-ordered fallback chain across vendor adapters. No concrete
//! vendor adapter ships here — only the trait, the manager, and the
//! always-available template fallback in [`template`].

pub mod manager;
pub mod template;

use std::time::Duration;

use async_trait::async_trait;

pub use manager::ProviderManager;
pub use template::TemplateProvider;

use crate::error::ProviderError;

/// Options threaded through a single generation call (§4.5 Provider contract).
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 512,
            stop_sequences: Vec::new(),
        }
    }
}

/// One chunk of a streamed generation (§4.5: "finite, not restartable").
#[derive(Debug, Clone)]
pub struct GenerationChunk {
    pub content: String,
    pub done: bool,
}

/// The capability set required of every LLM adapter (§4.5). No adapter
/// implementing a concrete vendor wire format ships in this crate — only
/// [`TemplateProvider`], the always-available last link in the fallback
/// chain.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique within this process.
    fn name(&self) -> &str;

    /// Config/credentials present; does not probe the network.
    fn available(&self) -> bool;

    fn max_tokens(&self) -> u32;

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ProviderError>;

    /// Default streaming implementation: a single non-streaming call
    /// surfaced as one `done=true` chunk. Adapters capable of true
    /// incremental streaming should override this.
    async fn stream_generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<GenerationChunk>, ProviderError> {
        let content = self.generate(prompt, options).await?;
        Ok(vec![GenerationChunk { content, done: true }])
    }
}

/// Per-call timeout for LLM generation (§5: "calling thread ... with a
/// per-call timeout (default 30s)").
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
