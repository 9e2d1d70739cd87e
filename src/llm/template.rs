//! The always-available template fallback provider. Backs §8 Scenario F's
//! "disable templates" edge case by being the one provider that can be
//! turned off via configuration rather than by failing.

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::error::ProviderError;
use crate::llm::{GenerationOptions, LlmProvider};
use crate::types::ThoughtType;

const NAME: &str = "template";

/// Grammatically plausible filler sentences, substituted per requested
/// [`ThoughtType`]. Not meant to be convincing text, only structurally valid
/// degraded-mode output (§4.2: "emits a grammatically plausible Thought").
fn templates_for(kind: ThoughtType) -> &'static [&'static str] {
    match kind {
        ThoughtType::Perception => &[
            "Something in the current context draws attention.",
            "A detail in the surroundings stands out.",
        ],
        ThoughtType::Reflection => &[
            "Looking back, a pattern in recent activity seems worth noting.",
            "There's a thread connecting the last few moments.",
        ],
        ThoughtType::Question => &[
            "What would happen if this assumption were wrong?",
            "Is there a simpler explanation being missed?",
        ],
        ThoughtType::Insight => &[
            "This connects to something noticed earlier.",
            "A small realization just clicked into place.",
        ],
        ThoughtType::Planning => &[
            "The next step should follow from what just happened.",
            "A course of action is starting to take shape.",
        ],
        ThoughtType::Memory => &[
            "This recalls something from a previous cycle.",
            "A prior thought resurfaces in a new light.",
        ],
        ThoughtType::MetaCognition => &[
            "Noticing the shape of this thinking process itself.",
            "The current train of thought deserves a second look.",
        ],
        ThoughtType::Wonder => &[
            "There's something genuinely curious about this.",
            "It would be interesting to explore this further.",
        ],
        ThoughtType::Doubt => &[
            "This conclusion might not hold up to scrutiny.",
            "There's a nagging uncertainty here.",
        ],
        ThoughtType::Connection => &[
            "This links to an idea from a different context entirely.",
            "Two previously unrelated threads seem to fit together.",
        ],
    }
}

/// Emits substitution-based Thought text when no LLM provider is available.
/// Always `available()`; this is the guaranteed last link in the fallback
/// chain (§4.5).
pub struct TemplateProvider;

impl Default for TemplateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Produce template text for a specific thought type directly, bypassing
    /// the generic `generate(prompt, ...)` path, since the template provider
    /// has no use for a free-text prompt beyond the type hint.
    #[must_use]
    pub fn render(&self, kind: ThoughtType) -> String {
        let options = templates_for(kind);
        let mut rng = rand::rng();
        (*options.choose(&mut rng).unwrap_or(&options[0])).to_string()
    }
}

#[async_trait]
impl LlmProvider for TemplateProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn available(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        64
    }

    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String, ProviderError> {
        Ok(self.render(ThoughtType::Reflection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_returns_nonempty_text_for_every_type() {
        let provider = TemplateProvider::new();
        for kind in ThoughtType::ALL {
            assert!(!provider.render(kind).is_empty());
        }
    }

    #[tokio::test]
    async fn generate_never_fails() {
        let provider = TemplateProvider::new();
        let result = provider.generate("anything", &GenerationOptions::default()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn template_provider_is_always_available() {
        assert!(TemplateProvider::new().available());
    }
}
