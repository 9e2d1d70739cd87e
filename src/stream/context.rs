//! LLM prompt assembly for stream generation (§4.2 "Context assembly for
//! LLM calls").

use crate::identity::Identity;
use crate::types::{CognitiveState, Thought, ThoughtType};

/// Type-specific instruction appended after the shared context (§4.2 item d).
fn instruction_for(kind: ThoughtType) -> &'static str {
    match kind {
        ThoughtType::Perception => "Notice something in the current moment and describe it in one sentence.",
        ThoughtType::Reflection => "Reflect briefly on recent activity in one sentence.",
        ThoughtType::Question => "Pose a single genuine question about the current situation.",
        ThoughtType::Insight => "State a short insight connecting recent observations.",
        ThoughtType::Planning => "Propose a single next step in one sentence.",
        ThoughtType::Memory => "Recall something relevant from recent history in one sentence.",
        ThoughtType::MetaCognition => "Comment briefly on the shape of your own current thinking.",
        ThoughtType::Wonder => "Express curiosity about something unresolved, in one sentence.",
        ThoughtType::Doubt => "Voice a brief, specific doubt about a recent conclusion.",
        ThoughtType::Connection => "Draw a one-sentence connection between two otherwise unrelated ideas.",
    }
}

/// Build the full generation prompt: identity preamble, state summary, the
/// last 5 thoughts abbreviated, and a type-specific instruction.
#[must_use]
pub fn build_prompt(identity: &Identity, state: &CognitiveState, recent: &[&Thought], kind: ThoughtType) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are an ongoing cognitive process, identity signature {}, core values: {}.\n",
        identity.signature,
        identity.core_values.join(", ")
    ));

    prompt.push_str(&format!(
        "Current state — awareness: {:.2}, cognitive_load: {:.2}, focus: \"{}\".\n",
        state.awareness(),
        state.cognitive_load(),
        state.current_focus
    ));

    if !recent.is_empty() {
        prompt.push_str("Recent thoughts:\n");
        for thought in recent.iter().take(5) {
            prompt.push_str(&format!("- ({}) {}\n", thought.kind, abbreviate(&thought.content)));
        }
    }

    prompt.push_str(instruction_for(kind));
    prompt
}

fn abbreviate(content: &str) -> String {
    const MAX_LEN: usize = 80;
    if content.len() <= MAX_LEN {
        content.to_string()
    } else {
        format!("{}…", &content[..MAX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThoughtSource;

    #[test]
    fn prompt_includes_signature_and_instruction() {
        let identity = Identity::new(vec!["curiosity".into()], vec!["systems".into()]);
        let state = CognitiveState::default();
        let prompt = build_prompt(&identity, &state, &[], ThoughtType::Question);
        assert!(prompt.contains(&identity.signature));
        assert!(prompt.contains("question"));
    }

    #[test]
    fn prompt_includes_recent_thoughts() {
        let identity = Identity::new(vec![], vec![]);
        let state = CognitiveState::default();
        let thought = Thought::new(ThoughtType::Insight, "a realization", ThoughtSource::Stream);
        let prompt = build_prompt(&identity, &state, &[&thought], ThoughtType::Reflection);
        assert!(prompt.contains("a realization"));
    }
}
