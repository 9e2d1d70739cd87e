//! Weighted-random thought-type selection with anti-repeat (§4.2 Selection
//! rules). Kept separate from the actor so the draw logic is unit-testable
//! without spinning up an actor.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::types::{CognitiveState, ThoughtType};

/// Maximum consecutive draws of the same type before the engine promotes
/// the next-weighted alternative (§4.2: "must not select the same type ≥5
/// times consecutively").
const MAX_STREAK: usize = 4;

/// Bias multiplier applied to state-favored types (§4.2: "weight the chosen
/// type ×3").
const BIAS_WEIGHT: f64 = 3.0;
const BASE_WEIGHT: f64 = 1.0;

/// Tracks the run of identical consecutive draws so the anti-repeat rule can
/// be enforced across calls.
#[derive(Debug, Default, Clone)]
pub struct StreakTracker {
    last: Option<ThoughtType>,
    streak: usize,
}

impl StreakTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, kind: ThoughtType) {
        match self.last {
            Some(prev) if prev == kind => self.streak += 1,
            _ => self.streak = 1,
        }
        self.last = Some(kind);
    }

    fn would_exceed(&self, kind: ThoughtType) -> bool {
        matches!(self.last, Some(prev) if prev == kind) && self.streak >= MAX_STREAK
    }
}

/// The set of types biased by current state, per §4.2's selection rules.
/// More than one rule may fire simultaneously; their biased sets are unioned.
fn biased_types(state: &CognitiveState) -> Vec<ThoughtType> {
    let mut biased = Vec::new();
    if state.awareness() > 0.8 {
        biased.push(ThoughtType::MetaCognition);
    }
    if state.curiosity_tone() > 0.7 {
        biased.push(ThoughtType::Question);
        biased.push(ThoughtType::Wonder);
    }
    if state.awareness() < 0.6 {
        biased.push(ThoughtType::Reflection);
    }
    biased
}

/// Draw a [`ThoughtType`] from a weighted distribution shaped by the current
/// [`CognitiveState`], re-rolling against a reduced weight set when the draw
/// would extend a streak of the same type past [`MAX_STREAK`].
///
/// `has_active_goals` stands in for `len(active_goals) > 0` (§4.2): goal
/// tracking itself lives in the caller's state, not in this module.
pub fn select_thought_type(
    state: &CognitiveState,
    has_active_goals: bool,
    streaks: &mut StreakTracker,
    rng: &mut impl Rng,
) -> ThoughtType {
    let mut biased = biased_types(state);
    if has_active_goals {
        biased.push(ThoughtType::Planning);
    }

    let weights: Vec<f64> = ThoughtType::ALL
        .iter()
        .map(|&kind| if biased.contains(&kind) { BIAS_WEIGHT } else { BASE_WEIGHT })
        .collect();

    let drawn = weighted_draw(&weights, rng);

    if streaks.would_exceed(drawn) {
        let mut reduced = weights.clone();
        let idx = ThoughtType::ALL.iter().position(|&k| k == drawn).unwrap();
        reduced[idx] = 0.0;
        let alternative = weighted_draw(&reduced, rng);
        streaks.record(alternative);
        return alternative;
    }

    streaks.record(drawn);
    drawn
}

fn weighted_draw(weights: &[f64], rng: &mut impl Rng) -> ThoughtType {
    let dist = WeightedIndex::new(weights).expect("at least one nonzero weight");
    ThoughtType::ALL[dist.sample(rng)]
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn never_exceeds_max_streak() {
        let state = CognitiveState::default();
        let mut streaks = StreakTracker::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut longest_streak = 1;
        let mut current_streak = 1;
        let mut prev: Option<ThoughtType> = None;

        for _ in 0..500 {
            let drawn = select_thought_type(&state, false, &mut streaks, &mut rng);
            if prev == Some(drawn) {
                current_streak += 1;
            } else {
                current_streak = 1;
            }
            longest_streak = longest_streak.max(current_streak);
            prev = Some(drawn);
        }

        assert!(longest_streak < 5, "streak of {longest_streak} exceeds the ≥5 cap");
    }

    #[test]
    fn high_awareness_favors_metacognition() {
        let mut state = CognitiveState::default();
        state.set_awareness(0.95);
        let mut streaks = StreakTracker::new();
        let mut rng = StdRng::seed_from_u64(7);

        let metacognition_count = (0..200)
            .filter(|_| select_thought_type(&state, false, &mut streaks, &mut rng) == ThoughtType::MetaCognition)
            .count();

        assert!(metacognition_count > 200 / ThoughtType::ALL.len());
    }
}
