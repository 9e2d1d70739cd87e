//! Per-engine state and the 12-step program (§4.1).

use crate::types::EngineId;

/// Steps 0 and 6 require cross-engine synchronization before dispatch.
#[must_use]
pub fn is_pivotal(logical_step: u8) -> bool {
    logical_step == 0 || logical_step == 6
}

/// One of the three phase-offset dispatch lanes.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub id: EngineId,
    pub phase_offset: u8,
    pub steps_processed: u64,
}

impl EngineState {
    #[must_use]
    pub fn new(id: EngineId) -> Self {
        Self {
            phase_offset: id.phase_offset(),
            id,
            steps_processed: 0,
        }
    }

    /// `(current_step + phase_offset) mod 12` (§3 "SchedulerState").
    #[must_use]
    pub fn logical_step(&self, current_step: u8) -> u8 {
        (current_step + self.phase_offset) % 12
    }
}

/// Assert the §3/§8 pairwise-distinctness invariant: the three engines'
/// logical steps must form `{s, (s+4) mod 12, (s+8) mod 12}` for some `s`.
pub fn assert_logical_steps_distinct(engines: &[EngineState; 3], current_step: u8) {
    let steps: Vec<u8> = engines.iter().map(|e| e.logical_step(current_step)).collect();
    crate::error::invariant(
        steps[0] != steps[1] && steps[1] != steps[2] && steps[0] != steps[2],
        format!("engine logical steps collided at current_step={current_step}: {steps:?}"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivotal_steps_are_exactly_zero_and_six() {
        for step in 0..12u8 {
            assert_eq!(is_pivotal(step), step == 0 || step == 6);
        }
    }

    #[test]
    fn logical_steps_are_pairwise_distinct_at_every_tick() {
        let engines = [
            EngineState::new(EngineId::new(0)),
            EngineState::new(EngineId::new(1)),
            EngineState::new(EngineId::new(2)),
        ];
        for current_step in 0..12u8 {
            assert_logical_steps_distinct(&engines, current_step);
        }
    }

    #[test]
    fn logical_steps_match_offset_set() {
        let engines = [
            EngineState::new(EngineId::new(0)),
            EngineState::new(EngineId::new(1)),
            EngineState::new(EngineId::new(2)),
        ];
        let s = 3u8;
        let mut steps: Vec<u8> = engines.iter().map(|e| e.logical_step(s)).collect();
        steps.sort_unstable();
        let mut expected = vec![s, (s + 4) % 12, (s + 8) % 12];
        expected.sort_unstable();
        assert_eq!(steps, expected);
    }
}
