//! Dream Consolidation Pipeline (§4.4): transforms unconsolidated episodic
//! traces into patterns and wisdom during the Dreaming state, then prunes
//! obsolete traces.
//!
//! Stage 1 (clustering) uses Jaccard overlap over each trace's tag set —
//! deterministic given identical inputs, and aligned with `Thought`'s
//! existing tag field rather than introducing a new similarity engine.

mod cluster;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::llm::{GenerationOptions, ProviderManager, TemplateProvider};
use crate::types::{EpisodicTrace, Pattern, PatternId, TraceId, Wisdom};

pub use cluster::jaccard_overlap;

/// Inputs to one consolidation pass (§4.4 "Inputs").
pub struct DreamInputs<'a> {
    pub traces: &'a mut Vec<EpisodicTrace>,
    pub patterns: &'a mut Vec<Pattern>,
    pub wisdom: &'a mut Vec<Wisdom>,
}

/// Outcome of one consolidation pass, for logging/testing.
#[derive(Debug, Default)]
pub struct ConsolidationReport {
    pub clusters_found: usize,
    pub patterns_created: usize,
    pub patterns_reinforced: usize,
    pub wisdom_created: usize,
    pub traces_pruned: usize,
    pub patterns_pruned: usize,
}

/// Run the four ordered stages to completion. Stage 4 (pruning) always runs,
/// even if stages 1–3 were cut short by `max_dream` expiry, so the trace
/// store cannot grow unboundedly (§4.4 Failure policy).
pub async fn consolidate(
    inputs: DreamInputs<'_>,
    llm: &Arc<ProviderManager>,
    template: &TemplateProvider,
    config: &RuntimeConfig,
    deadline: tokio::time::Instant,
) -> ConsolidationReport {
    let DreamInputs { traces, patterns, wisdom } = inputs;
    let mut report = ConsolidationReport::default();

    if tokio::time::Instant::now() < deadline {
        let clusters = stage1_cluster(traces);
        report.clusters_found = clusters.len();

        stage2_extract_patterns(traces, patterns, &clusters, &mut report);

        if tokio::time::Instant::now() < deadline {
            stage3_derive_wisdom(patterns, wisdom, llm, template, &mut report).await;
        } else {
            warn!("dream consolidation deadline hit before stage 3 (wisdom derivation)");
        }
    } else {
        warn!("dream consolidation deadline hit before stage 1 (clustering)");
    }

    stage4_prune(traces, patterns, config, &mut report);

    info!(
        clusters = report.clusters_found,
        patterns_created = report.patterns_created,
        patterns_reinforced = report.patterns_reinforced,
        wisdom_created = report.wisdom_created,
        traces_pruned = report.traces_pruned,
        "dream consolidation pass complete"
    );
    report
}

/// Stage 1: group unconsolidated traces by tag/content overlap. Iteration
/// order is ascending `timestamp` (§4.4 "Ordering & determinism").
fn stage1_cluster(traces: &[EpisodicTrace]) -> Vec<Vec<TraceId>> {
    let mut candidates: Vec<&EpisodicTrace> = traces.iter().filter(|t| !t.consolidated).collect();
    candidates.sort_by_key(|t| t.thought.timestamp);

    let mut assigned: HashSet<TraceId> = HashSet::new();
    let mut clusters: Vec<Vec<TraceId>> = Vec::new();

    for (i, trace) in candidates.iter().enumerate() {
        if assigned.contains(&trace.id) {
            continue;
        }
        let mut cluster = vec![trace.id];
        for other in candidates.iter().skip(i + 1) {
            if assigned.contains(&other.id) {
                continue;
            }
            if cluster::traces_overlap(trace, other) {
                cluster.push(other.id);
            }
        }
        if cluster.len() >= 2 {
            for id in &cluster {
                assigned.insert(*id);
            }
            clusters.push(cluster);
        }
    }

    clusters
}

/// Stage 2: reinforce an existing Pattern whose supporting traces overlap
/// ≥50% with the candidate cluster, otherwise create a new Pattern.
fn stage2_extract_patterns(
    traces: &mut [EpisodicTrace],
    patterns: &mut Vec<Pattern>,
    clusters: &[Vec<TraceId>],
    report: &mut ConsolidationReport,
) {
    for cluster in clusters {
        let cluster_set: HashSet<TraceId> = cluster.iter().copied().collect();

        let existing = patterns.iter_mut().find(|pattern| {
            let supporting: HashSet<TraceId> = pattern.supporting_trace_ids.iter().copied().collect();
            overlap_fraction(&supporting, &cluster_set) >= 0.5
        });

        if let Some(pattern) = existing {
            pattern.reinforce();
            report.patterns_reinforced += 1;
        } else {
            let domain_tag = dominant_tag(traces, cluster);
            let strength = (0.3 + 0.1 * cluster.len() as f64).min(1.0);
            let pattern = Pattern::new(
                format!("recurring theme across {} traces", cluster.len()),
                cluster.clone(),
                domain_tag,
                strength,
            );
            patterns.push(pattern);
            report.patterns_created += 1;
        }

        for trace in traces.iter_mut() {
            if cluster_set.contains(&trace.id) {
                trace.consolidated = true;
            }
        }
    }
}

fn overlap_fraction(a: &HashSet<TraceId>, b: &HashSet<TraceId>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let smaller = a.len().min(b.len());
    intersection as f64 / smaller as f64
}

fn dominant_tag(traces: &[EpisodicTrace], cluster: &[TraceId]) -> String {
    traces
        .iter()
        .find(|t| cluster.contains(&t.id))
        .and_then(|t| t.thought.tags.first().cloned())
        .unwrap_or_else(|| "general".to_string())
}

/// Stage 3: when ≥2 Patterns share a domain_tag or overlap by ≥1 supporting
/// trace, attempt to synthesize a Wisdom via the LLM (or template fallback).
/// A candidate is accepted only if `confidence ≥ 0.5`; rejection is silent
/// (logged), not an error.
async fn stage3_derive_wisdom(
    patterns: &[Pattern],
    wisdom: &mut Vec<Wisdom>,
    llm: &Arc<ProviderManager>,
    template: &TemplateProvider,
    report: &mut ConsolidationReport,
) {
    let mut sorted: Vec<&Pattern> = patterns.iter().collect();
    sorted.sort_by_key(|p| p.created_at);

    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            let a = sorted[i];
            let b = sorted[j];
            if !related(a, b) {
                continue;
            }

            let prompt = format!(
                "Synthesize one concise insight from these two recurring patterns:\n1. {}\n2. {}\nRespond with a single sentence.",
                a.description, b.description
            );

            let content = match llm.generate(&prompt, &GenerationOptions::default()).await {
                Ok(text) => text,
                Err(_) => template.render(crate::types::ThoughtType::Insight),
            };

            let confidence = (a.strength() + b.strength()) / 2.0;
            if confidence < 0.5 {
                debug!(confidence, "candidate wisdom rejected: confidence below threshold");
                continue;
            }

            let entry = Wisdom::new(
                content,
                vec![a.id, b.id],
                confidence,
                0.5,
                (a.strength() + b.strength()) / 2.0,
                a.domain_tag.clone(),
            );
            wisdom.push(entry);
            report.wisdom_created += 1;
        }
    }
}

fn related(a: &Pattern, b: &Pattern) -> bool {
    if a.domain_tag == b.domain_tag {
        return true;
    }
    let a_set: HashSet<TraceId> = a.supporting_trace_ids.iter().copied().collect();
    b.supporting_trace_ids.iter().any(|id| a_set.contains(id))
}

/// Stage 4: always runs. Prunes traces below the score threshold and
/// patterns whose supporting traces have fallen below 2. Wisdom is never
/// deleted, only superseded (not modeled as pruning).
fn stage4_prune(traces: &mut Vec<EpisodicTrace>, patterns: &mut Vec<Pattern>, config: &RuntimeConfig, report: &mut ConsolidationReport) {
    if traces.len() > config.max_traces {
        let now = Utc::now();
        let before = traces.len();
        traces.sort_by(|a, b| {
            let score_a = a.prune_score(now);
            let score_b = b.prune_score(now);
            score_a.partial_cmp(&score_b).unwrap_or(std::cmp::Ordering::Equal)
        });
        traces.retain(|trace| trace.prune_score(now) >= config.prune_threshold);
        report.traces_pruned = before - traces.len();
    }

    let remaining_ids: HashSet<TraceId> = traces.iter().map(|t| t.id).collect();
    let before_patterns = patterns.len();
    patterns.retain_mut(|pattern| {
        pattern.supporting_trace_ids.retain(|id| remaining_ids.contains(id));
        pattern.is_valid()
    });
    report.patterns_pruned = before_patterns - patterns.len();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Thought, ThoughtSource, ThoughtType};
    use std::time::Duration;

    fn traced(content: &str, tags: Vec<&str>) -> EpisodicTrace {
        let thought = Thought::new(ThoughtType::Reflection, content, ThoughtSource::Stream)
            .with_tags(tags.into_iter().map(String::from).collect())
            .with_confidence(0.8)
            .with_depth(0.8);
        EpisodicTrace::new(thought, 0.8)
    }

    #[tokio::test]
    async fn scenario_c_dream_consolidation() {
        let mut traces: Vec<EpisodicTrace> = (0..10)
            .map(|i| traced(&format!("observation {i}"), vec!["work", "focus"]))
            .collect();
        let mut patterns = Vec::new();
        let mut wisdom = Vec::new();
        let llm = Arc::new(ProviderManager::new());
        let template = TemplateProvider::new();
        let config = RuntimeConfig::default();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(60);

        let report = consolidate(
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

        assert!(report.patterns_created >= 1);
        assert!(patterns.iter().all(Pattern::is_valid));
        assert!(traces.iter().all(|t| t.consolidated));
    }

    #[test]
    fn stage4_prunes_invalid_patterns_after_trace_loss() {
        let mut traces = vec![traced("a", vec!["x"])];
        let trace_id = traces[0].id;
        let mut patterns = vec![Pattern::new("desc", vec![trace_id, TraceId::new()], "domain", 0.5)];
        let config = RuntimeConfig::default();
        let mut report = ConsolidationReport::default();

        stage4_prune(&mut traces, &mut patterns, &config, &mut report);
        assert!(patterns.is_empty());
        let _ = PatternId::new();
    }
}
