//! `SchedulerMetrics` (§3.1): returned by `get_metrics()`.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::types::EngineId;

const HISTOGRAM_BUCKETS_MS: [u64; 5] = [10, 50, 100, 500, 1000];

/// A rolling histogram of last-step wall-clock durations, bucketed by
/// upper-bound milliseconds (§3.1).
#[derive(Debug, Clone, Default, Serialize)]
pub struct DurationHistogram {
    buckets: Vec<(u64, u64)>,
}

impl DurationHistogram {
    pub fn record(&mut self, duration: Duration) {
        if self.buckets.is_empty() {
            self.buckets = HISTOGRAM_BUCKETS_MS.iter().map(|&bound| (bound, 0)).collect();
        }
        let millis = duration.as_millis() as u64;
        for bucket in &mut self.buckets {
            if millis <= bucket.0 {
                bucket.1 += 1;
                return;
            }
        }
        if let Some(last) = self.buckets.last_mut() {
            last.1 += 1;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    pub cycle_count: u64,
    pub steps_processed: HashMap<u8, u64>,
    pub missed_sync: u64,
    pub handler_errors: u64,
    pub events_processed: u64,
    pub events_dropped: u64,
    pub degraded: bool,
    pub last_step_duration_histogram: DurationHistogram,
}

impl SchedulerMetrics {
    pub fn record_engine_step(&mut self, engine_id: EngineId) {
        *self.steps_processed.entry(engine_id.get()).or_insert(0) += 1;
    }
}
