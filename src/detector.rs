//! Stateless threshold policy
//!
//! The detector decides whether a sample constitutes a reportable event and
//! what context to attach. It holds no mutable state: the only dedup input
//! (has a memory event already been recorded today) is queried from the
//! durable store by the caller and passed in, so restarts cannot double-fire
//! the one-per-day memory rule.

use chrono::{DateTime, Local};
use tracing::debug;

use crate::{CpuEvent, HeaviestQuery, MemoryEvent, ProcessSnapshot};

/// Configured limits shared read-only by both sampling cadences.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone)]
pub struct EventDetector {
    thresholds: Thresholds,
    top_queries: usize,
}

impl EventDetector {
    pub fn new(thresholds: Thresholds, top_queries: usize) -> Self {
        Self {
            thresholds,
            top_queries,
        }
    }

    /// CPU rule: strictly above threshold is always an event. Repeated
    /// consecutive spikes are deliberately not suppressed; each qualifying
    /// sample is independently notable.
    pub fn evaluate_cpu(
        &self,
        sampled_at: DateTime<Local>,
        pid: u32,
        cpu_percent: f64,
        snapshot: Option<&ProcessSnapshot>,
    ) -> Option<CpuEvent> {
        if cpu_percent <= self.thresholds.cpu_percent {
            return None;
        }

        let (queries, heaviest) = match snapshot {
            Some(snapshot) => (
                snapshot.top(self.top_queries).to_vec(),
                match snapshot.heaviest() {
                    Some(query) => HeaviestQuery::Query(query.clone()),
                    None => HeaviestQuery::NoActiveQueries,
                },
            ),
            None => (Vec::new(), HeaviestQuery::SnapshotUnavailable),
        };

        debug!(
            "cpu sample {cpu_percent}% exceeds threshold {}%",
            self.thresholds.cpu_percent
        );

        Some(CpuEvent {
            date: sampled_at.date_naive(),
            time: sampled_at.time(),
            pid,
            cpu_percent,
            queries,
            heaviest,
        })
    }

    /// Memory rule: strictly above threshold and nothing recorded for the
    /// current calendar day yet.
    pub fn evaluate_memory(
        &self,
        sampled_at: DateTime<Local>,
        memory_percent: f64,
        already_recorded_today: bool,
    ) -> Option<MemoryEvent> {
        if memory_percent <= self.thresholds.memory_percent {
            return None;
        }
        if already_recorded_today {
            debug!("memory threshold exceeded again, suppressed by per-day dedup");
            return None;
        }

        Some(MemoryEvent {
            date: sampled_at.date_naive(),
            time: sampled_at.time(),
            memory_percent,
        })
    }
}
