//! Daily summary generation
//!
//! The summary is an offline aggregation over the day's event files: counts,
//! CPU load statistics and the longest-running queries observed at spike
//! time, rendered as markdown next to the event files. Generation only reads
//! the store, so it can run from the monitor's scheduler or from the
//! standalone report binary against the same directory.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use tracing::{info, instrument, warn};

use crate::advisor::AiAdvisor;
use crate::store::{EventStore, StoreError};
use crate::{CpuEvent, HeaviestQuery, MemoryEvent, ParsedQuery, QcacheSample};

const TOP_OFFENDERS: usize = 5;

/// Hit rates below this mark the query cache as misconfigured.
const QCACHE_HIT_RATE_FLOOR: f64 = 0.8;

/// Aggregated view of one day's events.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub cpu_event_count: usize,
    pub memory_event_count: usize,
    pub max_cpu_percent: Option<f64>,
    pub avg_cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    /// Hit rate from the day's last query cache sample, when one exists
    /// and the cache saw traffic.
    pub qcache_hit_rate: Option<f64>,
    /// Longest-running distinct queries seen across all spikes.
    pub top_offenders: Vec<ParsedQuery>,
}

pub fn summarize(
    date: NaiveDate,
    cpu_events: &[CpuEvent],
    memory_events: &[MemoryEvent],
    qcache_samples: &[QcacheSample],
) -> DailySummary {
    let (max_cpu, avg_cpu) = if cpu_events.is_empty() {
        (None, None)
    } else {
        let max = cpu_events
            .iter()
            .map(|e| e.cpu_percent)
            .fold(f64::MIN, f64::max);
        let avg = cpu_events.iter().map(|e| e.cpu_percent).sum::<f64>()
            / cpu_events.len() as f64;
        (Some(max), Some(avg))
    };

    // Distinct by normalized query text, keep the longest observed run.
    let mut by_info: HashMap<&str, &ParsedQuery> = HashMap::new();
    for event in cpu_events {
        if let HeaviestQuery::Query(query) = &event.heaviest
            && by_info
                .get(query.info.as_str())
                .is_none_or(|kept| kept.elapsed_seconds < query.elapsed_seconds)
        {
            by_info.insert(&query.info, query);
        }
    }
    let mut top_offenders: Vec<ParsedQuery> = by_info.into_values().cloned().collect();
    top_offenders.sort_by_key(|q| std::cmp::Reverse(q.elapsed_seconds));
    top_offenders.truncate(TOP_OFFENDERS);

    DailySummary {
        date,
        cpu_event_count: cpu_events.len(),
        memory_event_count: memory_events.len(),
        max_cpu_percent: max_cpu,
        avg_cpu_percent: avg_cpu,
        memory_percent: memory_events.first().map(|e| e.memory_percent),
        qcache_hit_rate: qcache_samples.last().and_then(QcacheSample::hit_rate),
        top_offenders,
    }
}

pub fn render_summary(summary: &DailySummary) -> String {
    let mut out = format!("# Daily MySQL performance summary for {}\n\n", summary.date);

    if summary.cpu_event_count == 0 && summary.memory_event_count == 0 {
        out.push_str("No threshold events were recorded.\n");
    } else {
        out.push_str(&format!("- CPU spike events: {}\n", summary.cpu_event_count));
        if let Some(max) = summary.max_cpu_percent {
            out.push_str(&format!("- Peak CPU load: {max:.1}%\n"));
        }
        if let Some(avg) = summary.avg_cpu_percent {
            out.push_str(&format!("- Average CPU load during spikes: {avg:.1}%\n"));
        }
        match summary.memory_percent {
            Some(percent) => out.push_str(&format!(
                "- High memory usage recorded: {percent:.1}%\n"
            )),
            None => out.push_str("- No high memory usage recorded\n"),
        }
    }

    if let Some(rate) = summary.qcache_hit_rate {
        if rate < QCACHE_HIT_RATE_FLOOR {
            out.push_str(&format!(
                "- Low query cache hit rate: {:.1}%. Review the query_cache_size \
                 and query_cache_type settings.\n",
                rate * 100.0
            ));
        } else {
            out.push_str(&format!("- Query cache hit rate: {:.1}%\n", rate * 100.0));
        }
    }

    if !summary.top_offenders.is_empty() {
        out.push_str("\n## Longest-running queries at spike time\n\n");
        out.push_str("| time (s) | user | db | query |\n|---:|---|---|---|\n");
        for query in &summary.top_offenders {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                query.elapsed_seconds,
                query.user,
                query.db.as_deref().unwrap_or("-"),
                query.info
            ));
        }
    }

    out
}

/// Build, render and persist the summary for `date`. Returns the path of the
/// written file and the rendered markdown.
#[instrument(skip(store, advisor), fields(date = %date))]
pub async fn generate_daily_summary(
    store: &EventStore,
    date: NaiveDate,
    advisor: Option<&AiAdvisor>,
) -> anyhow::Result<(PathBuf, String)> {
    let cpu_events = store.read_cpu_events(date)?;
    let memory_events = store.read_memory_events(date)?;
    let qcache_samples = store.read_qcache_samples(date)?;
    let summary = summarize(date, &cpu_events, &memory_events, &qcache_samples);
    let mut rendered = render_summary(&summary);

    if let Some(advisor) = advisor {
        match advisor.advise(&rendered).await {
            Ok(commentary) => {
                rendered.push_str("\n## Advisor commentary\n\n");
                rendered.push_str(&commentary);
                rendered.push('\n');
            }
            Err(e) => warn!("advisor unavailable, report stays plain: {e}"),
        }
    }

    let path = store
        .dir()
        .join(format!("daily_summary_{}.md", date.format("%Y%m%d")));
    fs::write(&path, &rendered).map_err(|e| StoreError::io(&path, e))?;
    info!(
        "daily summary written: {} cpu events, {} memory events",
        summary.cpu_event_count, summary.memory_event_count
    );
    Ok((path, rendered))
}

/// Fires each configured wall-clock time at most once per day.
#[derive(Debug, Default)]
pub struct DailySchedule {
    times: Vec<NaiveTime>,
    fired: HashMap<NaiveTime, NaiveDate>,
}

impl DailySchedule {
    pub fn new(times: Vec<NaiveTime>) -> Self {
        Self {
            times,
            fired: HashMap::new(),
        }
    }

    /// The first configured time that `now` has passed today and that has
    /// not fired yet. Marks it as fired.
    pub fn due(&mut self, now: DateTime<Local>) -> Option<NaiveTime> {
        let today = now.date_naive();
        let time = *self.times.iter().find(|&&t| {
            now.time() >= t && self.fired.get(&t) != Some(&today)
        })?;
        self.fired.insert(time, today);
        Some(time)
    }
}
