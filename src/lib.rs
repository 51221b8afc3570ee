pub mod advisor;
pub mod channel;
pub mod config;
pub mod detector;
pub mod notify;
pub mod parsers;
pub mod report;
pub mod sampler;
pub mod store;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Which remote command a raw capture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Cpu,
    Memory,
    ProcessList,
    CpuInfo,
    EngineStatus,
    Qcache,
}

impl std::fmt::Display for SampleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleKind::Cpu => write!(f, "cpu"),
            SampleKind::Memory => write!(f, "memory"),
            SampleKind::ProcessList => write!(f, "processlist"),
            SampleKind::CpuInfo => write!(f, "cpuinfo"),
            SampleKind::EngineStatus => write!(f, "enginestatus"),
            SampleKind::Qcache => write!(f, "qcache"),
        }
    }
}

/// One raw capture of remote command output at a timestamp.
///
/// Immutable once captured; produced by the sampler, consumed by the parsers.
#[derive(Debug, Clone)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub kind: SampleKind,
    pub raw_text: String,
    pub host_pid: Option<u32>,
}

impl Sample {
    pub fn new(kind: SampleKind, raw_text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            raw_text: raw_text.into(),
            host_pid: None,
        }
    }

    pub fn for_pid(kind: SampleKind, raw_text: impl Into<String>, pid: u32) -> Self {
        Self {
            host_pid: Some(pid),
            ..Self::new(kind, raw_text)
        }
    }
}

/// One active session row from the database process list.
///
/// `info` is normalized to a single line before storage so that per-day
/// flat files round-trip without embedded newlines or tabs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub id: u64,
    pub user: String,
    pub host: String,
    pub db: Option<String>,
    pub command: String,
    pub elapsed_seconds: u64,
    pub state: Option<String>,
    pub info: String,
}

/// Collapse all whitespace runs (including newlines and tabs) into single
/// spaces and trim the ends. Required invariant for stored `info` text.
pub fn normalize_info(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All active queries captured at one instant, ordered by elapsed time
/// descending (ties keep original row order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub timestamp: DateTime<Utc>,
    pub queries: Vec<ParsedQuery>,
}

impl ProcessSnapshot {
    /// The longest-elapsed active query, if any.
    pub fn heaviest(&self) -> Option<&ParsedQuery> {
        self.queries.first()
    }

    /// The longest-running view used when attaching context to a CPU event.
    pub fn top(&self, n: usize) -> &[ParsedQuery] {
        &self.queries[..self.queries.len().min(n)]
    }
}

/// Context attached to a CPU event: the heaviest query at spike time, or an
/// explicit marker distinguishing "nothing was running" from "the snapshot
/// could not be taken".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "query", rename_all = "snake_case")]
pub enum HeaviestQuery {
    Query(ParsedQuery),
    NoActiveQueries,
    SnapshotUnavailable,
}

/// A CPU threshold crossing. One event per qualifying sample; repeated
/// spikes are all recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuEvent {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub pid: u32,
    pub cpu_percent: f64,
    pub queries: Vec<ParsedQuery>,
    pub heaviest: HeaviestQuery,
}

/// A memory threshold crossing. At most one per calendar day; the dedup
/// state lives in the event store, never in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub memory_percent: f64,
}

/// Query cache counters captured on the slow cadence. The daily summary
/// uses the day's last sample to judge cache health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcacheSample {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub hits: u64,
    pub inserts: u64,
}

impl QcacheSample {
    /// Hit rate over hits + inserts, or `None` when the cache saw no
    /// traffic yet (a rate cannot be judged from zero queries).
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.inserts;
        if total == 0 {
            return None;
        }
        Some(self.hits as f64 / total as f64)
    }
}

/// One-time descriptive snapshot of the monitored host, captured on first
/// startup and never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub captured_at: DateTime<Utc>,
    pub cpu_descriptor: Vec<(String, String)>,
    pub global_config_vars: Vec<(String, String)>,
}
