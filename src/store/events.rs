use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::{BaselineSnapshot, CpuEvent, HeaviestQuery, MemoryEvent, QcacheSample};

use super::{StoreError, StoreResult};

const BASELINE_FILENAME: &str = "baseline.json";

/// Append-only, per-day-scoped event store rooted in one directory.
#[derive(Debug, Clone)]
pub struct EventStore {
    dir: PathBuf,
}

impl EventStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    fn cpu_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("events_cpu_{}.jsonl", date.format("%Y%m%d")))
    }

    fn memory_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("events_memory_{}.jsonl", date.format("%Y%m%d")))
    }

    fn qcache_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("qcache_{}.jsonl", date.format("%Y%m%d")))
    }

    fn narrative_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("events_{}.md", date.format("%Y%m%d")))
    }

    fn baseline_path(&self) -> PathBuf {
        self.dir.join(BASELINE_FILENAME)
    }

    /// Serialize one record and append it as a single complete write.
    fn append_row<T: Serialize>(&self, path: &Path, record: &T) -> StoreResult<()> {
        let mut line =
            serde_json::to_string(record).map_err(|e| StoreError::io(path, e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::io(path, e))
    }

    fn read_rows<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Vec<T>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| StoreError::io(path, e)))
            .collect()
    }

    fn append_narrative(&self, date: NaiveDate, section: &str) -> StoreResult<()> {
        let path = self.narrative_path(date);
        let mut body = String::new();
        if !path.exists() {
            body.push_str(&format!("# Performance event log for {date}\n"));
        }
        body.push_str(section);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| StoreError::io(&path, e))
    }

    /// Append one CPU event. Not deduplicated: every qualifying sample is
    /// recorded.
    #[instrument(skip_all, fields(date = %event.date, cpu = event.cpu_percent))]
    pub fn append_cpu_event(&self, event: &CpuEvent) -> StoreResult<()> {
        self.append_row(&self.cpu_path(event.date), event)?;
        self.append_narrative(event.date, &cpu_narrative(event))?;
        debug!("cpu event persisted");
        Ok(())
    }

    /// Append one memory event. The caller is responsible for the
    /// one-per-day rule via [`EventStore::has_memory_event_today`].
    #[instrument(skip_all, fields(date = %event.date, memory = event.memory_percent))]
    pub fn append_memory_event(&self, event: &MemoryEvent) -> StoreResult<()> {
        self.append_row(&self.memory_path(event.date), event)?;
        self.append_narrative(event.date, &memory_narrative(event))?;
        debug!("memory event persisted");
        Ok(())
    }

    /// Append one query cache counter sample. Samples accumulate over the
    /// day; the summary pass judges cache health from the last one.
    pub fn append_qcache_sample(&self, sample: &QcacheSample) -> StoreResult<()> {
        self.append_row(&self.qcache_path(sample.date), sample)
    }

    pub fn read_qcache_samples(&self, date: NaiveDate) -> StoreResult<Vec<QcacheSample>> {
        self.read_rows(&self.qcache_path(date))
    }

    /// Attach an engine status excerpt to the day's narrative log. The
    /// excerpt rides alongside the CPU event that triggered its capture.
    pub fn append_engine_status(
        &self,
        date: NaiveDate,
        time: chrono::NaiveTime,
        body: &str,
    ) -> StoreResult<()> {
        let mut excerpt: String = body.chars().take(4000).collect();
        if excerpt.len() < body.len() {
            excerpt.push_str("\n[truncated]");
        }
        self.append_narrative(
            date,
            &format!(
                "\n<details><summary>InnoDB engine status at {}</summary>\n\n```\n{excerpt}\n```\n\n</details>\n",
                time.format("%H:%M:%S")
            ),
        )
    }

    /// Dedup state for the one-memory-event-per-day rule. Derived from the
    /// structured file on disk, so it survives process restarts.
    pub fn has_memory_event_today(&self) -> StoreResult<bool> {
        self.has_memory_event(Local::now().date_naive())
    }

    pub fn has_memory_event(&self, date: NaiveDate) -> StoreResult<bool> {
        let path = self.memory_path(date);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content.lines().any(|line| !line.trim().is_empty())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Replay APIs for the offline aggregation pass.
    pub fn read_cpu_events(&self, date: NaiveDate) -> StoreResult<Vec<CpuEvent>> {
        self.read_rows(&self.cpu_path(date))
    }

    pub fn read_memory_events(&self, date: NaiveDate) -> StoreResult<Vec<MemoryEvent>> {
        self.read_rows(&self.memory_path(date))
    }

    pub fn baseline_exists(&self) -> bool {
        self.baseline_path().exists()
    }

    /// Write the one-time baseline snapshot. Returns `false` (and leaves the
    /// file untouched) if a baseline is already present.
    pub fn write_baseline(&self, snapshot: &BaselineSnapshot) -> StoreResult<bool> {
        let path = self.baseline_path();
        let mut file = match OpenOptions::new().create_new(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("baseline already present, skipping");
                return Ok(false);
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let body = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| StoreError::io(&path, e))?;
        info!("baseline snapshot written to {}", path.display());
        Ok(true)
    }

    pub fn read_baseline(&self) -> StoreResult<Option<BaselineSnapshot>> {
        let path = self.baseline_path();
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| StoreError::io(&path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Paths of the raw files that exist for `date`, for report delivery.
    pub fn raw_files(&self, date: NaiveDate) -> Vec<PathBuf> {
        [
            self.cpu_path(date),
            self.memory_path(date),
            self.qcache_path(date),
            self.narrative_path(date),
        ]
        .into_iter()
        .filter(|path| path.exists())
        .collect()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn cpu_narrative(event: &CpuEvent) -> String {
    let mut section = format!(
        "\n---\n### CPU spike at {}\n- pid: `{}`\n- load: `{}%`\n",
        event.time.format("%H:%M:%S"),
        event.pid,
        event.cpu_percent
    );

    match &event.heaviest {
        HeaviestQuery::Query(query) => {
            section.push_str(&format!(
                "- heaviest query ({}s): `{}`\n",
                query.elapsed_seconds, query.info
            ));
        }
        HeaviestQuery::NoActiveQueries => {
            section.push_str("- no attributable query (nothing was running)\n");
        }
        HeaviestQuery::SnapshotUnavailable => {
            section.push_str("- process snapshot unavailable at spike time\n");
        }
    }

    if !event.queries.is_empty() {
        section.push_str("\nLongest-running queries at spike time:\n\n");
        section.push_str("| time (s) | user | db | query |\n|---:|---|---|---|\n");
        for query in &event.queries {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                query.elapsed_seconds,
                query.user,
                query.db.as_deref().unwrap_or("-"),
                query.info
            ));
        }
    }

    section
}

fn memory_narrative(event: &MemoryEvent) -> String {
    format!(
        "\n---\n### High memory usage at {}\n- recorded usage: `{}%`\n",
        event.time.format("%H:%M:%S"),
        event.memory_percent
    )
}
