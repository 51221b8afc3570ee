//! Two-cadence sampling actor
//!
//! One actor owns the remote channel and drives both cadences from a single
//! fast loop: every tick samples CPU, and the slower memory cadence is
//! re-evaluated against a due-time cursor on each fast tick. A missed fast
//! tick therefore delays the memory check rather than dropping it.
//!
//! Error policy inside a tick is degrade-and-continue: a failed command or
//! an unparsable output is logged and the rest of the tick proceeds. The
//! only fatal condition is a credential failure, which cannot heal on its
//! own and aborts the actor.

use anyhow::{Context, bail};
use chrono::Local;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{error, info, instrument, trace, warn};

use crate::channel::CommandChannel;
use crate::config::{MonitorConfig, MysqlConfig};
use crate::detector::EventDetector;
use crate::parsers;
use crate::store::EventStore;
use crate::{CpuEvent, ProcessSnapshot, QcacheSample, Sample, SampleKind};

const MYSQLD_PROCESS_NAME: &str = "mysqld";

pub enum SamplerCommand {
    /// Run one full sampling tick immediately, out of cadence.
    TickNow { respond_to: oneshot::Sender<()> },
    Shutdown,
}

/// Handle for driving and stopping a spawned [`SamplerActor`].
#[derive(Clone)]
pub struct SamplerHandle {
    sender: mpsc::Sender<SamplerCommand>,
}

impl SamplerHandle {
    pub async fn tick_now(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SamplerCommand::TickNow { respond_to: tx })
            .await
            .context("sampler is gone")?;
        rx.await.context("sampler dropped the tick request")
    }

    pub async fn shutdown(&self) {
        // A full mailbox or a dead actor both mean shutdown is moot.
        let _ = self.sender.send(SamplerCommand::Shutdown).await;
    }
}

pub struct SamplerActor {
    receiver: mpsc::Receiver<SamplerCommand>,
    channel: CommandChannel,
    detector: EventDetector,
    store: EventStore,
    mysql: MysqlConfig,
    monitor: MonitorConfig,
    /// Monitored server process, re-discovered if its top row disappears.
    pid: u32,
    memory_due: Instant,
    heartbeat_due: Instant,
}

impl SamplerActor {
    pub fn new(
        receiver: mpsc::Receiver<SamplerCommand>,
        channel: CommandChannel,
        detector: EventDetector,
        store: EventStore,
        mysql: MysqlConfig,
        monitor: MonitorConfig,
        pid: u32,
    ) -> Self {
        let now = Instant::now();
        Self {
            receiver,
            channel,
            detector,
            store,
            mysql,
            monitor,
            pid,
            memory_due: now,
            heartbeat_due: now,
        }
    }

    /// Spawn the actor onto the runtime. The join handle resolves with an
    /// error only on a fatal condition.
    pub fn spawn(
        channel: CommandChannel,
        detector: EventDetector,
        store: EventStore,
        mysql: MysqlConfig,
        monitor: MonitorConfig,
        pid: u32,
    ) -> (SamplerHandle, JoinHandle<anyhow::Result<()>>) {
        let (sender, receiver) = mpsc::channel(16);
        let actor = SamplerActor::new(receiver, channel, detector, store, mysql, monitor, pid);
        let join = tokio::spawn(actor.run());
        (SamplerHandle { sender }, join)
    }

    #[instrument(skip(self), fields(pid = self.pid))]
    async fn run(mut self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.monitor.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "sampler started: cpu every {}s, memory every {}s",
            self.monitor.interval_secs, self.monitor.memory_interval_secs
        );

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(SamplerCommand::TickNow { respond_to }) => {
                        if let Err(e) = self.sample_tick().await {
                            return self.abort(e).await;
                        }
                        let _ = respond_to.send(());
                    }
                    Some(SamplerCommand::Shutdown) | None => break,
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.sample_tick().await {
                        return self.abort(e).await;
                    }
                }
            }
        }

        self.channel.close().await;
        info!("sampler stopped");
        Ok(())
    }

    /// Fatal path: the channel must be torn down before the error surfaces,
    /// otherwise the transport outlives the process.
    async fn abort(&mut self, error: anyhow::Error) -> anyhow::Result<()> {
        self.channel.close().await;
        Err(error)
    }

    /// One fast-loop tick: heartbeat, CPU sample, then the memory cadence
    /// if its cursor is due.
    async fn sample_tick(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        if now >= self.heartbeat_due {
            info!("heartbeat: watching {MYSQLD_PROCESS_NAME} pid {}", self.pid);
            self.heartbeat_due = now + Duration::from_secs(self.monitor.heartbeat_secs);
        }

        self.sample_cpu().await?;

        if Instant::now() >= self.memory_due {
            self.sample_memory().await?;
            self.sample_qcache().await?;
            self.memory_due =
                Instant::now() + Duration::from_secs(self.monitor.memory_interval_secs);
        }

        Ok(())
    }

    async fn sample_cpu(&mut self) -> anyhow::Result<()> {
        let command = format!("top -b -n 1 -p {}", self.pid);
        let sample = match self.exec(&command).await? {
            Some(raw) => Sample::for_pid(SampleKind::Cpu, raw, self.pid),
            None => return Ok(()),
        };

        let cpu_percent = match parsers::top::parse(&sample.raw_text, self.pid) {
            Ok(percent) => percent,
            Err(e) => {
                warn!("top output unusable for pid {}: {e}", self.pid);
                self.rediscover_pid().await?;
                return Ok(());
            }
        };
        trace!("cpu sample: {cpu_percent}%");

        let sampled_at = Local::now();
        if self
            .detector
            .evaluate_cpu(sampled_at, self.pid, cpu_percent, None)
            .is_none()
        {
            return Ok(());
        }

        // The snapshot is only fetched once the threshold is crossed, so
        // quiet ticks cost a single remote command.
        let snapshot = self.capture_process_snapshot().await?;
        let Some(event) =
            self.detector
                .evaluate_cpu(sampled_at, self.pid, cpu_percent, snapshot.as_ref())
        else {
            return Ok(());
        };

        warn!(
            "cpu spike: {cpu_percent}% on pid {} ({} queries captured)",
            self.pid,
            event.queries.len()
        );
        if let Err(e) = self.store.append_cpu_event(&event) {
            error!("could not persist cpu event {event:?}: {e}");
        }
        self.capture_engine_status(&event).await?;
        Ok(())
    }

    async fn capture_process_snapshot(&mut self) -> anyhow::Result<Option<ProcessSnapshot>> {
        let command = self.mysql.processlist_command(self.monitor.top_queries);
        let sample = match self.exec(&command).await? {
            Some(raw) => Sample::new(SampleKind::ProcessList, raw),
            None => return Ok(None),
        };

        match parsers::process_table::parse(&sample.raw_text, sample.timestamp, None) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!("process list output unusable: {e}");
                Ok(None)
            }
        }
    }

    /// Deep snapshot taken alongside a CPU event; parse or capture failures
    /// only cost the excerpt, the event itself is already persisted.
    async fn capture_engine_status(&mut self, event: &CpuEvent) -> anyhow::Result<()> {
        let command = self.mysql.engine_status_command();
        let sample = match self.exec(&command).await? {
            Some(raw) => Sample::new(SampleKind::EngineStatus, raw),
            None => return Ok(()),
        };

        match parsers::engine_status::parse(&sample.raw_text) {
            Ok(body) => {
                if let Err(e) = self.store.append_engine_status(event.date, event.time, &body) {
                    error!("could not persist engine status excerpt: {e}");
                }
            }
            Err(e) => warn!("engine status output unusable: {e}"),
        }
        Ok(())
    }

    async fn sample_memory(&mut self) -> anyhow::Result<()> {
        let sample = match self.exec("free -m").await? {
            Some(raw) => Sample::new(SampleKind::Memory, raw),
            None => return Ok(()),
        };

        let memory_percent = match parsers::memory::parse(&sample.raw_text) {
            Ok(percent) => percent,
            Err(e) => {
                warn!("free output unusable: {e}");
                return Ok(());
            }
        };
        trace!("memory sample: {memory_percent}%");

        let already_recorded = match self.store.has_memory_event_today() {
            Ok(recorded) => recorded,
            Err(e) => {
                error!("could not read memory dedup state: {e}");
                // Fail toward suppression: better a missed record than a
                // duplicate that breaks the one-per-day contract.
                true
            }
        };

        if let Some(event) =
            self.detector
                .evaluate_memory(Local::now(), memory_percent, already_recorded)
        {
            warn!("high memory usage: {memory_percent}%");
            if let Err(e) = self.store.append_memory_event(&event) {
                error!("could not persist memory event {event:?}: {e}");
            }
        }
        Ok(())
    }

    /// Query cache counters ride the slow cadence; the day's last sample
    /// feeds the cache health line in the daily summary.
    async fn sample_qcache(&mut self) -> anyhow::Result<()> {
        let command = self.mysql.qcache_status_command();
        let sample = match self.exec(&command).await? {
            Some(raw) => Sample::new(SampleKind::Qcache, raw),
            None => return Ok(()),
        };

        let (hits, inserts) = match parsers::qcache::parse(&sample.raw_text) {
            Ok(counters) => counters,
            Err(e) => {
                warn!("qcache status output unusable: {e}");
                return Ok(());
            }
        };

        let now = Local::now();
        let record = QcacheSample {
            date: now.date_naive(),
            time: now.time(),
            hits,
            inserts,
        };
        if let Err(e) = self.store.append_qcache_sample(&record) {
            error!("could not persist qcache sample {record:?}: {e}");
        }
        Ok(())
    }

    /// The monitored process may have restarted under a new pid.
    async fn rediscover_pid(&mut self) -> anyhow::Result<()> {
        let output = match self.exec(&format!("pidof {MYSQLD_PROCESS_NAME}")).await? {
            Some(output) => output,
            None => return Ok(()),
        };
        match parsers::first_pid(&output) {
            Ok(pid) if pid != self.pid => {
                warn!("{MYSQLD_PROCESS_NAME} pid changed: {} -> {pid}", self.pid);
                self.pid = pid;
            }
            Ok(_) => {}
            Err(e) => warn!("pid rediscovery failed: {e}"),
        }
        Ok(())
    }

    /// Run one remote command. `Ok(None)` means the command failed in a
    /// recoverable way and the tick should move on without its output.
    async fn exec(&mut self, command: &str) -> anyhow::Result<Option<String>> {
        match self.channel.exec(command).await {
            Ok(output) => {
                if self.monitor.debug_commands {
                    trace!("raw output:\n{output}");
                }
                Ok(Some(output))
            }
            Err(e) if e.is_access_denied() => {
                bail!("credential failure on remote command: {e}")
            }
            Err(e) => {
                warn!("remote command failed: {e}");
                Ok(None)
            }
        }
    }
}
