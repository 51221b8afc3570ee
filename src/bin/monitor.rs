use std::process::exit;
use std::time::Duration;

use chrono::{Local, Utc};
use clap::Parser;
use mysqlguard::{
    BaselineSnapshot,
    channel::{CommandChannel, ssh::SshSession},
    config::{Config, read_config_file},
    detector::{EventDetector, Thresholds},
    notify::{Attachment, NotifySink, WebhookSink},
    parsers, report,
    sampler::SamplerActor,
    store::EventStore,
};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("mysqlguard", LevelFilter::TRACE),
        ("monitor", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    init();
    dotenv::dotenv().ok();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    if let Err(e) = run(&args).await {
        // The sampler only aborts on unrecoverable conditions, make that
        // unmissable on the console as well as in the log.
        error!("[CRITICAL] monitor stopped: {e:#}");
        exit(1);
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let mut config = read_config_file(&args.file)?;
    config.apply_env_overrides();

    let session = SshSession::connect(config.ssh.clone()).await?;
    let mut channel = CommandChannel::new(
        Box::new(session),
        Duration::from_secs(config.monitor.command_timeout_secs),
    );
    let store = EventStore::open(&config.reports.dir)?;

    capture_baseline(&mut channel, &store, &config).await?;
    let pid = discover_pid(&mut channel).await?;
    info!("monitoring mysqld pid {pid} on {}", config.ssh.host);

    let detector = EventDetector::new(
        Thresholds {
            cpu_percent: config.monitor.cpu_threshold,
            memory_percent: config.monitor.memory_threshold,
        },
        config.monitor.top_queries,
    );
    let (sampler, mut sampler_join) = SamplerActor::spawn(
        channel,
        detector,
        store.clone(),
        config.mysql.clone(),
        config.monitor.clone(),
        pid,
    );

    let mut schedule = report::DailySchedule::new(config.reports.parsed_daily_times()?);
    let sink = config.notify.clone().map(WebhookSink::new);
    let advisor = config
        .advisor
        .clone()
        .map(mysqlguard::advisor::AiAdvisor::new);
    let mut report_tick = tokio::time::interval(Duration::from_secs(30));
    let heartbeat = Duration::from_secs(config.monitor.heartbeat_secs);
    let mut heartbeat_due = tokio::time::Instant::now();

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let result = loop {
        tokio::select! {
            result = &mut sampler_join => {
                break result?.map_err(|e| e.context("sampler aborted"));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                sampler.shutdown().await;
                break sampler_join.await?;
            }
            _ = sigterm.recv() => {
                info!("termination requested, shutting down");
                sampler.shutdown().await;
                break sampler_join.await?;
            }
            _ = report_tick.tick() => {
                let now = tokio::time::Instant::now();
                if now >= heartbeat_due {
                    info!("heartbeat: scheduler alive");
                    heartbeat_due = now + heartbeat;
                }
                if schedule.due(Local::now()).is_some() {
                    deliver_daily_report(&store, sink.as_ref(), advisor.as_ref()).await;
                }
            }
        }
    };

    result
}

/// Capture the one-time host baseline (CPU descriptor and the full MySQL
/// global configuration). Skipped when a previous run already wrote it.
async fn capture_baseline(
    channel: &mut CommandChannel,
    store: &EventStore,
    config: &Config,
) -> anyhow::Result<()> {
    if store.baseline_exists() {
        trace!("baseline already captured");
        return Ok(());
    }

    let cpuinfo_raw = match exec_for_baseline(channel, "cat /proc/cpuinfo").await? {
        Some(raw) => raw,
        None => return Ok(()),
    };
    let variables_raw =
        match exec_for_baseline(channel, &config.mysql.global_variables_command()).await? {
            Some(raw) => raw,
            None => return Ok(()),
        };

    let cpu_descriptor = match parsers::cpuinfo::parse(&cpuinfo_raw) {
        Ok(fields) => fields,
        Err(e) => {
            warn!("cpuinfo output unusable, baseline deferred: {e}");
            return Ok(());
        }
    };
    let global_config_vars = match parsers::variables::parse(&variables_raw) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!("global variables output unusable, baseline deferred: {e}");
            return Ok(());
        }
    };

    let snapshot = BaselineSnapshot {
        captured_at: Utc::now(),
        cpu_descriptor,
        global_config_vars,
    };
    if store.write_baseline(&snapshot)? {
        info!("host baseline captured");
    }
    Ok(())
}

/// `Ok(None)` means a recoverable failure; the baseline is retried on the
/// next start. Credential failures abort, a wrong password never heals.
async fn exec_for_baseline(
    channel: &mut CommandChannel,
    command: &str,
) -> anyhow::Result<Option<String>> {
    match channel.exec(command).await {
        Ok(output) => Ok(Some(output)),
        Err(e) if e.is_access_denied() => {
            anyhow::bail!("credential failure during baseline capture: {e}")
        }
        Err(e) => {
            warn!("baseline command failed, deferring capture: {e}");
            Ok(None)
        }
    }
}

async fn discover_pid(channel: &mut CommandChannel) -> anyhow::Result<u32> {
    let output = channel
        .exec("pidof mysqld")
        .await
        .map_err(|e| anyhow::anyhow!("could not query mysqld pid: {e}"))?;
    parsers::first_pid(&output)
        .map_err(|e| anyhow::anyhow!("mysqld does not appear to be running: {e}"))
}

/// Generate yesterday-inclusive daily output and push it to the sink.
/// Failures are logged, never fatal; the files on disk stay authoritative.
async fn deliver_daily_report(
    store: &EventStore,
    sink: Option<&WebhookSink>,
    advisor: Option<&mysqlguard::advisor::AiAdvisor>,
) {
    let date = Local::now().date_naive();
    let (_, rendered) = match report::generate_daily_summary(store, date, advisor).await {
        Ok(result) => result,
        Err(e) => {
            error!("daily summary generation failed: {e:#}");
            return;
        }
    };

    let Some(sink) = sink else {
        info!("no webhook configured, daily summary kept on disk only");
        return;
    };

    let attachments: Vec<Attachment> = store
        .raw_files(date)
        .into_iter()
        .filter_map(|path| {
            let filename = path.file_name()?.to_string_lossy().into_owned();
            match std::fs::read_to_string(&path) {
                Ok(content) => Some(Attachment { filename, content }),
                Err(e) => {
                    warn!("could not attach {}: {e}", path.display());
                    None
                }
            }
        })
        .collect();

    let subject = format!("Daily MySQL performance summary for {date}");
    if let Err(e) = sink.send(&subject, &rendered, &attachments).await {
        error!("daily report delivery failed: {e:#}");
    }
}
