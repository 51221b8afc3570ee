use chrono::{Local, NaiveDate};
use clap::Parser;
use mysqlguard::{
    advisor::AiAdvisor,
    config::read_config_file,
    notify::{Attachment, NotifySink, WebhookSink},
    report::generate_daily_summary,
    store::EventStore,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Generate (and optionally deliver) the daily summary for a recorded day.
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Day to summarize (YYYY-MM-DD), today when omitted
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Deliver the summary to the configured webhook
    #[arg(long)]
    send: bool,

    /// Enrich the summary with advisor commentary
    #[arg(long)]
    advise: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("mysqlguard", LevelFilter::TRACE),
        ("report", LevelFilter::TRACE),
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
async fn main() -> anyhow::Result<()> {
    init();
    dotenv::dotenv().ok();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = read_config_file(&args.file)?;
    config.apply_env_overrides();

    let store = EventStore::open(&config.reports.dir)?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());

    let advisor = if args.advise {
        match config.advisor.clone() {
            Some(advisor_config) => Some(AiAdvisor::new(advisor_config)),
            None => {
                warn!("--advise given but no advisor is configured");
                None
            }
        }
    } else {
        None
    };

    let (path, rendered) = generate_daily_summary(&store, date, advisor.as_ref()).await?;
    info!("summary written to {}", path.display());
    println!("{rendered}");

    if args.send {
        let notify = config
            .notify
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--send given but no webhook is configured"))?;
        let attachments: Vec<Attachment> = store
            .raw_files(date)
            .into_iter()
            .filter_map(|path| {
                let filename = path.file_name()?.to_string_lossy().into_owned();
                std::fs::read_to_string(&path)
                    .ok()
                    .map(|content| Attachment { filename, content })
            })
            .collect();

        let subject = format!("Daily MySQL performance summary for {date}");
        WebhookSink::new(notify)
            .send(&subject, &rendered, &attachments)
            .await?;
        info!("summary delivered");
    }

    Ok(())
}
