//! Daily summary generation and delivery against mock endpoints

use chrono::{NaiveDate, NaiveTime};
use mysqlguard::config::{AdvisorConfig, NotifyConfig};
use mysqlguard::notify::{Attachment, NotifySink, WebhookSink};
use mysqlguard::report::generate_daily_summary;
use mysqlguard::store::EventStore;
use mysqlguard::{CpuEvent, HeaviestQuery, MemoryEvent, ParsedQuery, normalize_info};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
}

fn seeded_store(dir: &tempfile::TempDir) -> EventStore {
    let store = EventStore::open(dir.path()).unwrap();
    let query = ParsedQuery {
        id: 42,
        user: "app".into(),
        host: "10.0.0.5:43210".into(),
        db: Some("shop".into()),
        command: "Query".into(),
        elapsed_seconds: 90,
        state: Some("Sending data".into()),
        info: normalize_info("SELECT * FROM orders"),
    };
    store
        .append_cpu_event(&CpuEvent {
            date: date(),
            time: NaiveTime::from_hms_opt(12, 30, 5).unwrap(),
            pid: 1234,
            cpu_percent: 95.0,
            queries: vec![query.clone()],
            heaviest: HeaviestQuery::Query(query),
        })
        .unwrap();
    store
        .append_memory_event(&MemoryEvent {
            date: date(),
            time: NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
            memory_percent: 95.03,
        })
        .unwrap();
    store
}

#[tokio::test]
async fn summary_aggregates_the_recorded_day() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir);

    let (path, rendered) = generate_daily_summary(&store, date(), None).await.unwrap();

    assert!(path.ends_with("daily_summary_20260831.md"));
    assert!(rendered.contains("CPU spike events: 1"));
    assert!(rendered.contains("Peak CPU load: 95.0%"));
    assert!(rendered.contains("High memory usage recorded: 95.0%"));
    assert!(rendered.contains("SELECT * FROM orders"));
}

#[tokio::test]
async fn summary_and_raw_files_reach_the_webhook() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir);
    let (_, rendered) = generate_daily_summary(&store, date(), None).await.unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "subject": "Daily MySQL performance summary for 2026-08-31",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let attachments: Vec<Attachment> = store
        .raw_files(date())
        .into_iter()
        .map(|path| Attachment {
            filename: path.file_name().unwrap().to_string_lossy().into_owned(),
            content: std::fs::read_to_string(&path).unwrap(),
        })
        .collect();
    let names: Vec<&str> = attachments.iter().map(|a| a.filename.as_str()).collect();
    assert!(names.contains(&"events_cpu_20260831.jsonl"));
    assert!(names.contains(&"events_memory_20260831.jsonl"));
    assert!(names.contains(&"events_20260831.md"));

    WebhookSink::new(NotifyConfig {
        webhook_url: format!("{}/hook", server.uri()),
    })
    .send(
        "Daily MySQL performance summary for 2026-08-31",
        &rendered,
        &attachments,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn advisor_commentary_is_appended_when_available() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Consider an index on orders." } }
            ]
        })))
        .mount(&server)
        .await;
    let advisor = mysqlguard::advisor::AiAdvisor::new(AdvisorConfig {
        api_url: format!("{}/v1/chat/completions", server.uri()),
        api_key: None,
        model: "gpt-4o-mini".into(),
    });

    let (_, rendered) = generate_daily_summary(&store, date(), Some(&advisor))
        .await
        .unwrap();

    assert!(rendered.contains("## Advisor commentary"));
    assert!(rendered.contains("Consider an index on orders."));
}

#[tokio::test]
async fn advisor_failure_leaves_the_report_plain() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let advisor = mysqlguard::advisor::AiAdvisor::new(AdvisorConfig {
        api_url: format!("{}/v1/chat/completions", server.uri()),
        api_key: None,
        model: "gpt-4o-mini".into(),
    });

    let (_, rendered) = generate_daily_summary(&store, date(), Some(&advisor))
        .await
        .unwrap();

    assert!(rendered.contains("CPU spike events: 1"));
    assert!(!rendered.contains("## Advisor commentary"));
}
