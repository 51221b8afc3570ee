//! End-to-end tests: remote output through detection into the store

use chrono::Local;
use mysqlguard::HeaviestQuery;
use mysqlguard::sampler::SamplerActor;
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn spike_flows_from_remote_output_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);
    let monitor = manual_tick_config();

    let (session, state) = FakeSession::new();
    FakeSession::reply(&state, "top", TOP_SPIKE);
    FakeSession::reply(&state, "PROCESSLIST", PROCESSLIST);
    FakeSession::reply(&state, "free", FREE_LOW);

    let (handle, join) = SamplerActor::spawn(
        test_channel(session),
        test_detector(&monitor),
        store.clone(),
        test_mysql_config(),
        monitor,
        1234,
    );
    handle.tick_now().await.unwrap();
    handle.shutdown().await;
    join.await.unwrap().unwrap();

    let events = store.read_cpu_events(Local::now().date_naive()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].cpu_percent, 95.0);
    assert_eq!(events[0].pid, 1234);
    assert_eq!(events[0].queries.len(), 2);
    match &events[0].heaviest {
        HeaviestQuery::Query(query) => {
            assert_eq!(query.id, 42);
            assert_eq!(query.elapsed_seconds, 90);
            assert_eq!(query.info, "SELECT * FROM orders");
        }
        other => panic!("expected attributed query, got {other:?}"),
    }

    // Memory stayed below its threshold, nothing recorded.
    assert!(
        store
            .read_memory_events(Local::now().date_naive())
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn repeated_spikes_are_recorded_once_each() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);
    let monitor = manual_tick_config();

    let (session, state) = FakeSession::new();
    FakeSession::reply(&state, "top", TOP_SPIKE);
    FakeSession::reply(&state, "PROCESSLIST", PROCESSLIST);
    FakeSession::reply(&state, "free", FREE_LOW);

    let (handle, join) = SamplerActor::spawn(
        test_channel(session),
        test_detector(&monitor),
        store.clone(),
        test_mysql_config(),
        monitor,
        1234,
    );
    for _ in 0..4 {
        handle.tick_now().await.unwrap();
    }
    handle.shutdown().await;
    join.await.unwrap().unwrap();

    let events = store.read_cpu_events(Local::now().date_naive()).unwrap();
    assert_eq!(events.len(), 4);
}

#[tokio::test]
async fn memory_dedup_holds_across_a_monitor_restart() {
    let dir = tempfile::tempdir().unwrap();
    let monitor = manual_tick_config();

    for _restart in 0..2 {
        let (session, state) = FakeSession::new();
        FakeSession::reply(&state, "top", TOP_IDLE);
        FakeSession::reply(&state, "free", FREE_HIGH);

        // Each iteration re-opens the store, as a restarted process would.
        let store = test_store(&dir);
        let (handle, join) = SamplerActor::spawn(
            test_channel(session),
            test_detector(&monitor),
            store,
            test_mysql_config(),
            monitor.clone(),
            1234,
        );
        handle.tick_now().await.unwrap();
        handle.tick_now().await.unwrap();
        handle.shutdown().await;
        join.await.unwrap().unwrap();
    }

    let store = test_store(&dir);
    let events = store.read_memory_events(Local::now().date_naive()).unwrap();
    assert_eq!(events.len(), 1, "one memory event per day, restarts included");
}

#[tokio::test]
async fn credential_failure_aborts_the_sampler() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);
    let monitor = manual_tick_config();

    let (session, state) = FakeSession::new();
    FakeSession::reply_stderr(
        &state,
        "top",
        "ERROR 1045 (28000): Access denied for user 'perf'@'localhost'",
    );

    let (handle, join) = SamplerActor::spawn(
        test_channel(session),
        test_detector(&monitor),
        store,
        test_mysql_config(),
        monitor,
        1234,
    );

    assert!(handle.tick_now().await.is_err());
    let err = join.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("credential failure"));
    assert!(
        !state.lock().unwrap().connected,
        "the channel is closed before the sampler exits"
    );
}

#[tokio::test]
async fn unreadable_processlist_degrades_the_event_not_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(&dir);
    let monitor = manual_tick_config();

    let (session, state) = FakeSession::new();
    FakeSession::reply(&state, "top", TOP_SPIKE);
    FakeSession::reply(&state, "PROCESSLIST", "mysqld: unexpected banner\nno table here");
    FakeSession::reply(&state, "free", FREE_LOW);

    let (handle, join) = SamplerActor::spawn(
        test_channel(session),
        test_detector(&monitor),
        store.clone(),
        test_mysql_config(),
        monitor,
        1234,
    );
    handle.tick_now().await.unwrap();
    handle.shutdown().await;
    join.await.unwrap().unwrap();

    let events = store.read_cpu_events(Local::now().date_naive()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].heaviest, HeaviestQuery::SnapshotUnavailable);
}
