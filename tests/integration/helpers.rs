//! Helper functions and fixtures for integration tests

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mysqlguard::channel::{CommandChannel, RemoteOutput, RemoteSession};
use mysqlguard::config::{MonitorConfig, MysqlConfig};
use mysqlguard::detector::{EventDetector, Thresholds};
use mysqlguard::store::EventStore;

pub const TOP_SPIKE: &str = "\
top - 12:00:01 up 42 days,  1:02,  1 user,  load average: 1.20, 0.80, 0.60
Tasks:   1 total,   1 running,   0 sleeping,   0 stopped,   0 zombie

    PID USER      PR  NI    VIRT    RES    SHR S  %CPU  %MEM     TIME+ COMMAND
   1234 mysql     20   0 8034564 4.1g   34564 S  95.0  13.1 512:33.71 mysqld
";

pub const TOP_IDLE: &str = "\
    PID USER      PR  NI    VIRT    RES    SHR S  %CPU  %MEM     TIME+ COMMAND
   1234 mysql     20   0 8034564 4.1g   34564 S   2.0  13.1 512:33.71 mysqld
";

pub const PROCESSLIST: &str = "\
+----+------+-----------------+------+---------+------+--------------+----------------------------+
| ID | USER | HOST            | DB   | COMMAND | TIME | STATE        | INFO                       |
+----+------+-----------------+------+---------+------+--------------+----------------------------+
| 42 | app  | 10.0.0.5:43210  | shop | Query   | 90   | Sending data | SELECT * FROM orders       |
| 43 | etl  | 10.0.0.9:51000  | dwh  | Query   | 15   | Copying      | INSERT INTO staging SELECT |
+----+------+-----------------+------+---------+------+--------------+----------------------------+
";

pub const FREE_HIGH: &str = "\
              total        used        free      shared  buff/cache   available
Mem:          32094       30500         812         120        2397         900
Swap:          8192        1024        7167
";

pub const FREE_LOW: &str = "\
              total        used        free      shared  buff/cache   available
Mem:          32094        8000       21600         120        2397       23000
Swap:          8192           0        8192
";

/// In-memory remote session answering by command substring.
#[derive(Default)]
pub struct FakeState {
    pub connected: bool,
    pub replies: HashMap<String, String>,
    pub stderr_replies: HashMap<String, String>,
    pub executed: Vec<String>,
}

pub struct FakeSession(pub Arc<Mutex<FakeState>>);

impl FakeSession {
    pub fn new() -> (Self, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState {
            connected: true,
            ..FakeState::default()
        }));
        (Self(state.clone()), state)
    }

    pub fn reply(state: &Arc<Mutex<FakeState>>, needle: &str, stdout: &str) {
        state
            .lock()
            .unwrap()
            .replies
            .insert(needle.to_string(), stdout.to_string());
    }

    pub fn reply_stderr(state: &Arc<Mutex<FakeState>>, needle: &str, stderr: &str) {
        state
            .lock()
            .unwrap()
            .stderr_replies
            .insert(needle.to_string(), stderr.to_string());
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn exec(&mut self, command: &str) -> io::Result<RemoteOutput> {
        let mut state = self.0.lock().unwrap();
        state.executed.push(command.to_string());

        if let Some((_, stderr)) = state
            .stderr_replies
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
        {
            return Ok(RemoteOutput {
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }

        let stdout = state
            .replies
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();
        Ok(RemoteOutput {
            stdout,
            stderr: String::new(),
        })
    }

    async fn reconnect(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.lock().unwrap().connected
    }

    async fn close(&mut self) {
        self.0.lock().unwrap().connected = false;
    }
}

pub fn test_channel(session: FakeSession) -> CommandChannel {
    CommandChannel::new(Box::new(session), Duration::from_millis(500))
}

pub fn test_detector(monitor: &MonitorConfig) -> EventDetector {
    EventDetector::new(
        Thresholds {
            cpu_percent: monitor.cpu_threshold,
            memory_percent: monitor.memory_threshold,
        },
        monitor.top_queries,
    )
}

pub fn test_mysql_config() -> MysqlConfig {
    MysqlConfig {
        user: "perf".into(),
        password: Some("secret".into()),
        host: "localhost".into(),
    }
}

/// Config with a cadence long enough that only explicit ticks fire.
pub fn manual_tick_config() -> MonitorConfig {
    MonitorConfig {
        interval_secs: 3600,
        memory_interval_secs: 0,
        ..MonitorConfig::default()
    }
}

pub fn test_store(dir: &tempfile::TempDir) -> EventStore {
    EventStore::open(dir.path()).unwrap()
}
