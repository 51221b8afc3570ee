use std::path::PathBuf;

use chrono::NaiveTime;
use tracing::trace;

/// SSH endpoint of the monitored host.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SshConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

/// MySQL client credentials used to build remote `mysql` invocations.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MysqlConfig {
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_mysql_host")]
    pub host: String,
}

fn default_mysql_host() -> String {
    String::from("localhost")
}

impl MysqlConfig {
    fn client_prefix(&self) -> String {
        format!(
            "mysql -u'{}' -p'{}' -h'{}'",
            self.user,
            self.password.as_deref().unwrap_or_default(),
            self.host
        )
    }

    /// Top-N longest active sessions, boxed table output. Sleeping sessions,
    /// our own connection and the event scheduler are excluded server-side;
    /// the parser applies the same exclusions again defensively.
    pub fn processlist_command(&self, limit: usize) -> String {
        format!(
            "{} -e \"SELECT ID, USER, HOST, DB, COMMAND, TIME, STATE, INFO \
             FROM information_schema.PROCESSLIST \
             WHERE COMMAND != 'Sleep' AND ID != CONNECTION_ID() AND USER != 'event_scheduler' \
             ORDER BY TIME DESC LIMIT {limit}\" --table",
            self.client_prefix()
        )
    }

    pub fn global_variables_command(&self) -> String {
        format!("{} -e \"SHOW GLOBAL VARIABLES;\"", self.client_prefix())
    }

    pub fn qcache_status_command(&self) -> String {
        format!("{} -e \"SHOW STATUS LIKE 'Qcache%';\"", self.client_prefix())
    }

    pub fn engine_status_command(&self) -> String {
        format!("{} -e \"SHOW ENGINE INNODB STATUS;\"", self.client_prefix())
    }
}

/// Thresholds and cadences for the sampling loops.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    /// CPU% above which a fast-loop sample becomes an event.
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,

    /// Memory% above which a slow-cadence sample becomes an event.
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,

    /// Fast loop interval in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Memory check cadence in seconds, re-evaluated on every fast tick.
    #[serde(default = "default_memory_interval_secs")]
    pub memory_interval_secs: u64,

    /// Heartbeat log cadence in seconds.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Timeout for a single remote command.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// How many longest-running queries to attach to a CPU event.
    #[serde(default = "default_top_queries")]
    pub top_queries: usize,

    /// Log raw command output at trace level.
    #[serde(default)]
    pub debug_commands: bool,
}

fn default_cpu_threshold() -> f64 {
    80.0
}

fn default_memory_threshold() -> f64 {
    90.0
}

fn default_interval_secs() -> u64 {
    10
}

fn default_memory_interval_secs() -> u64 {
    1800
}

fn default_heartbeat_secs() -> u64 {
    60
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_top_queries() -> usize {
    5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: default_cpu_threshold(),
            memory_threshold: default_memory_threshold(),
            interval_secs: default_interval_secs(),
            memory_interval_secs: default_memory_interval_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            top_queries: default_top_queries(),
            debug_commands: false,
        }
    }
}

/// Where event files land and when daily summaries go out.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,

    /// Wall-clock times ("HH:MM") at which the daily report is delivered.
    #[serde(default)]
    pub daily_times: Vec<String>,
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("./reports")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
            daily_times: Vec::new(),
        }
    }
}

impl ReportConfig {
    /// Parse the configured "HH:MM" delivery times, rejecting malformed ones.
    pub fn parsed_daily_times(&self) -> anyhow::Result<Vec<NaiveTime>> {
        self.daily_times
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw, "%H:%M")
                    .map_err(|e| anyhow::anyhow!("invalid daily report time {raw:?}: {e}"))
            })
            .collect()
    }
}

/// Outbound webhook for report delivery.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: String,
}

/// Optional OpenAI-compatible advisory endpoint for report enrichment.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_advisor_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_advisor_model")]
    pub model: String,
}

fn default_advisor_url() -> String {
    String::from("https://api.openai.com/v1/chat/completions")
}

fn default_advisor_model() -> String {
    String::from("gpt-4o-mini")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub ssh: SshConfig,
    pub mysql: MysqlConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub reports: ReportConfig,
    pub notify: Option<NotifyConfig>,
    pub advisor: Option<AdvisorConfig>,
}

impl Config {
    /// Secrets may come from the environment instead of the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var("MYSQLGUARD_SSH_PASSWORD") {
            self.ssh.password = Some(password);
        }
        if let Ok(password) = std::env::var("MYSQLGUARD_MYSQL_PASSWORD") {
            self.mysql.password = Some(password);
        }
        if let Some(advisor) = &mut self.advisor
            && let Ok(key) = std::env::var("MYSQLGUARD_ADVISOR_API_KEY")
        {
            advisor.api_key = Some(key);
        }
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str::<Config>(&file_content)
        .map_err(|e| anyhow::anyhow!("invalid configuration file: {e}"))
        .inspect(|config| {
            trace!(
                "loaded config for {}@{}:{}",
                config.ssh.user, config.ssh.host, config.ssh.port
            )
        })
}
