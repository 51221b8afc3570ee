//! Remote command channel
//!
//! The transport is an opaque [`RemoteSession`] capability; this module owns
//! only the retry/reconnect policy around it. On a stale session the channel
//! performs exactly one reconnect attempt before re-issuing the command
//! (attempt count configurable). Every issued command and every reconnect
//! attempt is logged for auditability.

pub mod ssh;

use std::io;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, instrument, trace, warn};

/// Raw result of one remote execution.
#[derive(Debug, Clone, Default)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Opaque remote execution session. Authentication and transport mechanics
/// live behind this trait; the channel never sees them.
#[async_trait]
pub trait RemoteSession: Send {
    /// Execute a command and capture both output streams. Transport-level
    /// failures (broken pipe, closed session) surface as `io::Error`.
    async fn exec(&mut self, command: &str) -> io::Result<RemoteOutput>;

    /// Tear down and re-establish the session.
    async fn reconnect(&mut self) -> io::Result<()>;

    /// Whether the underlying session is believed to be alive.
    fn is_connected(&self) -> bool;

    /// Close the session. Idempotent.
    async fn close(&mut self);
}

/// Errors produced by [`CommandChannel::exec`].
#[derive(Debug)]
pub enum ChannelError {
    /// The session is down and reconnecting did not help.
    Unavailable(String),

    /// The command did not return within the configured timeout.
    Timeout(Duration),

    /// The remote side reported an execution error (non-empty error stream).
    RemoteError(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Unavailable(msg) => write!(f, "remote channel unavailable: {msg}"),
            ChannelError::Timeout(timeout) => {
                write!(f, "remote command timed out after {}s", timeout.as_secs())
            }
            ChannelError::RemoteError(msg) => write!(f, "remote execution error: {msg}"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl ChannelError {
    /// A remote error carrying a credential-failure signature. Retrying
    /// cannot succeed, so callers treat this as fatal.
    pub fn is_access_denied(&self) -> bool {
        match self {
            ChannelError::RemoteError(msg) => {
                msg.contains("Access denied") || msg.contains("Permission denied")
            }
            _ => false,
        }
    }
}

static PASSWORD_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-p'[^']*'").expect("static regex"));

/// Mask inline MySQL passwords before a command line hits the logs.
fn redact(command: &str) -> String {
    PASSWORD_FLAG.replace_all(command, "-p'***'").into_owned()
}

/// Retry/reconnect policy around a [`RemoteSession`].
///
/// Not safe for concurrent callers issuing overlapping commands; in steady
/// state only the sampler's fast loop owns an instance.
pub struct CommandChannel {
    session: Box<dyn RemoteSession>,
    timeout: Duration,
    reconnect_attempts: u32,
}

impl CommandChannel {
    pub fn new(session: Box<dyn RemoteSession>, timeout: Duration) -> Self {
        Self {
            session,
            timeout,
            reconnect_attempts: 1,
        }
    }

    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub async fn close(&mut self) {
        self.session.close().await;
        info!("remote channel closed");
    }

    /// Execute a command with a bounded timeout and at most
    /// `reconnect_attempts` reconnect-then-retry cycles.
    #[instrument(skip_all, fields(command = %redact(command)))]
    pub async fn exec(&mut self, command: &str) -> Result<String, ChannelError> {
        info!("executing remote command: {}", redact(command));

        if !self.session.is_connected() {
            warn!("remote session inactive before command, reconnecting");
            self.try_reconnect().await?;
        }

        let mut attempts_left = self.reconnect_attempts;
        loop {
            match self.exec_once(command).await {
                Err(ChannelError::Unavailable(reason)) => {
                    if attempts_left == 0 {
                        return Err(ChannelError::Unavailable(reason));
                    }
                    attempts_left -= 1;
                    warn!("session broke during command ({reason}), reconnecting");
                    self.try_reconnect().await?;
                }
                other => return other,
            }
        }
    }

    async fn exec_once(&mut self, command: &str) -> Result<String, ChannelError> {
        match tokio::time::timeout(self.timeout, self.session.exec(command)).await {
            Err(_) => Err(ChannelError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(ChannelError::Unavailable(e.to_string())),
            Ok(Ok(output)) => {
                if output.stderr.trim().is_empty() {
                    trace!("command returned {} bytes", output.stdout.len());
                    Ok(output.stdout)
                } else {
                    Err(ChannelError::RemoteError(output.stderr.trim().to_string()))
                }
            }
        }
    }

    async fn try_reconnect(&mut self) -> Result<(), ChannelError> {
        info!("attempting session reconnect");
        self.session
            .reconnect()
            .await
            .map_err(|e| ChannelError::Unavailable(format!("reconnect failed: {e}")))
    }
}
