//! SSH-backed [`RemoteSession`] using the system `ssh` client.
//!
//! A ControlMaster connection is established once and multiplexed for every
//! command, so per-command latency stays low and the channel's
//! `is_connected` check has a real session to reflect. Authentication is
//! whatever the local ssh configuration provides (keys, agent); passwords
//! are never driven through a pty here.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SshConfig;

use super::{RemoteOutput, RemoteSession};

/// Exit status the ssh client reserves for transport/connection failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

pub struct SshSession {
    config: SshConfig,
    control_dir: tempfile::TempDir,
    connected: bool,
}

impl SshSession {
    /// Establish the master connection.
    pub async fn connect(config: SshConfig) -> io::Result<Self> {
        let control_dir = tempfile::tempdir()?;
        let mut session = Self {
            config,
            control_dir,
            connected: false,
        };
        session.open_master().await?;
        Ok(session)
    }

    fn control_path(&self) -> PathBuf {
        self.control_dir.path().join("control.sock")
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.config.user, self.config.host)
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path().display()))
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-p")
            .arg(self.config.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    async fn open_master(&mut self) -> io::Result<()> {
        info!(
            "opening ssh master connection to {}:{}",
            self.config.host, self.config.port
        );
        let output = self
            .base_command()
            .arg("-M")
            .arg("-N")
            .arg("-f")
            .arg(self.destination())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("ssh master failed: {}", stderr.trim()),
            ));
        }

        self.connected = true;
        debug!("ssh master connection established");
        Ok(())
    }

    async fn close_master(&mut self) {
        if !self.connected {
            return;
        }
        let result = self
            .base_command()
            .arg("-O")
            .arg("exit")
            .arg(self.destination())
            .output()
            .await;
        if let Err(e) = result {
            warn!("failed to close ssh master cleanly: {e}");
        }
        self.connected = false;
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> io::Result<RemoteOutput> {
        let output = self
            .base_command()
            .arg(self.destination())
            .arg(command)
            .output()
            .await?;

        if output.status.code() == Some(SSH_TRANSPORT_FAILURE) {
            self.connected = false;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("ssh transport failure: {}", stderr.trim()),
            ));
        }

        Ok(RemoteOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn reconnect(&mut self) -> io::Result<()> {
        warn!("ssh session inactive, re-establishing master connection");
        self.close_master().await;
        self.open_master().await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) {
        self.close_master().await;
        info!("ssh session closed");
    }
}
