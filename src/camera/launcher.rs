//! Lifecycle of the single encoder process

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use super::command::{EncoderCommand, StreamConfig};
use super::error::StreamError;
use super::shutdown::shutdown_child;

/// Produces the command line for a config; swapped out in tests
pub type CommandBuilder =
    Box<dyn Fn(&StreamConfig) -> Result<EncoderCommand, StreamError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Snapshot reported by `info()`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    pub url: String,
    pub resolution: String,
    pub fps: u32,
    pub bitrate: u32,
    pub running: bool,
}

struct RunningStream {
    child: Child,
    pid: u32,
}

pub struct StreamLauncher {
    config: StreamConfig,
    builder: CommandBuilder,
    startup_grace: Duration,
    stop_grace: Duration,
    running: Option<RunningStream>,
}

impl StreamLauncher {
    pub fn new(config: StreamConfig) -> Self {
        Self::with_builder(config, Box::new(EncoderCommand::for_config))
    }

    pub fn with_builder(config: StreamConfig, builder: CommandBuilder) -> Self {
        Self {
            config,
            builder,
            startup_grace: Duration::from_secs(2),
            stop_grace: Duration::from_secs(5),
            running: None,
        }
    }

    /// How long a fresh encoder must survive before `start` reports success
    pub fn startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// How long `stop` waits after SIGTERM before killing
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stream_url(&self) -> String {
        self.config.stream_url()
    }

    /// Clear the handle if the encoder has exited on its own
    fn reap(&mut self) {
        let Some(stream) = self.running.as_mut() else {
            return;
        };
        match stream.child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                tracing::warn!(pid = stream.pid, %status, "encoder exited");
                self.running = None;
            }
            Err(e) => {
                tracing::warn!(pid = stream.pid, error = %e, "could not poll encoder, dropping handle");
                self.running = None;
            }
        }
    }

    pub fn is_running(&mut self) -> bool {
        self.reap();
        self.running.is_some()
    }

    pub fn pid(&mut self) -> Option<u32> {
        self.reap();
        self.running.as_ref().map(|s| s.pid)
    }

    pub fn info(&mut self) -> StreamInfo {
        StreamInfo {
            url: self.stream_url(),
            resolution: self.config.resolution(),
            fps: self.config.fps,
            bitrate: self.config.bitrate,
            running: self.is_running(),
        }
    }

    pub async fn start(&mut self) -> Result<StartOutcome, StreamError> {
        if self.is_running() {
            tracing::warn!("stream already running");
            return Ok(StartOutcome::AlreadyRunning);
        }
        if !self.config.device_path.exists() {
            return Err(StreamError::DeviceNotFound(self.config.device_path.clone()));
        }

        let command = (self.builder)(&self.config)?;
        tracing::info!(command = %command.display(), "starting encoder");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StreamError::Spawn {
                program: command.program.display().to_string(),
                source,
            })?;
        let pid = child.id().unwrap_or_default();

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, pid, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, pid, "stderr");
        }

        tokio::time::sleep(self.startup_grace).await;
        if let Some(status) = child.try_wait()? {
            tracing::error!(pid, %status, "encoder failed to start");
            return Err(StreamError::ExitedEarly { status });
        }

        tracing::info!(pid, url = %self.stream_url(), "stream started");
        self.running = Some(RunningStream { child, pid });
        Ok(StartOutcome::Started { pid })
    }

    pub async fn stop(&mut self) -> Result<StopOutcome, StreamError> {
        self.reap();
        let Some(stream) = self.running.take() else {
            return Ok(StopOutcome::NotRunning);
        };
        tracing::info!(pid = stream.pid, "stopping encoder");
        let status = shutdown_child(stream.child, self.stop_grace).await?;
        tracing::info!(pid = stream.pid, %status, "stream stopped");
        Ok(StopOutcome::Stopped)
    }

    /// Resolve when the encoder exits; pending forever if nothing runs
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        match self.running.as_mut() {
            Some(stream) => {
                let status = stream.child.wait().await?;
                self.running = None;
                Ok(status)
            }
            None => std::future::pending().await,
        }
    }
}

impl Drop for StreamLauncher {
    fn drop(&mut self) {
        if let Some(mut stream) = self.running.take() {
            tracing::debug!(pid = stream.pid, "killing encoder on drop");
            let _ = stream.child.start_kill();
        }
    }
}

fn forward_lines<R>(pipe: R, pid: u32, name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(pid, pipe = name, "{line}");
        }
        tracing::trace!(pid, pipe = name, "encoder pipe closed");
    });
}
