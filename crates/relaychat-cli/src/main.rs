//! # relaychat
//!
//! Terminal chat client: joins one channel on the relay, sends a greeting,
//! then sends each line typed on stdin and prints whatever the relay
//! delivers. EOF or Ctrl-C closes the session.

#![deny(unsafe_code)]

mod console;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relaychat_core::{SessionError, SessionState, logging};
use relaychat_session::{ConnectionSession, SessionConfig, event_queue};
use relaychat_settings::ClientSettings;
use tokio::sync::mpsc;

/// First message sent after connecting unless disabled.
const DEFAULT_GREETING: &str = "Hello from client!";

/// Relay chat client.
#[derive(Parser, Debug)]
#[command(name = "relaychat", about = "Chat over a WebSocket relay")]
struct Cli {
    /// Channel to join (defaults to the current Unix time in milliseconds).
    channel: Option<String>,

    /// Message sent right after connecting.
    #[arg(long, default_value = DEFAULT_GREETING)]
    greeting: String,

    /// Do not send a greeting.
    #[arg(long)]
    no_greeting: bool,

    /// Relay host (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Relay port (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a settings file (default `~/.relaychat/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or `tracing` filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_settings(&self) -> Result<ClientSettings> {
        let path = self.settings.clone().unwrap_or_else(relaychat_settings::settings_path);
        let mut settings = relaychat_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    /// Flags win over file and environment.
    fn apply(&self, settings: &mut ClientSettings) {
        if let Some(ref host) = self.host {
            settings.relay.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.relay.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }

    fn greeting(&self) -> Option<&str> {
        (!self.no_greeting).then_some(self.greeting.as_str())
    }
}

/// Read stdin on a plain thread; a blocked read must not hold up exit.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let _reader = std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn send_line(session: &ConnectionSession, text: &str) -> bool {
    match session.send(text).await {
        Ok(()) => true,
        Err(SessionError::SessionClosed) => false,
        Err(e) => {
            tracing::warn!(error = %e, "send failed");
            true
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    logging::init_subscriber(&settings.logging.level);

    let channel = cli.channel.clone().unwrap_or_else(console::default_channel_id);
    let (queue, events) = event_queue(settings.session.event_queue_capacity);
    let session = ConnectionSession::new(SessionConfig::from_settings(&settings), Arc::new(queue));
    let printer = tokio::spawn(console::print_events(events));

    let start = session.start(&channel);
    tokio::pin!(start);
    let started = tokio::select! {
        result = &mut start => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted while connecting");
            let ((), result) = tokio::join!(session.shutdown(), &mut start);
            result
        }
    };
    match started {
        Ok(()) => {}
        Err(SessionError::InvalidArgument(msg)) => {
            printer.abort();
            anyhow::bail!("invalid channel: {msg}");
        }
        Err(e) => {
            // the observer already got the terminal event; let the printer show it
            tracing::debug!(error = %e, "start did not complete");
            let _ = printer.await;
            return Ok(exit_code(session.state()));
        }
    }

    let mut open = true;
    if let Some(greeting) = cli.greeting() {
        match session.send(greeting).await {
            Ok(()) => println!("{}", console::GREETING_SENT),
            Err(SessionError::SessionClosed) => open = false,
            Err(e) => tracing::warn!(error = %e, "greeting not sent"),
        }
    }

    let mut input = spawn_stdin_reader();
    while open {
        tokio::select! {
            line = input.recv() => match line {
                Some(line) => {
                    let text = line.trim_end_matches('\r');
                    if !text.is_empty() {
                        open = send_line(&session, text).await;
                    }
                }
                None => {
                    tracing::debug!("stdin closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            _ = session.wait_terminal() => break,
        }
    }

    session.shutdown().await;
    let _ = printer.await;

    Ok(exit_code(session.state()))
}

/// Non-zero only when the session ended abnormally.
fn exit_code(state: SessionState) -> ExitCode {
    if state == SessionState::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
