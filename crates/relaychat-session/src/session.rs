//! The public session handle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use relaychat_core::{ChannelId, DisconnectReason, Result, SessionError, SessionState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::config::SessionConfig;
use crate::driver::{Driver, OutboundCommand, rejection};
use crate::endpoint::endpoint_address;
use crate::observer::SessionObserver;
use crate::state::StateCell;

/// Extra time `shutdown` allows the driver beyond the close handshake bound.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

struct Target {
    channel: ChannelId,
    endpoint: String,
}

/// One logical connection to the relay, scoped to a single channel.
///
/// Lifecycle: `Idle → Connecting → Open → Closing → Closed`, with `Failed`
/// reachable from `Connecting` and `Open`. Both terminal states are final;
/// a session is never restarted.
///
/// Once [`start`](Self::start) succeeds a background driver task owns the
/// stream and delivers inbound messages to the observer. `send` and
/// `shutdown` may be called from any task while that runs. Dropping the
/// session requests a graceful close.
pub struct ConnectionSession {
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
    state: Arc<StateCell>,
    shutdown: CancellationToken,
    target: RwLock<Option<Target>>,
    commands: Mutex<Option<mpsc::Sender<OutboundCommand>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionSession {
    /// Create an idle session.
    pub fn new(config: SessionConfig, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            config,
            observer,
            state: Arc::new(StateCell::new()),
            shutdown: CancellationToken::new(),
            target: RwLock::new(None),
            commands: Mutex::new(None),
            driver: Mutex::new(None),
        }
    }

    /// Connect to `<base>/<channel>` and begin receiving.
    ///
    /// An empty channel fails with [`SessionError::InvalidArgument`] before
    /// any I/O and leaves the session `Idle`. A failed or timed-out connect
    /// moves the session to `Failed`, reports the error to the observer, and
    /// returns it.
    pub async fn start(&self, channel: &str) -> Result<()> {
        let channel = ChannelId::new(channel)?;
        if !self.state.advance(SessionState::Idle, SessionState::Connecting) {
            let state = self.state.get();
            return Err(if state.is_terminal() {
                SessionError::SessionClosed
            } else {
                SessionError::AlreadyStarted { state }
            });
        }

        let endpoint = endpoint_address(&self.config.base_address, &channel);
        *self.target.write() = Some(Target {
            channel: channel.clone(),
            endpoint: endpoint.clone(),
        });
        info!(%channel, %endpoint, "connecting");

        let limit = self.config.connect_timeout;
        let connect = tokio::time::timeout(limit, tokio_tungstenite::connect_async(endpoint.as_str()));
        let outcome = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            result = connect => Some(result),
        };

        let ws = match outcome {
            None => {
                if self.state.terminate(SessionState::Closed) {
                    info!("shutdown requested while connecting");
                    self.observer.on_disconnected(&DisconnectReason::Normal);
                }
                return Err(SessionError::SessionClosed);
            }
            Some(Err(_elapsed)) => {
                return Err(self.fail_connect(endpoint, format!("timed out after {}ms", limit.as_millis())));
            }
            Some(Ok(Err(e))) => return Err(self.fail_connect(endpoint, e.to_string())),
            Some(Ok(Ok((ws, _response)))) => ws,
        };

        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        *self.commands.lock() = Some(tx);
        if !self.state.advance(SessionState::Connecting, SessionState::Open) {
            return Err(rejection(self.state.get()));
        }
        info!(%channel, "connected");
        self.observer.on_connected(&channel);

        let driver = Driver::new(
            ws,
            rx,
            self.shutdown.clone(),
            self.state.clone(),
            self.observer.clone(),
            &self.config,
        );
        let span = info_span!("session", channel = %channel);
        *self.driver.lock() = Some(tokio::spawn(driver.run().instrument(span)));
        Ok(())
    }

    fn fail_connect(&self, endpoint: String, reason: String) -> SessionError {
        let error = SessionError::Connection { endpoint, reason };
        warn!(error = %error, "connect failed");
        if self.state.terminate(SessionState::Failed) {
            self.observer.on_error(&error);
        }
        error
    }

    /// Send one text message as a single frame.
    ///
    /// Resolves once the frame has been written. Sends from concurrent
    /// callers are serialized; their frames never interleave.
    pub async fn send(&self, text: &str) -> Result<()> {
        let state = self.state.get();
        if state != SessionState::Open {
            return Err(rejection(state));
        }
        let commands = self.commands.lock().clone();
        let Some(commands) = commands else {
            return Err(rejection(self.state.get()));
        };

        let (reply, response) = oneshot::channel();
        let command = OutboundCommand {
            text: text.to_owned(),
            reply,
        };
        if commands.send(command).await.is_err() {
            return Err(rejection(self.state.get()));
        }
        response
            .await
            .unwrap_or_else(|_| Err(rejection(self.state.get())))
    }

    /// Close the session and wait for it to reach a terminal state.
    ///
    /// Safe to call in any state and any number of times. Waits at most the
    /// close timeout plus a short grace period; past that the driver is
    /// aborted and the session is marked closed anyway.
    pub async fn shutdown(&self) {
        if self.state.get() == SessionState::Idle
            && self.state.advance(SessionState::Idle, SessionState::Closed)
        {
            info!("session closed before it started");
            self.observer.on_disconnected(&DisconnectReason::NeverStarted);
            return;
        }
        if self.state.get().is_terminal() {
            return;
        }

        self.shutdown.cancel();
        let bound = self.config.close_timeout + SHUTDOWN_GRACE;
        let mut rx = self.state.subscribe();
        let finished = tokio::time::timeout(bound, rx.wait_for(|s| s.is_terminal())).await;
        if matches!(finished, Ok(Ok(_))) {
            return;
        }

        warn!(bound_ms = bound.as_millis(), "driver did not stop in time, aborting");
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
        if self.state.terminate(SessionState::Closed) {
            self.observer.on_disconnected(&DisconnectReason::HandshakeIncomplete {
                detail: format!("driver did not stop within {}ms", bound.as_millis()),
            });
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the session is `Closed` or `Failed`, and return which.
    pub async fn wait_terminal(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let current = *rx.borrow_and_update();
        if current.is_terminal() {
            return current;
        }
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state.get(),
        }
    }

    /// Channel this session was started for.
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.target.read().as_ref().map(|t| t.channel.clone())
    }

    /// Endpoint address this session was started for.
    pub fn endpoint(&self) -> Option<String> {
        self.target.read().as_ref().map(|t| t.endpoint.clone())
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
