//! The per-session driver task.
//!
//! The driver exclusively owns the WebSocket stream for the whole life of
//! the session. It multiplexes, in priority order:
//!
//! 1. the shutdown token (local close request),
//! 2. inbound frames,
//! 3. outbound send commands (one complete frame per command, so writes
//!    never interleave),
//! 4. the read idle deadline, when configured.
//!
//! Every exit path funnels through [`Driver::finish`], which releases the
//! stream before the terminal state is published and the final lifecycle
//! notification is sent. If the task is aborted instead, dropping the
//! driver releases the stream the same way.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use relaychat_core::{DisconnectReason, SessionError, SessionState};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::frame::{self, CloseDetails, Inbound};
use crate::observer::SessionObserver;
use crate::state::StateCell;

/// A queued outbound message and the channel its write result goes back on.
pub(crate) struct OutboundCommand {
    pub(crate) text: String,
    pub(crate) reply: oneshot::Sender<Result<(), SessionError>>,
}

/// The error a rejected send reports for the given state.
pub(crate) fn rejection(state: SessionState) -> SessionError {
    if state.is_terminal() {
        SessionError::SessionClosed
    } else {
        SessionError::Send { state }
    }
}

/// Why the receive loop stopped.
enum LoopExit {
    /// Shutdown token fired, or every session handle was dropped.
    Shutdown,
    /// The relay sent a close frame.
    PeerClosed(Option<CloseDetails>),
    /// Transport error mid-session.
    Failed(SessionError),
}

/// How the session ended, once the stream is gone.
enum Terminal {
    Closed(DisconnectReason),
    Failed(SessionError),
}

pub(crate) struct Driver<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    stream: SplitStream<WebSocketStream<S>>,
    commands: mpsc::Receiver<OutboundCommand>,
    shutdown: CancellationToken,
    state: Arc<StateCell>,
    observer: Arc<dyn SessionObserver>,
    close_timeout: Duration,
    read_timeout: Option<Duration>,
    last_inbound: Instant,
}

impl<S> Driver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        ws: WebSocketStream<S>,
        commands: mpsc::Receiver<OutboundCommand>,
        shutdown: CancellationToken,
        state: Arc<StateCell>,
        observer: Arc<dyn SessionObserver>,
        config: &SessionConfig,
    ) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink,
            stream,
            commands,
            shutdown,
            state,
            observer,
            close_timeout: config.close_timeout,
            read_timeout: config.read_timeout,
            last_inbound: Instant::now(),
        }
    }

    /// Drive the session from `Open` to `Closed` or `Failed`.
    pub(crate) async fn run(mut self) {
        let terminal = match self.receive_loop().await {
            LoopExit::Failed(error) => Terminal::Failed(error),
            LoopExit::Shutdown => {
                self.begin_closing();
                match self.close_handshake(false).await {
                    Ok(()) => Terminal::Closed(DisconnectReason::Normal),
                    Err(detail) => Terminal::Closed(DisconnectReason::HandshakeIncomplete { detail }),
                }
            }
            LoopExit::PeerClosed(details) => {
                self.begin_closing();
                match self.close_handshake(true).await {
                    Ok(()) => Terminal::Closed(DisconnectReason::PeerClosed {
                        code: details.as_ref().map(|d| d.code),
                        reason: details.map(|d| d.reason).unwrap_or_default(),
                    }),
                    Err(detail) => Terminal::Closed(DisconnectReason::HandshakeIncomplete { detail }),
                }
            }
        };
        self.finish(terminal);
    }

    async fn receive_loop(&mut self) -> LoopExit {
        // only re-enter the receive while the session is still open
        while self.state.get() == SessionState::Open {
            let deadline = self.read_timeout.map(|t| self.last_inbound + t);
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    debug!("shutdown requested");
                    return LoopExit::Shutdown;
                }

                frame = self.stream.next() => {
                    self.last_inbound = Instant::now();
                    match frame {
                        Some(Ok(message)) => match frame::decode(message) {
                            Inbound::Text(text) => {
                                trace!(len = text.len(), "message received");
                                self.observer.on_message(&text);
                            }
                            Inbound::Close(details) => {
                                info!(
                                    code = details.as_ref().map(|d| d.code),
                                    reason = details.as_ref().map_or("", |d| d.reason.as_str()),
                                    "relay closed the connection"
                                );
                                return LoopExit::PeerClosed(details);
                            }
                            Inbound::Control => {}
                            Inbound::Undecodable { len } => {
                                warn!(len, "dropping binary frame that is not UTF-8");
                            }
                        },
                        Some(Err(e)) => return LoopExit::Failed(SessionError::Transport(e.to_string())),
                        None => {
                            return LoopExit::Failed(SessionError::Transport(
                                "connection ended without a close handshake".into(),
                            ));
                        }
                    }
                }

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all session handles dropped");
                        return LoopExit::Shutdown;
                    };
                    let result = self.write_text(&command.text).await;
                    let failure = result.as_ref().err().cloned();
                    let _ = command.reply.send(result);
                    if let Some(error) = failure {
                        return LoopExit::Failed(error);
                    }
                }

                () = read_deadline(deadline) => {
                    let waited = self.read_timeout.unwrap_or_default();
                    return LoopExit::Failed(SessionError::Transport(format!(
                        "no frame received within {}ms",
                        waited.as_millis()
                    )));
                }
            }
        }
        LoopExit::Shutdown
    }

    async fn write_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.sink
            .send(frame::encode_text(text))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        trace!(len = text.len(), "message sent");
        Ok(())
    }

    /// `Open → Closing`, then refuse everything still queued.
    fn begin_closing(&mut self) {
        let _ = self.state.advance(SessionState::Open, SessionState::Closing);
        self.reject_pending();
    }

    fn reject_pending(&mut self) {
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            let _ = command.reply.send(Err(rejection(self.state.get())));
        }
    }

    /// Send our close frame and wait, bounded, for the peer to finish the
    /// handshake. Inbound data arriving meanwhile is discarded.
    async fn close_handshake(&mut self, peer_initiated: bool) -> Result<(), String> {
        let limit = self.close_timeout;
        let handshake = async {
            let sent = if peer_initiated {
                // the transport already queued the reply to the peer's frame
                self.sink.close().await
            } else {
                self.sink.send(frame::normal_close()).await
            };
            match sent {
                Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
                Err(e) => return Err(e.to_string()),
            }

            while let Some(frame) = self.stream.next().await {
                match frame {
                    Ok(Message::Close(_)) => debug!("close acknowledged"),
                    Ok(_) => debug!("discarding frame received while closing"),
                    Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
                    Err(e) => return Err(e.to_string()),
                }
            }
            Ok(())
        };

        tokio::time::timeout(limit, handshake)
            .await
            .unwrap_or_else(|_| Err(format!("timed out after {}ms", limit.as_millis())))
    }

    /// Release the stream, publish the terminal state, notify once.
    fn finish(self, terminal: Terminal) {
        let Self {
            sink,
            stream,
            mut commands,
            state,
            observer,
            ..
        } = self;
        drop(sink);
        drop(stream);

        let final_state = match terminal {
            Terminal::Closed(_) => SessionState::Closed,
            Terminal::Failed(_) => SessionState::Failed,
        };
        let won = state.terminate(final_state);

        commands.close();
        while let Ok(command) = commands.try_recv() {
            let _ = command.reply.send(Err(SessionError::SessionClosed));
        }

        if !won {
            return;
        }
        match terminal {
            Terminal::Closed(reason) => {
                info!(%reason, "session closed");
                observer.on_disconnected(&reason);
            }
            Terminal::Failed(error) => {
                warn!(error = %error, "session failed");
                observer.on_error(&error);
            }
        }
    }
}

async fn read_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
