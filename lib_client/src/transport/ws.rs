//! # WebSocket Transport Wrapper
//!
//! Owns the single bidirectional connection to the OfficeStream backend. The
//! wrapper runs as a background task and talks to the connection manager over
//! a pair of channels: commands in ([`TransportCommand`]), lifecycle events
//! and raw frames out ([`TransportEvent`]).
//!
//! Reconnection policy lives here, not in the manager: on a failed connect or
//! a dropped session the task sleeps through a capped exponential backoff
//! window and tries again, up to a bounded number of consecutive failures. A
//! successful open resets the budget. While connected, a keepalive ping is
//! sent on an interval and an inactivity watchdog declares the connection
//! dead when the backend has been silent for too long.

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use uuid::Uuid;

use crate::config::ClientConfig;

/// Instructions accepted by the transport task.
#[derive(Debug, Clone)]
pub enum TransportCommand {
    /// Send a raw text frame.
    Send(String),
    /// Close the connection and stop the task; no reconnect follows.
    Close,
}

/// Lifecycle notifications and inbound frames emitted by the transport task.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A connection was established.
    Opened { transport_id: String },
    /// The connection ended; the reason distinguishes client-initiated
    /// closes from failures.
    Closed { reason: String },
    /// One reconnect attempt failed.
    Errored { error: String },
    /// One inbound text frame, undecoded.
    Frame(String),
}

/// Tuning knobs of the transport task, taken from [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub url: String,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub heartbeat_interval: Duration,
    pub inactivity_timeout: Duration,
}

impl TransportSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            url: config.ws_endpoint(),
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
            max_attempts: config.max_reconnect_attempts,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            inactivity_timeout: Duration::from_secs(config.inactivity_timeout_secs),
        }
    }
}

/// Handle type for spawning the transport task.
pub struct WsTransport;

impl WsTransport {
    /// Spawns the transport task and returns its command/event endpoints.
    pub fn spawn(
        settings: TransportSettings,
    ) -> (
        mpsc::UnboundedSender<TransportCommand>,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_loop(settings, cmd_rx, event_tx));
        (cmd_tx, event_rx)
    }
}

/// Backoff for the given 1-based attempt number: base * 2^(n-1), capped.
fn backoff_delay(settings: &TransportSettings, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    settings.base_delay.saturating_mul(factor).min(settings.max_delay)
}

async fn run_loop(
    settings: TransportSettings,
    mut cmd_rx: mpsc::UnboundedReceiver<TransportCommand>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut attempts: u32 = 0;

    loop {
        // A Close issued while disconnected (e.g. during backoff) ends the
        // task before the next attempt.
        if drain_for_close(&mut cmd_rx) {
            let _ = event_tx.send(TransportEvent::Closed {
                reason: "client disconnect".to_string(),
            });
            return;
        }

        log::info!("Connecting to OfficeStream backend: {}", settings.url);

        match connect_async(settings.url.as_str()).await {
            Ok((ws_stream, _)) => {
                attempts = 0;
                let transport_id = Uuid::new_v4().to_string();
                log::info!("Connected to OfficeStream backend (transport {})", transport_id);
                let _ = event_tx.send(TransportEvent::Opened { transport_id });

                let (mut write, mut read) = ws_stream.split();
                let mut heartbeat = tokio::time::interval(settings.heartbeat_interval);
                heartbeat.tick().await; // first tick fires immediately
                let mut last_activity = Instant::now();

                let reason = loop {
                    tokio::select! {
                        cmd = cmd_rx.recv() => {
                            match cmd {
                                Some(TransportCommand::Send(text)) => {
                                    if let Err(e) = write.send(Message::Text(text.into())).await {
                                        log::error!("Failed to send frame: {}", e);
                                        break format!("send failed: {}", e);
                                    }
                                }
                                Some(TransportCommand::Close) | None => {
                                    let _ = write.close().await;
                                    let _ = event_tx.send(TransportEvent::Closed {
                                        reason: "client disconnect".to_string(),
                                    });
                                    return;
                                }
                            }
                        }
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    last_activity = Instant::now();
                                    let _ = event_tx.send(TransportEvent::Frame(text.to_string()));
                                }
                                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                                    // Heartbeat traffic counts as activity so low-volume
                                    // rooms don't trip the watchdog.
                                    last_activity = Instant::now();
                                }
                                Some(Ok(Message::Close(_))) => {
                                    log::warn!("Connection closed by server");
                                    break "closed by server".to_string();
                                }
                                Some(Ok(_)) => {} // binary frames are not part of the protocol
                                Some(Err(e)) => {
                                    log::error!("Transport read error: {}", e);
                                    break format!("read error: {}", e);
                                }
                                None => {
                                    log::warn!("Stream closed by remote host");
                                    break "stream ended".to_string();
                                }
                            }
                        }
                        _ = heartbeat.tick() => {
                            if last_activity.elapsed() > settings.inactivity_timeout {
                                log::warn!(
                                    "No transport activity for {}s. Reconnecting...",
                                    settings.inactivity_timeout.as_secs()
                                );
                                break "inactivity timeout".to_string();
                            }
                            if let Err(e) = write.send(Message::Ping(Vec::new().into())).await {
                                log::error!("Keepalive ping failed: {}", e);
                                break format!("ping failed: {}", e);
                            }
                        }
                    }
                };

                let _ = event_tx.send(TransportEvent::Closed { reason });
                tokio::time::sleep(settings.base_delay).await;
            }
            Err(e) => {
                attempts += 1;
                log::error!(
                    "Failed to connect: {} (attempt {}/{})",
                    e,
                    attempts,
                    settings.max_attempts
                );
                let _ = event_tx.send(TransportEvent::Errored { error: e.to_string() });

                if attempts >= settings.max_attempts {
                    log::error!("Reconnect budget exhausted. Giving up.");
                    let _ = event_tx.send(TransportEvent::Closed {
                        reason: "reconnect attempts exhausted".to_string(),
                    });
                    return;
                }

                tokio::time::sleep(backoff_delay(&settings, attempts)).await;
            }
        }
    }
}

/// Non-blocking scan of pending commands for a Close. Queued Send commands
/// issued while disconnected are discarded with a warning, as there is no
/// session to deliver them on.
fn drain_for_close(cmd_rx: &mut mpsc::UnboundedReceiver<TransportCommand>) -> bool {
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            TransportCommand::Close => return true,
            TransportCommand::Send(_) => {
                log::warn!("Not connected, outbound message dropped");
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TransportSettings {
        TransportSettings {
            url: "ws://127.0.0.1:9".to_string(),
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_attempts: 5,
            heartbeat_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let settings = settings();
        assert_eq!(backoff_delay(&settings, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&settings, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&settings, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&settings, 4), Duration::from_millis(5000));
        assert_eq!(backoff_delay(&settings, 12), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connection_exhausts_bounded_retry_budget() {
        // Port 9 (discard) is unroutable from the test environment, so every
        // attempt fails immediately; the paused clock skips the backoff.
        let (_cmd_tx, mut event_rx) = WsTransport::spawn(settings());

        let mut errors = 0;
        loop {
            match event_rx.recv().await {
                Some(TransportEvent::Errored { .. }) => errors += 1,
                Some(TransportEvent::Closed { reason }) => {
                    assert_eq!(reason, "reconnect attempts exhausted");
                    break;
                }
                Some(other) => panic!("unexpected event: {:?}", other),
                None => panic!("transport task ended without a Closed event"),
            }
        }
        assert_eq!(errors, 5);
    }
}
