//! Broker session task with the tokio mpsc command/notification pattern.
//!
//! The websocket and its STOMP session live in a dedicated tokio task.
//! External code communicates with it through typed command and
//! notification channels, keeping the transport layer fully asynchronous
//! and decoupled. Reconnection is the transport's own fixed-delay timer:
//! the task reopens the socket and re-issues both subscriptions from
//! scratch, so a replacement connection atomically replaces them.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use holler_shared::constants::{
    BROADCAST_TOPIC, HEARTBEAT_INCOMING_MS, HEARTBEAT_OUTGOING_MS, PRIVATE_QUEUE,
    RECONNECT_DELAY_MS, WS_PATH,
};

use crate::stomp::{Command, Frame};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the broker task.
#[derive(Debug)]
pub enum BrokerCommand {
    /// Publish a body to a named destination.
    Publish { destination: String, body: String },
    /// Gracefully close the session and end the task.
    Shutdown,
}

/// Notifications sent *from* the broker task to the application.
#[derive(Debug, Clone)]
pub enum BrokerNotification {
    /// Handshake done and both subscriptions registered; the session is
    /// ready to receive.
    Connected,
    /// A frame arrived on one of the subscriptions.
    MessageReceived { destination: String, body: String },
    /// The broker sent an ERROR frame. Logged, non-fatal.
    ProtocolError { message: String, detail: String },
    /// The websocket failed (connect, read, write, or heartbeat silence).
    TransportError { message: String },
    /// The current connection is gone. The task keeps retrying on its
    /// reconnect timer unless it was shut down.
    Disconnected,
}

/// Configuration for spawning the broker task.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Full websocket URL, token query parameter included.
    pub ws_url: String,
    /// Virtual host for the STOMP CONNECT frame.
    pub host: String,
    /// Client heartbeat offer in milliseconds (outgoing, incoming).
    pub heartbeat: (u32, u32),
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Per-guest inbound queue subscription.
    pub private_queue: String,
    /// Shared broadcast topic subscription.
    pub broadcast_topic: String,
}

impl BrokerConfig {
    pub fn new(ws_url: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            host: host.into(),
            heartbeat: (HEARTBEAT_OUTGOING_MS, HEARTBEAT_INCOMING_MS),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            private_queue: PRIVATE_QUEUE.to_string(),
            broadcast_topic: BROADCAST_TOPIC.to_string(),
        }
    }
}

/// Build the broker endpoint URL for a given base (`ws://host` or
/// `wss://host`) and access credential.
pub fn broker_url(ws_base: &str, token: &str) -> String {
    format!(
        "{}{}?token={}",
        ws_base.trim_end_matches('/'),
        WS_PATH,
        urlencoding::encode(token)
    )
}

/// Extract the host (and port, if any) from a websocket base URL, for the
/// CONNECT frame's `host` header.
pub fn host_of(ws_base: &str) -> String {
    let rest = ws_base
        .strip_prefix("wss://")
        .or_else(|| ws_base.strip_prefix("ws://"))
        .unwrap_or(ws_base);
    rest.split(['/', '?'])
        .next()
        .unwrap_or(rest)
        .to_string()
}

/// Spawn the broker session in a background tokio task.
///
/// Returns channels for sending commands and receiving notifications. The
/// task ends on [`BrokerCommand::Shutdown`], when all command senders are
/// dropped, or when the notification receiver goes away.
pub fn spawn_broker(
    config: BrokerConfig,
) -> (
    mpsc::Sender<BrokerCommand>,
    mpsc::Receiver<BrokerNotification>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel::<BrokerCommand>(64);
    let (notif_tx, notif_rx) = mpsc::channel::<BrokerNotification>(256);

    tokio::spawn(run_broker(config, cmd_rx, notif_tx));

    (cmd_tx, notif_rx)
}

enum SessionEnd {
    /// Graceful shutdown; the task must not reconnect.
    Shutdown,
    /// The connection died; retry after the reconnect delay.
    Dropped,
}

async fn run_broker(
    config: BrokerConfig,
    mut cmd_rx: mpsc::Receiver<BrokerCommand>,
    notif_tx: mpsc::Sender<BrokerNotification>,
) {
    loop {
        debug!(host = %config.host, "connecting to broker");

        let mut ws = match connect_async(config.ws_url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                error!(host = %config.host, error = %e, "websocket connect failed");
                let notif = BrokerNotification::TransportError {
                    message: e.to_string(),
                };
                if notif_tx.send(notif).await.is_err() {
                    return;
                }
                sleep(config.reconnect_delay).await;
                continue;
            }
        };

        match run_session(&mut ws, &config, &mut cmd_rx, &notif_tx).await {
            SessionEnd::Shutdown => {
                let _ = notif_tx.send(BrokerNotification::Disconnected).await;
                info!("broker session shut down");
                return;
            }
            SessionEnd::Dropped => {
                if notif_tx
                    .send(BrokerNotification::Disconnected)
                    .await
                    .is_err()
                {
                    return;
                }
                sleep(config.reconnect_delay).await;
            }
        }
    }
}

async fn run_session(
    ws: &mut Ws,
    config: &BrokerConfig,
    cmd_rx: &mut mpsc::Receiver<BrokerCommand>,
    notif_tx: &mpsc::Sender<BrokerNotification>,
) -> SessionEnd {
    let connect = Frame::connect(&config.host, config.heartbeat);
    if let Err(e) = ws.send(Message::Text(connect.encode().into())).await {
        error!(error = %e, "failed to send CONNECT");
        let _ = notif_tx
            .send(BrokerNotification::TransportError {
                message: e.to_string(),
            })
            .await;
        return SessionEnd::Dropped;
    }

    let server_heartbeat = match await_connected(ws).await {
        Ok(hb) => hb,
        Err(message) => {
            error!(message = %message, "broker handshake failed");
            let _ = notif_tx
                .send(BrokerNotification::TransportError { message })
                .await;
            return SessionEnd::Dropped;
        }
    };

    // Both subscriptions must be registered before the session is ready.
    let destinations = [config.private_queue.as_str(), config.broadcast_topic.as_str()];
    for (i, destination) in destinations.into_iter().enumerate() {
        let frame = Frame::subscribe(&format!("sub-{i}"), destination);
        if let Err(e) = ws.send(Message::Text(frame.encode().into())).await {
            error!(destination = %destination, error = %e, "subscribe failed");
            let _ = notif_tx
                .send(BrokerNotification::TransportError {
                    message: e.to_string(),
                })
                .await;
            return SessionEnd::Dropped;
        }
    }

    let (outgoing, incoming) = negotiate(config.heartbeat, server_heartbeat);
    info!(
        private = %config.private_queue,
        broadcast = %config.broadcast_topic,
        heartbeat_out_ms = outgoing,
        heartbeat_in_ms = incoming,
        "broker session established"
    );

    if notif_tx.send(BrokerNotification::Connected).await.is_err() {
        return SessionEnd::Shutdown;
    }

    let mut send_beat = interval(Duration::from_millis(outgoing.max(1) as u64));
    send_beat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut liveness = interval(Duration::from_millis(incoming.max(1) as u64));
    liveness.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The broker is allowed to miss one heartbeat before we give up.
    let grace = Duration::from_millis(incoming as u64 * 2);
    let mut last_inbound = Instant::now();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(BrokerCommand::Publish { destination, body }) => {
                        let frame = Frame::send(&destination, body);
                        if let Err(e) = ws.send(Message::Text(frame.encode().into())).await {
                            error!(destination = %destination, error = %e, "publish write failed");
                            let _ = notif_tx
                                .send(BrokerNotification::TransportError { message: e.to_string() })
                                .await;
                            return SessionEnd::Dropped;
                        }
                        debug!(destination = %destination, "frame published");
                    }
                    Some(BrokerCommand::Shutdown) | None => {
                        let _ = ws.send(Message::Text(Frame::disconnect().encode().into())).await;
                        let _ = ws.close(None).await;
                        return SessionEnd::Shutdown;
                    }
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(txt))) => {
                        last_inbound = Instant::now();
                        match Frame::parse(txt.as_str()) {
                            Ok(None) => {} // broker heartbeat
                            Ok(Some(frame)) => match frame.command {
                                Command::Message => {
                                    let destination = frame
                                        .header("destination")
                                        .unwrap_or_default()
                                        .to_string();
                                    let notif = BrokerNotification::MessageReceived {
                                        destination,
                                        body: frame.body,
                                    };
                                    if notif_tx.send(notif).await.is_err() {
                                        return SessionEnd::Shutdown;
                                    }
                                }
                                Command::Error => {
                                    let message = frame
                                        .header("message")
                                        .unwrap_or("unknown")
                                        .to_string();
                                    error!(message = %message, "broker reported an error");
                                    let _ = notif_tx
                                        .send(BrokerNotification::ProtocolError {
                                            message,
                                            detail: frame.body,
                                        })
                                        .await;
                                }
                                Command::Receipt => {
                                    debug!(
                                        receipt = frame.header("receipt-id").unwrap_or_default(),
                                        "receipt"
                                    );
                                }
                                other => {
                                    debug!(command = other.as_str(), "ignoring unexpected frame");
                                }
                            },
                            Err(e) => {
                                error!(error = %e, "dropping malformed broker frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {
                        last_inbound = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("broker closed the connection");
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "websocket read failed");
                        let _ = notif_tx
                            .send(BrokerNotification::TransportError { message: e.to_string() })
                            .await;
                        return SessionEnd::Dropped;
                    }
                }
            }

            _ = send_beat.tick(), if outgoing > 0 => {
                if ws.send(Message::Text("\n".into())).await.is_err() {
                    warn!("heartbeat write failed");
                    return SessionEnd::Dropped;
                }
            }

            _ = liveness.tick(), if incoming > 0 => {
                if last_inbound.elapsed() > grace {
                    warn!("no broker traffic within grace period, dropping connection");
                    let _ = notif_tx
                        .send(BrokerNotification::TransportError {
                            message: "heartbeat timeout".to_string(),
                        })
                        .await;
                    return SessionEnd::Dropped;
                }
            }
        }
    }
}

/// Wait for the broker's CONNECTED frame and return its heartbeat offer.
async fn await_connected(ws: &mut Ws) -> Result<(u32, u32), String> {
    let deadline = sleep(HANDSHAKE_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return Err("handshake timed out".to_string()),

            msg = ws.next() => match msg {
                Some(Ok(Message::Text(txt))) => match Frame::parse(txt.as_str()) {
                    Ok(Some(frame)) if frame.command == Command::Connected => {
                        return Ok(frame.heart_beat().unwrap_or((0, 0)));
                    }
                    Ok(Some(frame)) if frame.command == Command::Error => {
                        let message = frame.header("message").unwrap_or("unknown");
                        return Err(format!("broker refused connection: {message}"));
                    }
                    Ok(_) => {} // heartbeat or stray frame before CONNECTED
                    Err(e) => return Err(format!("malformed handshake frame: {e}")),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err("socket closed during handshake".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(format!("websocket error during handshake: {e}")),
            }
        }
    }
}

/// STOMP heartbeat negotiation: each direction is active only when both
/// sides enable it, at the slower of the two rates.
fn negotiate(client: (u32, u32), server: (u32, u32)) -> (u32, u32) {
    let outgoing = if client.0 == 0 || server.1 == 0 {
        0
    } else {
        client.0.max(server.1)
    };
    let incoming = if client.1 == 0 || server.0 == 0 {
        0
    } else {
        client.1.max(server.0)
    };
    (outgoing, incoming)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_url_escapes_token() {
        let url = broker_url("wss://shop.example.com", "tok/+abc=");
        assert_eq!(
            url,
            "wss://shop.example.com/ws/websocket?token=tok%2F%2Babc%3D"
        );
    }

    #[test]
    fn test_broker_url_scenario_token() {
        let url = broker_url("ws://localhost:8080", "tok-abc");
        assert_eq!(url, "ws://localhost:8080/ws/websocket?token=tok-abc");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("wss://shop.example.com"), "shop.example.com");
        assert_eq!(host_of("ws://localhost:8080/extra"), "localhost:8080");
        assert_eq!(host_of("ws://h?x=1"), "h");
    }

    #[test]
    fn test_negotiate_both_enabled() {
        assert_eq!(negotiate((4000, 4000), (10000, 10000)), (10000, 10000));
        assert_eq!(negotiate((4000, 4000), (1000, 1000)), (4000, 4000));
    }

    #[test]
    fn test_negotiate_disabled_directions() {
        assert_eq!(negotiate((4000, 4000), (0, 0)), (0, 0));
        assert_eq!(negotiate((0, 4000), (4000, 4000)), (0, 4000));
        assert_eq!(negotiate((4000, 0), (4000, 4000)), (4000, 0));
    }

    #[test]
    fn test_config_defaults() {
        let config = BrokerConfig::new("ws://h/ws/websocket?token=t", "h");
        assert_eq!(config.heartbeat, (4000, 4000));
        assert_eq!(config.reconnect_delay, Duration::from_millis(5000));
        assert_eq!(config.private_queue, "/user/queue/messages");
        assert_eq!(config.broadcast_topic, "/topic/messages");
    }
}
