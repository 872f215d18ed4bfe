//! End-to-end tests against an in-process stub broker: a real websocket
//! listener speaking just enough STOMP to complete the handshake and echo
//! published bodies back on the private queue.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;

use holler_client::{ChatConfig, ChatError, DisplayMessage, GuestChatClient, LinkState};
use holler_net::stomp::{Command, Frame};
use holler_shared::types::{ConversationId, GuestId, SenderRole};
use holler_shared::ChatMessage;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct StubBroker {
    addr: SocketAddr,
    seen_uri: Arc<Mutex<Option<String>>>,
    subscribes: Arc<Mutex<Vec<String>>>,
}

impl StubBroker {
    fn ws_base(&self) -> String {
        format!("ws://{}", self.addr)
    }

    fn handshake_uri(&self) -> String {
        self.seen_uri.lock().unwrap().clone().expect("no handshake seen")
    }

    /// Every SUBSCRIBE destination seen so far, across all connections.
    fn subscribed_destinations(&self) -> Vec<String> {
        self.subscribes.lock().unwrap().clone()
    }
}

async fn spawn_stub_broker() -> StubBroker {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    spawn_stub_broker_on(listener)
}

fn spawn_stub_broker_on(listener: TcpListener) -> StubBroker {
    let addr = listener.local_addr().unwrap();
    let seen_uri = Arc::new(Mutex::new(None));
    let subscribes = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&seen_uri);
    let subs = Arc::clone(&subscribes);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, Arc::clone(&seen), Arc::clone(&subs)));
        }
    });

    StubBroker {
        addr,
        seen_uri,
        subscribes,
    }
}

async fn serve_connection(
    stream: TcpStream,
    seen: Arc<Mutex<Option<String>>>,
    subscribes: Arc<Mutex<Vec<String>>>,
) {
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *seen.lock().unwrap() = Some(req.uri().to_string());
        Ok(resp)
    };
    let mut ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(_) => return,
    };

    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(txt) = msg else { continue };
        let Ok(Some(frame)) = Frame::parse(txt.as_str()) else {
            continue;
        };
        match frame.command {
            Command::Connect => {
                // Heartbeats off so tests never race the liveness timer.
                let connected = Frame {
                    command: Command::Connected,
                    headers: vec![
                        ("version".into(), "1.2".into()),
                        ("heart-beat".into(), "0,0".into()),
                    ],
                    body: String::new(),
                };
                let _ = ws.send(Message::Text(connected.encode().into())).await;
            }
            Command::Subscribe => {
                if let Some(destination) = frame.header("destination") {
                    subscribes.lock().unwrap().push(destination.to_string());
                }
            }
            Command::Send => {
                // A drop marker kills the socket mid-session; everything
                // else echoes back on the private queue, with the garbage
                // marker turning the echo into a broken payload.
                if frame.body.contains("__drop__") {
                    return;
                }
                let body = if frame.body.contains("__garbage__") {
                    "{not json".to_string()
                } else {
                    frame.body.clone()
                };
                let message = Frame {
                    command: Command::Message,
                    headers: vec![
                        ("destination".into(), "/user/queue/messages".into()),
                        ("message-id".into(), "m-1".into()),
                        ("subscription".into(), "sub-0".into()),
                    ],
                    body,
                };
                let _ = ws.send(Message::Text(message.encode().into())).await;
            }
            Command::Disconnect => {
                let _ = ws.close(None).await;
                return;
            }
            _ => {}
        }
    }
}

/// Poll until the stub has recorded `count` SUBSCRIBE frames, bounded by
/// `RECV_TIMEOUT`. The client flushes its SUBSCRIBE frames before
/// `connect()` resolves, but the stub's serve task still has to be polled
/// to read them off the socket.
async fn wait_for_subscription_count(broker: &StubBroker, count: usize) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while broker.subscribed_destinations().len() < count {
        if tokio::time::Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn channel_callback() -> (
    Box<dyn Fn(ChatMessage) + Send + Sync>,
    mpsc::UnboundedReceiver<ChatMessage>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Box::new(move |message| {
            let _ = tx.send(message);
        }),
        rx,
    )
}

#[tokio::test]
async fn test_round_trip_echoes_into_display_message() {
    let broker = spawn_stub_broker().await;
    let identity = GuestId::generate();
    let (callback, mut rx) = channel_callback();

    let mut client = GuestChatClient::new(ChatConfig::new(broker.ws_base()));
    client.connect("tok-abc", identity, callback).await.unwrap();
    assert!(client.is_connected());

    // Scenario: the handshake carries the stored credential.
    assert!(broker.handshake_uri().contains("/ws/websocket?token=tok-abc"));

    client
        .send_message("hello there", &ConversationId::unassigned())
        .await
        .unwrap();

    let echoed = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(echoed.text, "hello there");
    assert_eq!(echoed.user_id, identity.0);
    assert_eq!(echoed.kind, "GUEST");

    let display = DisplayMessage::from_chat(&echoed);
    assert_eq!(display.role, SenderRole::Support);
    assert_eq!(display.text, "hello there");

    client.disconnect();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_malformed_inbound_payload_never_reaches_callback() {
    let broker = spawn_stub_broker().await;
    let (callback, mut rx) = channel_callback();

    let mut client = GuestChatClient::new(ChatConfig::new(broker.ws_base()));
    client
        .connect("tok-abc", GuestId::generate(), callback)
        .await
        .unwrap();

    // The echo of this one comes back as broken JSON and must be dropped.
    client
        .send_message("__garbage__", &ConversationId::unassigned())
        .await
        .unwrap();
    client
        .send_message("still alive", &ConversationId::unassigned())
        .await
        .unwrap();

    let delivered = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.text, "still alive");

    client.disconnect();
}

#[tokio::test]
async fn test_second_connect_is_rejected_while_active() {
    let broker = spawn_stub_broker().await;
    let (callback, _rx) = channel_callback();

    let mut client = GuestChatClient::new(ChatConfig::new(broker.ws_base()));
    client
        .connect("tok-abc", GuestId::generate(), callback)
        .await
        .unwrap();

    let err = client
        .connect("tok-abc", GuestId::generate(), Box::new(|_| {}))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::AlreadyConnected));
    assert!(client.is_connected());

    client.disconnect();
}

#[tokio::test]
async fn test_disconnect_is_idempotent_after_session() {
    let broker = spawn_stub_broker().await;
    let (callback, _rx) = channel_callback();

    let mut client = GuestChatClient::new(ChatConfig::new(broker.ws_base()));
    client
        .connect("tok-abc", GuestId::generate(), callback)
        .await
        .unwrap();

    client.disconnect();
    client.disconnect();
    assert!(!client.is_connected());
    assert_eq!(client.state(), LinkState::Idle);
}

#[tokio::test]
async fn test_reconnect_replaces_failed_attempt_cleanly() {
    // Reserve a port that refuses the first attempt.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = GuestChatClient::new(ChatConfig::new(format!("ws://{addr}")));
    let err = client
        .connect("tok-abc", GuestId::generate(), Box::new(|_| {}))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Handshake(_)));
    assert_eq!(client.state(), LinkState::Errored);

    // Bring a broker up on that port and connect again.
    let broker = spawn_stub_broker_on(TcpListener::bind(addr).await.unwrap());
    let (callback, mut rx) = channel_callback();
    client
        .connect("tok-abc", GuestId::generate(), callback)
        .await
        .unwrap();
    assert!(client.is_connected());

    // Outlive the abandoned attempt's fixed retry delay; its remains must
    // not touch the live connection's state.
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(client.state(), LinkState::Connected);

    client
        .send_message("after the retry window", &ConversationId::unassigned())
        .await
        .unwrap();
    let echoed = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(echoed.text, "after the retry window");

    client.disconnect();
    drop(broker);
}

#[tokio::test]
async fn test_mid_session_drop_reissues_both_subscriptions() {
    let broker = spawn_stub_broker().await;
    let (callback, mut rx) = channel_callback();

    let mut client = GuestChatClient::new(ChatConfig::new(broker.ws_base()));
    client
        .connect("tok-abc", GuestId::generate(), callback)
        .await
        .unwrap();
    wait_for_subscription_count(&broker, 2).await;
    assert_eq!(
        broker.subscribed_destinations(),
        vec!["/user/queue/messages", "/topic/messages"]
    );

    // Kill the socket mid-session; the transport must come back on its
    // fixed retry with both subscriptions registered from scratch.
    client
        .send_message("__drop__", &ConversationId::unassigned())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(7)).await;

    assert!(client.is_connected());
    wait_for_subscription_count(&broker, 4).await;
    assert_eq!(
        broker.subscribed_destinations(),
        vec![
            "/user/queue/messages",
            "/topic/messages",
            "/user/queue/messages",
            "/topic/messages"
        ]
    );

    client
        .send_message("back again", &ConversationId::unassigned())
        .await
        .unwrap();
    let echoed = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(echoed.text, "back again");

    client.disconnect();
}

#[tokio::test]
async fn test_send_after_disconnect_is_a_noop() {
    let broker = spawn_stub_broker().await;
    let (callback, _rx) = channel_callback();

    let mut client = GuestChatClient::new(ChatConfig::new(broker.ws_base()));
    client
        .connect("tok-abc", GuestId::generate(), callback)
        .await
        .unwrap();
    client.disconnect();

    let err = client
        .send_message("too late", &ConversationId::unassigned())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotConnected));
}
