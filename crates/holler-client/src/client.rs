//! Connection lifecycle and message flow for the guest chat session.
//!
//! [`GuestChatClient`] is an explicit owned object: the application
//! constructs one, passes references around, and disposes of it with
//! [`disconnect`](GuestChatClient::disconnect). Exactly one inbound
//! callback is registered per connection and dropped with it.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use holler_net::broker::{
    broker_url, host_of, spawn_broker, BrokerCommand, BrokerConfig, BrokerNotification,
};
use holler_net::messages::{decode_inbound, publish_chat_message};
use holler_shared::constants::SEND_DESTINATION;
use holler_shared::protocol::ChatMessage;
use holler_shared::types::{ConversationId, GuestId};

/// Single inbound hook: invoked once per received message, no return
/// value, no backpressure signal.
pub type MessageCallback = Box<dyn Fn(ChatMessage) + Send + Sync>;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    Errored,
}

/// Errors surfaced by the chat client.
#[derive(thiserror::Error, Debug)]
pub enum ChatError {
    #[error("No access credential; initialise the guest session first")]
    NoCredential,

    #[error("A connection attempt is already in flight")]
    AlreadyConnecting,

    #[error("Already connected")]
    AlreadyConnected,

    /// Send attempted outside the Connected state. Nothing was published.
    #[error("Not connected; message not sent")]
    NotConnected,

    #[error("Broker handshake failed: {0}")]
    Handshake(String),

    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Websocket base URL, e.g. `wss://shop.example.com`. The broker path
    /// and token query parameter are appended at connect time.
    pub ws_base: String,
}

impl ChatConfig {
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into(),
        }
    }
}

/// The guest chat client. One broker connection per instance; the
/// connection and its subscriptions are owned here exclusively.
pub struct GuestChatClient {
    config: ChatConfig,
    state: Arc<Mutex<LinkState>>,
    identity: Option<GuestId>,
    cmd_tx: Option<mpsc::Sender<BrokerCommand>>,
    dispatch: Option<JoinHandle<()>>,
}

impl GuestChatClient {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(LinkState::Idle)),
            identity: None,
            cmd_tx: None,
            dispatch: None,
        }
    }

    /// Open the broker connection and register the inbound callback.
    ///
    /// Fails fast without any network I/O when no credential is supplied.
    /// A second call while a connect is in flight is rejected; the first
    /// caller's attempt wins. Connecting again from the Errored state first
    /// tears down the previous attempt's transport, so two transports never
    /// coexist. Returns once the handshake and both subscriptions are up,
    /// or with [`ChatError::Handshake`] when the first attempt fails — the
    /// transport keeps retrying on its own reconnect timer either way, and
    /// `disconnect` abandons it.
    pub async fn connect(
        &mut self,
        credential: &str,
        identity: GuestId,
        on_message: MessageCallback,
    ) -> Result<(), ChatError> {
        if credential.is_empty() {
            return Err(ChatError::NoCredential);
        }

        {
            let mut state = self.lock_state();
            match *state {
                LinkState::Connecting => return Err(ChatError::AlreadyConnecting),
                LinkState::Connected => return Err(ChatError::AlreadyConnected),
                LinkState::Idle | LinkState::Errored => *state = LinkState::Connecting,
            }
        }

        // Abandon any previous attempt before opening a new transport: the
        // old dispatch task shares the state cell and must not outlive it.
        if let Some(old_cmd_tx) = self.cmd_tx.take() {
            let _ = old_cmd_tx.try_send(BrokerCommand::Shutdown);
        }
        if let Some(old_dispatch) = self.dispatch.take() {
            old_dispatch.abort();
        }

        let url = broker_url(&self.config.ws_base, credential);
        let broker_config = BrokerConfig::new(url, host_of(&self.config.ws_base));
        let (cmd_tx, mut notif_rx) = spawn_broker(broker_config);

        // Outcome of the first handshake attempt.
        let ready = loop {
            match notif_rx.recv().await {
                Some(BrokerNotification::Connected) => break Ok(()),
                Some(BrokerNotification::TransportError { message }) => {
                    break Err(ChatError::Handshake(message))
                }
                Some(_) => continue,
                None => break Err(ChatError::Handshake("broker task ended".to_string())),
            }
        };

        *self.lock_state() = match ready {
            Ok(()) => LinkState::Connected,
            Err(_) => LinkState::Errored,
        };

        let state = Arc::clone(&self.state);
        self.dispatch = Some(tokio::spawn(dispatch_loop(notif_rx, state, on_message)));
        self.cmd_tx = Some(cmd_tx);
        self.identity = Some(identity);

        match &ready {
            Ok(()) => info!(guest = %identity.short(), "guest chat connected"),
            Err(e) => warn!(error = %e, "guest chat connect failed"),
        }
        ready
    }

    /// Publish one chat line. Valid only in the Connected state; anywhere
    /// else this is an observable no-op (`NotConnected`, nothing sent).
    pub async fn send_message(
        &self,
        text: &str,
        conversation: &ConversationId,
    ) -> Result<(), ChatError> {
        if !self.is_connected() {
            return Err(ChatError::NotConnected);
        }
        let identity = self.identity.ok_or(ChatError::NotConnected)?;
        let cmd_tx = self.cmd_tx.as_ref().ok_or(ChatError::NotConnected)?;

        let message = ChatMessage::outbound(text, conversation, identity);
        publish_chat_message(cmd_tx, &message, SEND_DESTINATION)
            .await
            .map_err(|e| ChatError::Publish(e.to_string()))?;

        debug!(message_id = ?message.message_id, "chat message published");
        Ok(())
    }

    /// Tear down the connection, drop the callback, release both
    /// subscriptions. Safe to call from any state, any number of times.
    pub fn disconnect(&mut self) {
        let was_active = self.cmd_tx.is_some();

        if let Some(cmd_tx) = self.cmd_tx.take() {
            let _ = cmd_tx.try_send(BrokerCommand::Shutdown);
        }
        if let Some(handle) = self.dispatch.take() {
            handle.abort();
        }
        self.identity = None;
        *self.lock_state() = LinkState::Idle;

        if was_active {
            info!("guest chat disconnected");
        }
    }

    /// Pure, non-blocking predicate for the current transport state.
    pub fn is_connected(&self) -> bool {
        *self.lock_state() == LinkState::Connected
    }

    pub fn state(&self) -> LinkState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, LinkState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for GuestChatClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Forward broker notifications to the registered callback and keep the
/// shared state in step with the transport.
async fn dispatch_loop(
    mut notif_rx: mpsc::Receiver<BrokerNotification>,
    state: Arc<Mutex<LinkState>>,
    on_message: MessageCallback,
) {
    while let Some(notif) = notif_rx.recv().await {
        match notif {
            BrokerNotification::Connected => {
                set_state(&state, LinkState::Connected);
                info!("broker session ready");
            }
            BrokerNotification::MessageReceived { destination, body } => {
                if let Some(message) = decode_inbound(&destination, &body) {
                    on_message(message);
                }
            }
            BrokerNotification::ProtocolError { message, detail } => {
                error!(message = %message, detail = %detail, "broker error frame");
            }
            BrokerNotification::TransportError { message } => {
                warn!(message = %message, "transport error");
                set_state(&state, LinkState::Errored);
            }
            BrokerNotification::Disconnected => {
                set_state(&state, LinkState::Errored);
            }
        }
    }
    debug!("dispatch loop ended");
}

fn set_state(state: &Mutex<LinkState>, to: LinkState) {
    match state.lock() {
        Ok(mut guard) => *guard = to,
        Err(poisoned) => *poisoned.into_inner() = to,
    }
}
