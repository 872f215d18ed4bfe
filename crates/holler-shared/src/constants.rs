/// Storage slot holding the durable guest identity (hyphenated UUID).
pub const GUEST_ID_SLOT: &str = "guest_session_uuid";

/// Storage slot holding the guest access credential (opaque bearer token).
pub const GUEST_TOKEN_SLOT: &str = "guest_access_token";

/// Path of the guest session exchange on the auth service.
pub const AUTH_SESSION_PATH: &str = "/guest/session";

/// Path of the broker websocket endpoint.
pub const WS_PATH: &str = "/ws/websocket";

/// Per-guest inbound queue; the broker resolves `/user` to the
/// authenticated principal.
pub const PRIVATE_QUEUE: &str = "/user/queue/messages";

/// Shared broadcast topic every connected guest receives.
pub const BROADCAST_TOPIC: &str = "/topic/messages";

/// Application destination outbound chat sends are published to.
pub const SEND_DESTINATION: &str = "/app/guest/chat";

/// STOMP protocol version spoken with the broker.
pub const STOMP_VERSION: &str = "1.2";

/// Heartbeat the client offers to send, in milliseconds.
pub const HEARTBEAT_OUTGOING_MS: u32 = 4000;

/// Heartbeat the client asks the broker to send, in milliseconds.
pub const HEARTBEAT_INCOMING_MS: u32 = 4000;

/// Fixed delay between transport-level reconnect attempts.
pub const RECONNECT_DELAY_MS: u64 = 5000;

/// Kind tag stamped on every outbound guest message.
pub const MESSAGE_KIND_GUEST: &str = "GUEST";

/// Greeting line the chat panel shows before any connection exists.
pub const GREETING_TEXT: &str = "Hi there! How can we help you today?";

/// Fallback line shown when the session or connection cannot be established.
pub const FALLBACK_TEXT: &str =
    "Could not reach the chat service. Please try again later.";

/// Characters revealed per animation tick.
pub const REVEAL_STEP: usize = 2;

/// Interval between reveal ticks, in milliseconds.
pub const REVEAL_TICK_MS: u64 = 30;
