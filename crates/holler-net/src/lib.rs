// Publish/subscribe transport: STOMP 1.2 over a websocket.

pub mod broker;
pub mod messages;
pub mod stomp;

pub use broker::{
    broker_url, spawn_broker, BrokerCommand, BrokerConfig, BrokerNotification,
};
pub use messages::{decode_inbound, publish_chat_message};
pub use stomp::{Command, Frame, StompError};
