use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::MESSAGE_KIND_GUEST;
use crate::types::{ConversationId, GuestId};

/// The canonical chat record exchanged with the broker, JSON-encoded with
/// camelCase field names on the wire.
///
/// Outbound messages are client-filled (fresh message id, sender identity,
/// current timestamps); the server-assigned fields (`server_seq`, and the
/// authoritative timestamps) stay empty. Inbound messages arrive fully
/// populated. A delivered message is never mutated by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-generated for outbound sends, server-assigned otherwise.
    #[serde(default)]
    pub message_id: Option<Uuid>,

    /// Empty string until the server assigns a conversation.
    pub conversation_id: String,

    /// Sender identity (the guest UUID for outbound messages).
    pub user_id: Uuid,

    /// Monotonic server sequence; never set by the client.
    #[serde(default)]
    pub server_seq: Option<i64>,

    /// Root message of the thread this one replies to, if any.
    #[serde(default)]
    pub thread_root_id: Option<Uuid>,

    pub text: String,

    /// Kind tag (`GUEST` for everything this client sends).
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub edited: bool,

    #[serde(default)]
    pub deleted: bool,
}

impl ChatMessage {
    /// Build a fully client-filled outbound message.
    pub fn outbound(text: &str, conversation: &ConversationId, sender: GuestId) -> Self {
        let now = Utc::now();
        Self {
            message_id: Some(Uuid::new_v4()),
            conversation_id: conversation.as_str().to_string(),
            user_id: sender.0,
            server_seq: None,
            thread_root_id: None,
            text: text.to_string(),
            kind: MESSAGE_KIND_GUEST.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            edited: false,
            deleted: false,
        }
    }

    /// Serialize to the wire JSON representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from wire JSON. Unknown fields are ignored; missing
    /// optional fields default to absent/false.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_fills_client_fields() {
        let sender = GuestId::generate();
        let msg = ChatMessage::outbound("hello", &ConversationId::unassigned(), sender);

        assert!(msg.message_id.is_some());
        assert_eq!(msg.user_id, sender.0);
        assert_eq!(msg.conversation_id, "");
        assert_eq!(msg.kind, MESSAGE_KIND_GUEST);
        assert!(msg.server_seq.is_none());
        assert!(msg.thread_root_id.is_none());
        assert!(msg.created_at.is_some());
        assert!(!msg.edited);
        assert!(!msg.deleted);
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let msg = ChatMessage::outbound("hi", &ConversationId::from("c-1"), GuestId::generate());
        let json = msg.to_json().unwrap();

        assert!(json.contains("\"messageId\""));
        assert!(json.contains("\"conversationId\":\"c-1\""));
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"type\":\"GUEST\""));
        assert!(json.contains("\"createdAt\""));
    }

    #[test]
    fn test_round_trip() {
        let msg = ChatMessage::outbound("chào", &ConversationId::unassigned(), GuestId::generate());
        let restored = ChatMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn test_sparse_inbound_payload() {
        // A minimal broker payload: only the required fields present.
        let json = r#"{
            "conversationId": "c-9",
            "userId": "22222222-2222-2222-2222-222222222222",
            "text": "from support"
        }"#;
        let msg = ChatMessage::from_json(json).unwrap();

        assert_eq!(msg.text, "from support");
        assert!(msg.message_id.is_none());
        assert!(msg.server_seq.is_none());
        assert_eq!(msg.kind, "");
        assert!(!msg.deleted);
    }

    #[test]
    fn test_missing_text_is_rejected() {
        let json = r#"{"conversationId": "c-9", "userId": "22222222-2222-2222-2222-222222222222"}"#;
        assert!(ChatMessage::from_json(json).is_err());
    }
}
