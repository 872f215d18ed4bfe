use tokio::sync::mpsc;
use tracing::{debug, error};

use holler_shared::protocol::ChatMessage;

use crate::broker::BrokerCommand;

/// JSON-encode a chat message and hand it to the broker task for publishing.
pub async fn publish_chat_message(
    cmd_tx: &mpsc::Sender<BrokerCommand>,
    message: &ChatMessage,
    destination: &str,
) -> anyhow::Result<()> {
    let body = message
        .to_json()
        .map_err(|e| anyhow::anyhow!("Serialization error: {e}"))?;

    debug!(
        destination = %destination,
        bytes = body.len(),
        "publishing chat message"
    );

    cmd_tx
        .send(BrokerCommand::Publish {
            destination: destination.to_string(),
            body,
        })
        .await
        .map_err(|_| anyhow::anyhow!("Broker command channel closed"))?;

    Ok(())
}

/// Decode an inbound payload into a [`ChatMessage`].
///
/// A malformed payload is logged and dropped; it never reaches the caller
/// and never tears down the connection.
pub fn decode_inbound(destination: &str, body: &str) -> Option<ChatMessage> {
    match ChatMessage::from_json(body) {
        Ok(message) => Some(message),
        Err(e) => {
            error!(
                destination = %destination,
                error = %e,
                "dropping malformed inbound payload"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holler_shared::types::{ConversationId, GuestId};

    #[test]
    fn test_decode_valid_payload() {
        let message =
            ChatMessage::outbound("hello", &ConversationId::unassigned(), GuestId::generate());
        let decoded = decode_inbound("/topic/messages", &message.to_json().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_non_json_is_dropped() {
        assert!(decode_inbound("/topic/messages", "definitely not json").is_none());
    }

    #[test]
    fn test_decode_schema_violation_is_dropped() {
        // Valid JSON, wrong shape: userId must be a UUID.
        let body = r#"{"conversationId": "", "userId": 42, "text": "x"}"#;
        assert!(decode_inbound("/user/queue/messages", body).is_none());
    }
}
