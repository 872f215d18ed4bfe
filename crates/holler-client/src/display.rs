use chrono::{DateTime, Utc};

use holler_shared::protocol::ChatMessage;
use holler_shared::types::SenderRole;

/// One rendered chat line. Derived from [`ChatMessage`], never persisted;
/// rebuilt each session. The `streaming` flag exists only for the typing
/// animation and is the one piece of local state overlaid on a delivered
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub role: SenderRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub streaming: bool,
}

impl DisplayMessage {
    /// A line the guest just typed.
    pub fn guest(text: &str) -> Self {
        Self {
            role: SenderRole::Guest,
            text: text.to_string(),
            timestamp: Utc::now(),
            streaming: false,
        }
    }

    /// A support line shown immediately in full.
    pub fn support(text: &str) -> Self {
        Self {
            role: SenderRole::Support,
            text: text.to_string(),
            timestamp: Utc::now(),
            streaming: false,
        }
    }

    /// Derive the rendered line for a broker-delivered message. It starts
    /// in the streaming state; the reveal timer clears the flag once the
    /// full text is shown.
    pub fn from_chat(message: &ChatMessage) -> Self {
        Self {
            role: SenderRole::Support,
            text: message.text.clone(),
            timestamp: message.created_at.unwrap_or_else(Utc::now),
            streaming: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holler_shared::types::{ConversationId, GuestId};

    #[test]
    fn test_from_chat_keeps_text_and_attribution() {
        let chat =
            ChatMessage::outbound("we can help", &ConversationId::unassigned(), GuestId::generate());
        let display = DisplayMessage::from_chat(&chat);

        assert_eq!(display.text, "we can help");
        assert_eq!(display.role, SenderRole::Support);
        assert!(display.streaming);
        assert_eq!(Some(display.timestamp), chat.created_at);
    }

    #[test]
    fn test_guest_line_is_not_streaming() {
        let display = DisplayMessage::guest("hello?");
        assert_eq!(display.role, SenderRole::Guest);
        assert!(!display.streaming);
    }
}
