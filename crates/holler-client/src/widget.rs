//! Headless state model for the chat widget.
//!
//! Rendering is out of scope here; the panel tracks what any front end
//! needs to draw the widget: the message list, the connection status line,
//! and whether the input is usable. The invariant it enforces is that an
//! outbound send can never be prepared without a live connection — on any
//! failure the input stays disabled and the fallback line is shown.

use holler_shared::constants::{FALLBACK_TEXT, GREETING_TEXT};
use holler_shared::protocol::ChatMessage;
use holler_shared::types::ConversationId;

use crate::display::DisplayMessage;

/// Connection status as the widget presents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    Offline,
    Connecting,
    Online,
}

/// The chat panel's state.
pub struct ChatPanel {
    messages: Vec<DisplayMessage>,
    status: PanelStatus,
    conversation: ConversationId,
}

impl ChatPanel {
    /// A fresh panel: greeting shown, input disabled until connected.
    pub fn new() -> Self {
        Self {
            messages: vec![DisplayMessage::support(GREETING_TEXT)],
            status: PanelStatus::Offline,
            conversation: ConversationId::unassigned(),
        }
    }

    pub fn connect_started(&mut self) {
        self.status = PanelStatus::Connecting;
    }

    pub fn connect_succeeded(&mut self) {
        self.status = PanelStatus::Online;
    }

    /// Session init or connect failed: show the fallback line and keep the
    /// input disabled.
    pub fn connect_failed(&mut self) {
        self.status = PanelStatus::Offline;
        self.messages.push(DisplayMessage::support(FALLBACK_TEXT));
    }

    pub fn disconnected(&mut self) {
        self.status = PanelStatus::Offline;
    }

    pub fn input_enabled(&self) -> bool {
        self.status == PanelStatus::Online
    }

    /// Accept an outbound line: trims it, refuses blank input or any state
    /// where sending could be lost, and appends the guest line to the
    /// transcript. Returns the text to hand to the client, if accepted.
    pub fn prepare_send(&mut self, input: &str) -> Option<String> {
        let text = input.trim();
        if text.is_empty() || !self.input_enabled() {
            return None;
        }
        self.messages.push(DisplayMessage::guest(text));
        Some(text.to_string())
    }

    /// Append a broker-delivered message as a streaming support line.
    pub fn push_inbound(&mut self, message: &ChatMessage) {
        self.messages.push(DisplayMessage::from_chat(message));
    }

    /// Clear the streaming flag once the reveal animation has run out.
    pub fn finish_streaming(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            last.streaming = false;
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self.status {
            PanelStatus::Connecting => "Connecting…",
            PanelStatus::Online => "Online",
            PanelStatus::Offline => "Offline",
        }
    }

    pub fn status(&self) -> PanelStatus {
        self.status
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }
}

impl Default for ChatPanel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holler_shared::types::{GuestId, SenderRole};

    #[test]
    fn test_new_panel_shows_greeting_with_input_disabled() {
        let panel = ChatPanel::new();
        assert_eq!(panel.messages().len(), 1);
        assert_eq!(panel.messages()[0].text, GREETING_TEXT);
        assert!(!panel.input_enabled());
        assert_eq!(panel.status_text(), "Offline");
    }

    #[test]
    fn test_connect_failure_shows_fallback_and_keeps_input_disabled() {
        let mut panel = ChatPanel::new();
        panel.connect_started();
        assert_eq!(panel.status_text(), "Connecting…");

        panel.connect_failed();
        assert!(!panel.input_enabled());
        assert_eq!(panel.messages().last().unwrap().text, FALLBACK_TEXT);
        assert!(panel.prepare_send("hello?").is_none());
    }

    #[test]
    fn test_send_only_while_online() {
        let mut panel = ChatPanel::new();
        assert!(panel.prepare_send("too early").is_none());
        assert_eq!(panel.messages().len(), 1);

        panel.connect_started();
        panel.connect_succeeded();
        let accepted = panel.prepare_send("  hello  ").unwrap();
        assert_eq!(accepted, "hello");
        assert_eq!(panel.messages().last().unwrap().role, SenderRole::Guest);

        panel.disconnected();
        assert!(panel.prepare_send("after drop").is_none());
    }

    #[test]
    fn test_blank_input_is_refused() {
        let mut panel = ChatPanel::new();
        panel.connect_succeeded();
        assert!(panel.prepare_send("   ").is_none());
        assert_eq!(panel.messages().len(), 1);
    }

    #[test]
    fn test_inbound_streams_then_settles() {
        let mut panel = ChatPanel::new();
        panel.connect_succeeded();

        let inbound = ChatMessage::outbound(
            "your order shipped",
            &ConversationId::unassigned(),
            GuestId::generate(),
        );
        panel.push_inbound(&inbound);
        assert!(panel.messages().last().unwrap().streaming);

        panel.finish_streaming();
        assert!(!panel.messages().last().unwrap().streaming);
    }
}
