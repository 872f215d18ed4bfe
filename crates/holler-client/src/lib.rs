//! # holler-client
//!
//! The guest chat client: owns exactly one broker connection's lifecycle
//! and mediates message flow between the transport and a single UI-supplied
//! callback. The UI-local pieces live alongside it: [`DisplayMessage`]
//! derivation, the streaming-reveal helper, and the headless chat panel
//! model the widget renders from.

pub mod client;
pub mod display;
pub mod reveal;
pub mod widget;

pub use client::{ChatConfig, ChatError, GuestChatClient, LinkState, MessageCallback};
pub use display::DisplayMessage;
pub use reveal::reveal_steps;
pub use widget::{ChatPanel, PanelStatus};
