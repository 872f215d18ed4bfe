//! # holler-shared
//!
//! Domain types and protocol constants shared by every Holler crate: the
//! canonical [`ChatMessage`] wire record, guest/conversation identifiers,
//! and the well-known broker destinations and timing constants.

pub mod constants;
pub mod protocol;
pub mod types;

pub use protocol::ChatMessage;
pub use types::{ConversationId, GuestId, SenderRole};
