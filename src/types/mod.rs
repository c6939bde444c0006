//! Core types for the tally pipeline.

pub mod channel;
pub mod symbol;
pub mod message;

pub use channel::ChannelId;
pub use symbol::{Suit, SymbolCounts, HEART, HEART_ALT, DIAMOND, CLUB, SPADE};
pub use message::{EventKind, InboundEvent, MessageRecord, Surface};
