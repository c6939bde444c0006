//! # card-tally
//!
//! Per-channel suit symbol tallies for chat messages.
//!
//! The tally bot answers one question:
//!
//! > Which card symbols has this channel announced so far, counting every
//! > finalized message exactly once?
//!
//! ## Core Contract
//!
//! 1. Classify each message as ignore, defer (still in progress) or process
//! 2. Count `❤️ ♦️ ♣️ ♠️` inside the first parenthesized group only
//! 3. Add the counts to that channel's durable totals and reply with them
//!
//! ## Architecture
//!
//! ```text
//! Transport → InboundEvent → Dispatcher → Classifier → CounterStore
//!                                 ↓            ↓
//!                           Transport reply  DedupeLedger
//!                                              ↓
//!                                   DurableStorage (file or memory)
//! ```
//!
//! ## Dedupe Guarantees
//!
//! - A `#n<digits>` sequence number is counted once per channel
//! - Edits of a finalized message are reprocessed and added again
//! - Messages carrying progress markers wait for their final version
//! - Resetting a channel clears its counters and ledger entries together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod store;
pub mod counter;
pub mod ledger;
pub mod classifier;
pub mod format;
pub mod status;
pub mod config;
pub mod metrics;
pub mod transport;
pub mod dispatcher;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{ChannelId, EventKind, InboundEvent, MessageRecord, Suit, Surface, SymbolCounts};
pub use store::{DurableStorage, FileStorage, InMemoryStorage, StorageError};
pub use counter::CounterStore;
pub use ledger::{DedupeLedger, SequenceNumber};
pub use classifier::{count_symbols, first_group, Classifier, IgnoreReason, MarkerSet, Verdict};
pub use format::{format_counts, DisplayStyle, UnknownStyle};
pub use status::{BotStatus, StatusFile};
pub use config::{ConfigError, TallyConfig, TransportMode};
pub use transport::{RecordingTransport, Transport, TransportError};
#[cfg(feature = "telegram")]
pub use transport::{TelegramClient, TelegramConfig};
pub use dispatcher::{Command, Dispatcher, Outcome, ResetOutcome};
