//! Update dispatcher: drives classification, counting and replies.
//!
//! ## Flow
//!
//! ```text
//! InboundEvent → command? ──yes──→ /start | /reset | /health
//!                   │
//!                   no
//!                   ↓
//!   [channel lock] Classifier → count_symbols → CounterStore::increment × n
//!                   ↓
//!   [lock released] format totals → Transport::send_reply (best effort)
//! ```
//!
//! All reads and writes of one channel's counters and ledger entries happen
//! under that channel's lock, so concurrent events for the same channel
//! never interleave. Different channels never contend.
//!
//! The reply is sent after the lock is released. A failed send is logged and
//! never rolls back the counters or ledger entries already written.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::classifier::{count_symbols, Classifier, IgnoreReason, Verdict};
use crate::counter::CounterStore;
use crate::format::DisplayStyle;
use crate::ledger::{DedupeLedger, SequenceNumber};
use crate::metrics;
use crate::status::StatusFile;
use crate::store::DurableStorage;
use crate::transport::Transport;
use crate::types::{ChannelId, InboundEvent, MessageRecord, SymbolCounts};

/// Reply to `/start`.
pub const START_TEXT: &str = "🤖 **Bot de Comptage de Cartes** 🃏\n\n\
Bonjour ! Je compte les cartes séparément pour chaque canal.\n\n\
📝 **Comment ça marche :**\n\
• Envoyez un message avec des cartes entre parenthèses\n\
• Exemple : Résultat du tirage (❤️♦️♣️♠️)\n\n\
🎯 **Symboles reconnus :**\n\
❤️ Cœurs • ♦️ Carreaux • ♣️ Trèfles • ♠️ Piques\n\n\
📊 **Compteurs séparés par canal !**\n\
⚡ Bot actif et prêt !";

/// Message posted when the bot joins a chat.
pub const WELCOME_TEXT: &str = "👋 **Salut tout le monde !** 🃏\n\n\
Je suis le **Bot de Comptage de Cartes** !\n\n\
🎯 **Ma mission :**\n\
Compter automatiquement les symboles de cartes dans vos messages entre parenthèses.\n\n\
📊 **Compteurs séparés par canal !**\n\
Chaque canal aura ses propres totaux.\n\n\
🃏 **Cartes reconnues :**\n\
❤️ Cœurs • ♦️ Carreaux • ♣️ Trèfles • ♠️ Piques\n\n\
💡 Commandes :\n\
• /reset - Réinitialiser ce canal\n\
• /start - Aide\n\
• /health - État du bot";

/// Reply to `/reset`.
pub const RESET_TEXT: &str = "✅ Reset effectué pour ce canal";

/// Reply to `/health`.
pub const HEALTH_TEXT: &str = "🟢 Bot is running perfectly!";

/// Operational command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Help text.
    Start,
    /// Reset this channel's counters and ledger.
    Reset,
    /// Liveness reply.
    Health,
}

impl Command {
    /// Parse a leading `/command` or `/command@botname`.
    ///
    /// Unknown commands yield `None` and fall through to classification.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "reset" => Some(Self::Reset),
            "health" => Some(Self::Health),
            _ => None,
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Classified as not countable.
    Ignored(IgnoreReason),
    /// Numbered message still in progress.
    Deferred {
        /// Pending sequence number.
        sequence: SequenceNumber,
    },
    /// Group found but it held no suit symbols.
    NoSymbols,
    /// Symbols were counted.
    Counted {
        /// Amounts added by this message.
        delta: SymbolCounts,
        /// Channel totals after the update.
        totals: SymbolCounts,
        /// Whether the summary reply was delivered.
        replied: bool,
    },
    /// A command ran.
    Command {
        /// Which command.
        command: Command,
        /// Whether the confirmation reply was delivered.
        replied: bool,
    },
    /// Welcome message after joining a chat.
    Welcomed {
        /// Whether the welcome was delivered.
        replied: bool,
    },
}

/// Result of a channel reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    /// Ledger entries removed.
    pub ledger_entries_removed: usize,
    /// Whether the confirmation reply was delivered.
    pub replied: bool,
}

/// Per-channel mutual exclusion.
///
/// One lock per channel ever seen, kept for the life of the process. The map
/// grows with the number of distinct channels, the same bound as the
/// counter records on disk.
#[derive(Debug, Default)]
struct ChannelLocks {
    locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
}

impl ChannelLocks {
    fn for_channel(&self, channel: ChannelId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(channel).or_default())
    }
}

enum Applied {
    Skipped(Outcome),
    Counted {
        delta: SymbolCounts,
        totals: SymbolCounts,
    },
}

/// Canonical dispatcher.
///
/// Owns the counter store and dedupe ledger and sends replies through `T`.
pub struct Dispatcher<T: Transport + ?Sized> {
    counters: Arc<CounterStore>,
    ledger: Arc<DedupeLedger>,
    classifier: Classifier,
    transport: Arc<T>,
    status: Arc<StatusFile>,
    style: RwLock<DisplayStyle>,
    locks: ChannelLocks,
}

impl<T: Transport + ?Sized> Dispatcher<T> {
    /// Create a dispatcher over existing stores.
    pub fn new(counters: CounterStore, ledger: DedupeLedger, transport: Arc<T>) -> Self {
        Self {
            counters: Arc::new(counters),
            ledger: Arc::new(ledger),
            classifier: Classifier::new(),
            transport,
            status: Arc::new(StatusFile::in_memory()),
            style: RwLock::new(DisplayStyle::default()),
            locks: ChannelLocks::default(),
        }
    }

    /// Create a dispatcher whose counters and ledger share one storage
    /// backend.
    pub fn open(storage: Arc<dyn DurableStorage>, transport: Arc<T>) -> Self {
        let counters = CounterStore::new(Arc::clone(&storage));
        let ledger = DedupeLedger::open(storage);
        Self::new(counters, ledger, transport)
    }

    /// Use a custom classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Write status updates to `status`.
    pub fn with_status(mut self, status: Arc<StatusFile>) -> Self {
        self.status = status;
        self
    }

    /// Set the initial display style.
    pub fn with_style(self, style: DisplayStyle) -> Self {
        *self.style.write() = style;
        self
    }

    /// Counter store.
    pub fn counters(&self) -> &CounterStore {
        &self.counters
    }

    /// Dedupe ledger.
    pub fn ledger(&self) -> &DedupeLedger {
        &self.ledger
    }

    /// Status writer.
    pub fn status(&self) -> &StatusFile {
        &self.status
    }

    /// Active display style.
    pub fn style(&self) -> DisplayStyle {
        *self.style.read()
    }

    /// Change the display style for subsequent replies.
    pub fn set_style(&self, style: DisplayStyle) {
        *self.style.write() = style;
        info!(style = style.number(), "Display style changed");
    }

    /// Number of finalized sequence numbers tracked.
    pub fn messages_processed(&self) -> usize {
        self.ledger.count()
    }

    /// Handle one normalized transport event.
    pub async fn handle_event(&self, event: InboundEvent) -> Outcome {
        match event {
            InboundEvent::Message(record) => self.handle_message(record).await,
            InboundEvent::BotAdded { channel } => {
                info!(channel = %channel, "Bot added to chat");
                let replied = self.send(channel, None, WELCOME_TEXT).await;
                self.status.running(format!("Bot added to channel {}", channel));
                Outcome::Welcomed { replied }
            }
        }
    }

    /// Handle one message: commands first, then classification.
    pub async fn handle_message(&self, record: MessageRecord) -> Outcome {
        if !record.is_edit() {
            if let Some(command) = record.text().and_then(Command::parse) {
                return self.run_command(command, &record).await;
            }
        }

        let channel = record.channel;
        if let Some(text) = record.text() {
            let preview: String = text.chars().take(80).collect();
            info!(
                channel = %channel,
                edited = record.is_edit(),
                text = %preview,
                "Message received"
            );
        }

        match self.apply(&record) {
            Applied::Skipped(outcome) => outcome,
            Applied::Counted { delta, totals } => {
                info!(channel = %channel, cards = %delta, "Cards counted");
                metrics::record_tally(channel, &delta);
                self.status.running(format!("Channel {}: {}", channel, delta));

                let reply = self.style().render(&totals);
                let replied = self.send(channel, record.message_id, &reply).await;
                Outcome::Counted {
                    delta,
                    totals,
                    replied,
                }
            }
        }
    }

    /// Reset a channel's counters and ledger entries together, then confirm.
    pub async fn reset_channel(&self, channel: ChannelId, reply_to: Option<i64>) -> ResetOutcome {
        let removed = {
            let lock = self.locks.for_channel(channel);
            let _guard = lock.lock();
            self.counters.reset(channel);
            self.ledger.clear_channel(channel)
        };
        info!(channel = %channel, ledger_entries_removed = removed, "Channel reset");
        self.status.running(format!("Reset completed for channel {}", channel));

        let replied = self.send(channel, reply_to, RESET_TEXT).await;
        ResetOutcome {
            ledger_entries_removed: removed,
            replied,
        }
    }

    /// Classify and count under the channel lock. No awaits in here.
    fn apply(&self, record: &MessageRecord) -> Applied {
        let channel = record.channel;
        let lock = self.locks.for_channel(channel);
        let _guard = lock.lock();

        let verdict = self.classifier.classify(record, &self.ledger);
        metrics::record_classification(channel, verdict.label(), record.is_edit());

        match verdict {
            Verdict::Ignore(reason) => {
                debug!(channel = %channel, reason = reason.as_str(), "Message ignored");
                Applied::Skipped(Outcome::Ignored(reason))
            }
            Verdict::Defer { sequence } => Applied::Skipped(Outcome::Deferred { sequence }),
            Verdict::Process { content, sequence } => {
                debug!(channel = %channel, ?sequence, content = %content, "Processing content");
                let delta = count_symbols(&content);
                if delta.is_empty() {
                    info!(channel = %channel, content = %content, "No card symbols found");
                    return Applied::Skipped(Outcome::NoSymbols);
                }
                for (suit, amount) in delta.non_zero() {
                    self.counters.increment(channel, suit, amount);
                }
                let totals = self.counters.get(channel);
                Applied::Counted { delta, totals }
            }
        }
    }

    async fn run_command(&self, command: Command, record: &MessageRecord) -> Outcome {
        let channel = record.channel;
        info!(channel = %channel, ?command, "Command received");

        let replied = match command {
            Command::Start => {
                let replied = self.send(channel, record.message_id, START_TEXT).await;
                self.status.running(format!("Bot started in channel {}", channel));
                replied
            }
            Command::Reset => self.reset_channel(channel, record.message_id).await.replied,
            Command::Health => {
                let replied = self.send(channel, record.message_id, HEALTH_TEXT).await;
                self.status.running("Health check passed");
                replied
            }
        };
        Outcome::Command { command, replied }
    }

    /// Best-effort send. Failures are logged, never retried.
    async fn send(&self, channel: ChannelId, reply_to: Option<i64>, text: &str) -> bool {
        match self.transport.send_reply(channel, reply_to, text).await {
            Ok(()) => {
                debug!(channel = %channel, "Reply sent");
                metrics::record_reply(channel, true, false);
                true
            }
            Err(e) if e.is_rate_limited() => {
                warn!(channel = %channel, error = %e, "Rate limited, reply dropped");
                metrics::record_reply(channel, false, true);
                false
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Failed to send reply");
                metrics::record_reply(channel, false, false);
                false
            }
        }
    }
}
