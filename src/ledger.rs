//! Dedupe ledger of finalized (channel, sequence number) pairs.
//!
//! The whole ledger is one durable record, `processed_messages`, holding a
//! flat JSON array of `"<channel>_<seq>"` strings. It is loaded once when
//! the ledger is opened and rewritten after every change.
//!
//! Entries never expire; they are removed only when their channel is reset.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::store::DurableStorage;
use crate::types::ChannelId;

/// Storage key of the ledger record.
pub const LEDGER_KEY: &str = "processed_messages";

/// Sequence number embedded in message text via a `#n<digits>` tag.
pub type SequenceNumber = u64;

/// Encode one ledger entry.
pub fn entry_key(channel: ChannelId, seq: SequenceNumber) -> String {
    format!("{}_{}", channel, seq)
}

/// Decode one ledger entry. The channel may be negative, so the split is on
/// the last underscore.
pub fn parse_entry_key(entry: &str) -> Option<(ChannelId, SequenceNumber)> {
    let (channel, seq) = entry.rsplit_once('_')?;
    let channel = ChannelId::from_str(channel).ok()?;
    let seq = seq.parse().ok()?;
    Some((channel, seq))
}

/// Durable set of processed sequence numbers, partitioned by channel.
pub struct DedupeLedger {
    storage: Arc<dyn DurableStorage>,
    entries: Mutex<BTreeMap<ChannelId, BTreeSet<SequenceNumber>>>,
}

impl DedupeLedger {
    /// Open the ledger, loading any persisted entries.
    ///
    /// A missing record yields an empty ledger. A corrupt record is logged
    /// and also yields an empty ledger; it is overwritten on the next write.
    pub fn open(storage: Arc<dyn DurableStorage>) -> Self {
        let entries = Self::load(storage.as_ref());
        Self {
            storage,
            entries: Mutex::new(entries),
        }
    }

    /// Whether `(channel, seq)` has been finalized.
    pub fn is_processed(&self, channel: ChannelId, seq: SequenceNumber) -> bool {
        self.entries
            .lock()
            .get(&channel)
            .is_some_and(|set| set.contains(&seq))
    }

    /// Record `(channel, seq)` as finalized.
    ///
    /// Returns `true` when the entry is new. Re-marking an existing entry
    /// changes nothing and skips the write.
    pub fn mark_processed(&self, channel: ChannelId, seq: SequenceNumber) -> bool {
        let mut entries = self.entries.lock();
        let inserted = entries.entry(channel).or_default().insert(seq);
        if inserted {
            self.persist(&entries);
            debug!(channel = %channel, sequence = seq, "Sequence marked processed");
        }
        inserted
    }

    /// Remove every entry for `channel`. Returns how many were removed.
    pub fn clear_channel(&self, channel: ChannelId) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.remove(&channel).map(|set| set.len()).unwrap_or(0);
        self.persist(&entries);
        debug!(channel = %channel, removed, "Ledger cleared for channel");
        removed
    }

    /// Total number of tracked entries across all channels.
    pub fn count(&self) -> usize {
        self.entries.lock().values().map(BTreeSet::len).sum()
    }

    /// Number of tracked entries for one channel.
    pub fn count_for(&self, channel: ChannelId) -> usize {
        self.entries.lock().get(&channel).map(BTreeSet::len).unwrap_or(0)
    }

    fn load(storage: &dyn DurableStorage) -> BTreeMap<ChannelId, BTreeSet<SequenceNumber>> {
        let mut entries: BTreeMap<ChannelId, BTreeSet<SequenceNumber>> = BTreeMap::new();

        let value = match storage.load(LEDGER_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => return entries,
            Err(e) => {
                warn!(error = %e, "Unreadable dedupe ledger, starting empty");
                return entries;
            }
        };

        let Value::Array(items) = value else {
            warn!("Dedupe ledger is not a list, starting empty");
            return entries;
        };

        let mut skipped = 0usize;
        for item in items {
            match item.as_str().and_then(parse_entry_key) {
                Some((channel, seq)) => {
                    entries.entry(channel).or_default().insert(seq);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "Skipped malformed dedupe ledger entries");
        }
        entries
    }

    fn persist(&self, entries: &BTreeMap<ChannelId, BTreeSet<SequenceNumber>>) {
        let flat: Vec<Value> = entries
            .iter()
            .flat_map(|(channel, seqs)| {
                seqs.iter().map(move |seq| Value::String(entry_key(*channel, *seq)))
            })
            .collect();

        if let Err(e) = self.storage.save(LEDGER_KEY, &Value::Array(flat)) {
            error!(error = %e, "Failed to persist dedupe ledger");
        }
    }
}

impl std::fmt::Debug for DedupeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupeLedger")
            .field("entries", &self.count())
            .finish()
    }
}
