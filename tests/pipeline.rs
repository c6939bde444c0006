//! End-to-end tests over file-backed storage.
//!
//! These tests drive the dispatcher the way the service does and check that
//! counters and ledger entries survive a restart.

use std::sync::Arc;

use card_tally::store::{DurableStorage, FileStorage};
use card_tally::transport::update::Update;
use card_tally::{
    ChannelId, CounterStore, DedupeLedger, Dispatcher, EventKind, IgnoreReason, MessageRecord,
    Outcome, RecordingTransport, Suit, Surface,
};
use tempfile::TempDir;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn open(dir: &TempDir) -> (Dispatcher<RecordingTransport>, Arc<RecordingTransport>) {
    let storage: Arc<dyn DurableStorage> = Arc::new(FileStorage::open(dir.path()).unwrap());
    let transport = Arc::new(RecordingTransport::new());
    (Dispatcher::open(storage, Arc::clone(&transport)), transport)
}

fn post(channel: i64, text: &str) -> MessageRecord {
    MessageRecord::new(
        ChannelId::new(channel),
        Some(text.to_string()),
        EventKind::New(Surface::Broadcast),
    )
}

fn edit(channel: i64, text: &str) -> MessageRecord {
    MessageRecord::new(
        ChannelId::new(channel),
        Some(text.to_string()),
        EventKind::Edited(Surface::Broadcast),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Durability
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn counters_and_ledger_survive_restart() {
    let dir = TempDir::new().unwrap();
    let chan = ChannelId::new(-1001);

    {
        let (d, _) = open(&dir);
        d.handle_message(post(-1001, "Tirage #n5 (❤️❤️♦️)")).await;
        d.handle_message(post(-1001, "Tirage #n6 (♠️)")).await;
    }

    let (d, transport) = open(&dir);
    let totals = d.counters().get(chan);
    assert_eq!(totals.get(Suit::Hearts), 2);
    assert_eq!(totals.get(Suit::Diamonds), 1);
    assert_eq!(totals.get(Suit::Spades), 1);

    let again = d.handle_message(post(-1001, "Tirage #n5 (❤️❤️♦️)")).await;
    assert_eq!(again, Outcome::Ignored(IgnoreReason::Duplicate));
    assert!(transport.sent().is_empty());
    assert_eq!(d.messages_processed(), 2);
}

#[tokio::test]
async fn reset_is_durable_and_scoped() {
    let dir = TempDir::new().unwrap();
    let a = ChannelId::new(-1);
    let b = ChannelId::new(-2);

    {
        let (d, _) = open(&dir);
        d.handle_message(post(-1, "#n1 (❤️)")).await;
        d.handle_message(post(-2, "#n1 (♣️)")).await;
        d.reset_channel(a, None).await;
    }

    let storage: Arc<dyn DurableStorage> = Arc::new(FileStorage::open(dir.path()).unwrap());
    let counters = CounterStore::new(Arc::clone(&storage));
    let ledger = DedupeLedger::open(storage);

    assert!(counters.get(a).is_empty());
    assert_eq!(counters.get(b).get(Suit::Clubs), 1);
    assert!(!ledger.is_processed(a, 1));
    assert!(ledger.is_processed(b, 1));
}

#[tokio::test]
async fn negative_channel_ids_keep_their_sign() {
    let dir = TempDir::new().unwrap();
    {
        let (d, _) = open(&dir);
        d.handle_message(post(-42, "(♦️)")).await;
        d.handle_message(post(42, "(♠️)")).await;
    }

    assert!(dir.path().join("counters_-42.json").exists());
    assert!(dir.path().join("counters_42.json").exists());

    let (d, _) = open(&dir);
    assert_eq!(d.counters().get(ChannelId::new(-42)).get(Suit::Diamonds), 1);
    assert_eq!(d.counters().get(ChannelId::new(42)).get(Suit::Spades), 1);
    assert_eq!(d.counters().channels().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Message lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn numbered_message_lifecycle() {
    let dir = TempDir::new().unwrap();
    let (d, transport) = open(&dir);
    let chan = ChannelId::new(-1001);

    // In progress: nothing happens.
    let first = d.handle_message(post(-1001, "#n12 ⏰ en cours (❤️)")).await;
    assert_eq!(first, Outcome::Deferred { sequence: 12 });

    // Still in progress after an edit.
    let second = d.handle_message(edit(-1001, "#n12 ▶ en cours (❤️♦️)")).await;
    assert_eq!(second, Outcome::Deferred { sequence: 12 });
    assert!(d.counters().get(chan).is_empty());

    // Final version.
    let third = d.handle_message(edit(-1001, "#n12 ✅ ⏰ (❤️♦️♣️)")).await;
    assert!(matches!(third, Outcome::Counted { .. }));
    assert_eq!(d.counters().get(chan).total(), 3);
    assert_eq!(transport.sent().len(), 1);

    // Redelivery of the final version as a new message is a duplicate.
    let fourth = d.handle_message(post(-1001, "#n12 ✅ ⏰ (❤️♦️♣️)")).await;
    assert_eq!(fourth, Outcome::Ignored(IgnoreReason::Duplicate));
    assert_eq!(d.counters().get(chan).total(), 3);
}

#[tokio::test]
async fn only_first_group_counts() {
    let dir = TempDir::new().unwrap();
    let (d, _) = open(&dir);
    let chan = ChannelId::new(7);

    d.handle_message(post(7, "(❤️♥️) puis (♠️♠️♠️)")).await;

    let totals = d.counters().get(chan);
    assert_eq!(totals.get(Suit::Hearts), 2);
    assert_eq!(totals.get(Suit::Spades), 0);
}

#[tokio::test]
async fn webhook_payloads_flow_through() {
    let dir = TempDir::new().unwrap();
    let (d, transport) = open(&dir);

    let update: Update = serde_json::from_str(
        r#"{"update_id": 100, "channel_post": {"message_id": 55,
            "chat": {"id": -1009, "type": "channel"},
            "text": "Jeu #n3 (♣️♣️)"}}"#,
    )
    .unwrap();

    let event = update.normalize(Some(1)).unwrap();
    let outcome = d.handle_event(event).await;

    assert!(matches!(outcome, Outcome::Counted { replied: true, .. }));
    let sent = transport.sent_to(ChannelId::new(-1009));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reply_to, Some(55));
    assert!(sent[0].text.contains("♣️: 2"));
}
