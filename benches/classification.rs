//! Performance benchmarks for classification and counting.
//!
//! Run with: `cargo bench --bench classification`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Symbol extraction | <5µs | First group only |
//! | Classification | <20µs | Includes ledger lookup |
//! | Counter contention | Linear scaling | Distinct channels per thread |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use card_tally::store::{DurableStorage, InMemoryStorage};
use card_tally::{
    count_symbols, first_group, ChannelId, Classifier, CounterStore, DedupeLedger, EventKind,
    MessageRecord, Suit, Surface,
};

/// A message with `symbols` glyphs in its first group.
fn make_text(seq: u64, symbols: usize) -> String {
    let glyphs = ["❤️", "♦️", "♣️", "♠️"];
    let group: String = (0..symbols).map(|i| glyphs[i % 4]).collect();
    format!("Tirage #n{} ✅ résultat ({}) suite (❤️)", seq, group)
}

fn bench_symbol_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_extraction");

    for symbols in [4usize, 32, 256] {
        let text = make_text(1, symbols);
        group.throughput(Throughput::Elements(symbols as u64));
        group.bench_with_input(BenchmarkId::from_parameter(symbols), &text, |b, text| {
            b.iter(|| {
                let content = first_group(black_box(text)).unwrap_or("");
                black_box(count_symbols(content))
            });
        });
    }

    group.finish();
}

fn bench_classification(c: &mut Criterion) {
    let storage: Arc<dyn DurableStorage> = Arc::new(InMemoryStorage::new());
    let ledger = DedupeLedger::open(storage);
    let classifier = Classifier::new();
    let channel = ChannelId::new(-1001);

    // Pre-populate so duplicates hit the ledger.
    for seq in 0..1_000u64 {
        ledger.mark_processed(channel, seq);
    }

    let duplicate = MessageRecord::new(
        channel,
        Some(make_text(500, 8)),
        EventKind::New(Surface::Broadcast),
    );
    let pending = MessageRecord::new(
        channel,
        Some("#n5000 ⏰ en cours (❤️♦️)".to_string()),
        EventKind::New(Surface::Broadcast),
    );
    let untagged = MessageRecord::new(
        channel,
        Some("résultat (❤️♦️♣️♠️)".to_string()),
        EventKind::New(Surface::Broadcast),
    );

    let mut group = c.benchmark_group("classification");
    group.throughput(Throughput::Elements(1));
    for (name, record) in [("duplicate", &duplicate), ("pending", &pending), ("untagged", &untagged)] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(classifier.classify(black_box(record), &ledger)));
        });
    }
    group.finish();
}

fn bench_counter_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_contention");

    for num_threads in [1usize, 2, 4, 8] {
        let storage: Arc<dyn DurableStorage> = Arc::new(InMemoryStorage::new());
        let counters = Arc::new(CounterStore::new(storage));

        group.throughput(Throughput::Elements(num_threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            &num_threads,
            |b, &n| {
                b.iter(|| {
                    let handles: Vec<_> = (0..n)
                        .map(|i| {
                            let counters = Arc::clone(&counters);
                            thread::spawn(move || {
                                counters.increment(ChannelId::new(i as i64), Suit::Hearts, 1)
                            })
                        })
                        .collect();
                    for h in handles {
                        black_box(h.join().ok());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_symbol_extraction,
    bench_classification,
    bench_counter_contention,
);
criterion_main!(benches);
