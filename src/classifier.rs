//! Message classification: decide whether a message is counted.
//!
//! ## Decision order
//!
//! ```text
//! no text ─────────────────────────────────────────────→ Ignore
//! no #n tag ── first (...) group? ── no ───────────────→ Ignore
//!                                 └─ yes ──────────────→ Process(content, None)
//! #n tag ──── progress marker without confirmation ────→ Defer
//!         └── already processed and not an edit ───────→ Ignore
//!         └── mark processed ── first (...) group? no ─→ Ignore
//!                                              └─ yes ─→ Process(content, Some(n))
//! ```
//!
//! Un-numbered messages bypass the ledger entirely and are always counted.
//! Only the first parenthesized group without nested parentheses is ever
//! read; later groups are ignored.
//!
//! An edit of an already-processed message is counted again in full. The
//! earlier tally is not subtracted.

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::{debug, info, warn};

use crate::ledger::{DedupeLedger, SequenceNumber};
use crate::types::{MessageRecord, Suit, SymbolCounts};

/// Glyphs marking a numbered message as still in progress.
pub const PROGRESS_MARKERS: [&str; 4] = ["\u{23F0}", "\u{25B6}", "\u{1F550}", "\u{27A1}\u{FE0F}"];

/// Glyphs marking a numbered message as final.
pub const CONFIRMATION_MARKERS: [&str; 2] = ["\u{2705}", "\u{1F530}"];

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"#n(\d+)").unwrap())
}

fn group_pattern() -> &'static Regex {
    static GROUP: OnceLock<Regex> = OnceLock::new();
    GROUP.get_or_init(|| Regex::new(r"\(([^()]*)\)").unwrap())
}

/// Why a message was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Event carried no text.
    NoText,
    /// No parenthesized group in the text.
    NoGroup,
    /// Numbered message already finalized and this is not an edit.
    Duplicate,
    /// `#n` digits do not fit a sequence number.
    SequenceOverflow,
}

impl IgnoreReason {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoText => "no_text",
            Self::NoGroup => "no_group",
            Self::Duplicate => "duplicate",
            Self::SequenceOverflow => "sequence_overflow",
        }
    }
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Do nothing.
    Ignore(IgnoreReason),
    /// Numbered message still in progress; wait for a final delivery.
    Defer {
        /// Sequence number of the pending message.
        sequence: SequenceNumber,
    },
    /// Count the symbols in `content`.
    Process {
        /// Interior of the first parenthesized group.
        content: String,
        /// Sequence number, when the message carried one.
        sequence: Option<SequenceNumber>,
    },
}

impl Verdict {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignore(reason) => reason.as_str(),
            Self::Defer { .. } => "defer",
            Self::Process { .. } => "process",
        }
    }
}

/// Marker glyph sets separating in-flight updates from final messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSet {
    /// Any of these means "still in progress".
    pub progress: Vec<String>,
    /// Any of these means "final", overriding progress markers.
    pub confirmation: Vec<String>,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            progress: PROGRESS_MARKERS.iter().map(|s| s.to_string()).collect(),
            confirmation: CONFIRMATION_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl MarkerSet {
    /// Whether the text contains any progress marker.
    pub fn has_progress(&self, text: &str) -> bool {
        self.progress.iter().any(|m| text.contains(m.as_str()))
    }

    /// Whether the text contains any confirmation marker.
    pub fn has_confirmation(&self, text: &str) -> bool {
        self.confirmation.iter().any(|m| text.contains(m.as_str()))
    }

    /// In progress and not yet confirmed.
    pub fn is_pending(&self, text: &str) -> bool {
        self.has_progress(text) && !self.has_confirmation(text)
    }
}

/// Message classifier.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    markers: MarkerSet,
}

impl Classifier {
    /// Classifier with the default marker sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier with custom marker sets.
    pub fn with_markers(markers: MarkerSet) -> Self {
        Self { markers }
    }

    /// Marker sets in use.
    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Classify a message, marking numbered messages in the ledger when they
    /// proceed past the duplicate check.
    pub fn classify(&self, record: &MessageRecord, ledger: &DedupeLedger) -> Verdict {
        let Some(text) = record.text() else {
            return Verdict::Ignore(IgnoreReason::NoText);
        };
        let channel = record.channel;

        let sequence = match sequence_tag(text) {
            None => {
                return match first_group(text) {
                    Some(content) => Verdict::Process {
                        content: content.to_string(),
                        sequence: None,
                    },
                    None => Verdict::Ignore(IgnoreReason::NoGroup),
                };
            }
            Some(Err(digits)) => {
                warn!(channel = %channel, digits = %digits, "Sequence number out of range");
                return Verdict::Ignore(IgnoreReason::SequenceOverflow);
            }
            Some(Ok(seq)) => seq,
        };

        if self.markers.is_pending(text) {
            info!(channel = %channel, sequence, "Progress markers present, waiting for final version");
            return Verdict::Defer { sequence };
        }

        if ledger.is_processed(channel, sequence) {
            if !record.is_edit() {
                info!(channel = %channel, sequence, "Already processed and not edited, skipping");
                return Verdict::Ignore(IgnoreReason::Duplicate);
            }
            info!(channel = %channel, sequence, "Processed message was edited, reprocessing");
        }

        ledger.mark_processed(channel, sequence);

        match first_group(text) {
            Some(content) => Verdict::Process {
                content: content.to_string(),
                sequence: Some(sequence),
            },
            None => {
                debug!(channel = %channel, sequence, "Numbered message has no group");
                Verdict::Ignore(IgnoreReason::NoGroup)
            }
        }
    }
}

/// Find the `#n<digits>` tag.
///
/// `None` when absent; `Some(Err(digits))` when the digits overflow a
/// sequence number.
pub fn sequence_tag(text: &str) -> Option<Result<SequenceNumber, String>> {
    let caps = tag_pattern().captures(text)?;
    let digits = caps.get(1)?.as_str();
    Some(digits.parse().map_err(|_| digits.to_string()))
}

/// Interior of the first parenthesized group that contains no nested
/// parentheses.
pub fn first_group(text: &str) -> Option<&str> {
    group_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Count suit glyphs in `content`, folding heart variants together.
pub fn count_symbols(content: &str) -> SymbolCounts {
    let mut counts = SymbolCounts::zero();
    for suit in Suit::ALL {
        let n: usize = suit
            .variants()
            .iter()
            .map(|glyph| content.matches(glyph).count())
            .sum();
        if n > 0 {
            counts.add(suit, n as u64);
        }
    }
    counts
}
