//! Suit symbols and per-channel symbol counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical heart glyph (U+2764 + VS16).
pub const HEART: &str = "\u{2764}\u{FE0F}";
/// Alternate heart glyph (U+2665 + VS16), counted as [`HEART`].
pub const HEART_ALT: &str = "\u{2665}\u{FE0F}";
/// Diamond glyph (U+2666 + VS16).
pub const DIAMOND: &str = "\u{2666}\u{FE0F}";
/// Club glyph (U+2663 + VS16).
pub const CLUB: &str = "\u{2663}\u{FE0F}";
/// Spade glyph (U+2660 + VS16).
pub const SPADE: &str = "\u{2660}\u{FE0F}";

/// One of the four tracked card suits.
///
/// Ordering follows the display order: hearts, diamonds, clubs, spades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    /// ❤️ (also matches ♥️).
    Hearts,
    /// ♦️
    Diamonds,
    /// ♣️
    Clubs,
    /// ♠️
    Spades,
}

impl Suit {
    /// All suits in display order.
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// Canonical glyph used as the storage key and in replies.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Hearts => HEART,
            Self::Diamonds => DIAMOND,
            Self::Clubs => CLUB,
            Self::Spades => SPADE,
        }
    }

    /// Every glyph variant that counts toward this suit.
    pub fn variants(&self) -> &'static [&'static str] {
        match self {
            Self::Hearts => &[HEART, HEART_ALT],
            Self::Diamonds => &[DIAMOND],
            Self::Clubs => &[CLUB],
            Self::Spades => &[SPADE],
        }
    }

    /// French display name.
    pub fn name_fr(&self) -> &'static str {
        match self {
            Self::Hearts => "Cœurs",
            Self::Diamonds => "Carreaux",
            Self::Clubs => "Trèfles",
            Self::Spades => "Piques",
        }
    }

    /// Look up a suit by its canonical glyph or one of its variants.
    pub fn from_glyph(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|suit| suit.variants().contains(&s))
    }

    fn index(&self) -> usize {
        match self {
            Self::Hearts => 0,
            Self::Diamonds => 1,
            Self::Clubs => 2,
            Self::Spades => 3,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

/// Count per suit.
///
/// Always holds all four suits. Serialized as a JSON object keyed by the
/// canonical glyph: `{"❤️": 0, "♦️": 0, "♣️": 0, "♠️": 0}`. Missing keys
/// deserialize as zero and unknown keys are dropped, so a stored record can
/// never come back partially populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u64>", into = "BTreeMap<String, u64>")]
pub struct SymbolCounts {
    counts: [u64; 4],
}

impl SymbolCounts {
    /// All-zero counts.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Get the count for a suit.
    pub fn get(&self, suit: Suit) -> u64 {
        self.counts[suit.index()]
    }

    /// Set the count for a suit.
    pub fn set(&mut self, suit: Suit, value: u64) {
        self.counts[suit.index()] = value;
    }

    /// Add `amount` to a suit, saturating at `u64::MAX`.
    pub fn add(&mut self, suit: Suit, amount: u64) {
        let slot = &mut self.counts[suit.index()];
        *slot = slot.saturating_add(amount);
    }

    /// Sum over all suits.
    pub fn total(&self) -> u64 {
        self.counts.iter().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    /// Whether every suit is zero.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|c| *c == 0)
    }

    /// Iterate `(suit, count)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Suit, u64)> + '_ {
        Suit::ALL.into_iter().map(move |suit| (suit, self.get(suit)))
    }

    /// Iterate only the suits with a non-zero count.
    pub fn non_zero(&self) -> impl Iterator<Item = (Suit, u64)> + '_ {
        self.iter().filter(|(_, count)| *count > 0)
    }
}

impl From<BTreeMap<String, u64>> for SymbolCounts {
    fn from(map: BTreeMap<String, u64>) -> Self {
        let mut counts = Self::zero();
        for (key, value) in map {
            match Suit::from_glyph(&key) {
                Some(suit) => counts.add(suit, value),
                None => tracing::debug!(key = %key, "Dropping unknown symbol key"),
            }
        }
        counts
    }
}

impl From<SymbolCounts> for BTreeMap<String, u64> {
    fn from(counts: SymbolCounts) -> Self {
        counts
            .iter()
            .map(|(suit, count)| (suit.glyph().to_string(), count))
            .collect()
    }
}

impl fmt::Display for SymbolCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .non_zero()
            .map(|(suit, count)| format!("{}:{}", suit, count))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_zero() {
        let counts = SymbolCounts::zero();
        for suit in Suit::ALL {
            assert_eq!(counts.get(suit), 0);
        }
        assert!(counts.is_empty());
    }

    #[test]
    fn test_serializes_with_all_four_glyph_keys() {
        let mut counts = SymbolCounts::zero();
        counts.add(Suit::Hearts, 3);

        let value = serde_json::to_value(counts).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["❤️"], 3);
        assert_eq!(obj["♦️"], 0);
        assert_eq!(obj["♣️"], 0);
        assert_eq!(obj["♠️"], 0);
    }

    #[test]
    fn test_partial_record_fills_missing_suits() {
        let counts: SymbolCounts = serde_json::from_str(r#"{"♠️": 7}"#).unwrap();
        assert_eq!(counts.get(Suit::Spades), 7);
        assert_eq!(counts.get(Suit::Hearts), 0);
        assert_eq!(counts.total(), 7);
    }

    #[test]
    fn test_alternate_heart_key_folds_into_hearts() {
        let counts: SymbolCounts =
            serde_json::from_str(r#"{"❤️": 1, "♥️": 2}"#).unwrap();
        assert_eq!(counts.get(Suit::Hearts), 3);
    }

    #[test]
    fn test_negative_values_are_rejected() {
        let result: Result<SymbolCounts, _> = serde_json::from_str(r#"{"❤️": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_glyph_requires_variation_selector() {
        assert_eq!(Suit::from_glyph("♦️"), Some(Suit::Diamonds));
        assert_eq!(Suit::from_glyph("\u{2666}"), None);
    }
}
