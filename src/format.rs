//! Reply formatting for counter summaries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Suit, SymbolCounts};

/// Display style for counter replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DisplayStyle {
    /// One `❤️: n` line per suit.
    #[default]
    Vertical,
    /// `❤️ n | ♦️ n | ♣️ n | ♠️ n`
    Horizontal,
    /// French suit names.
    FullNames,
    /// `[❤️ n] [♦️ n] …`
    Brackets,
    /// Grand total followed by each suit.
    Total,
}

/// Style number outside 1–5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unknown display style: {0} (expected 1-5)")]
pub struct UnknownStyle(pub u8);

impl DisplayStyle {
    /// All styles in number order.
    pub const ALL: [DisplayStyle; 5] = [
        DisplayStyle::Vertical,
        DisplayStyle::Horizontal,
        DisplayStyle::FullNames,
        DisplayStyle::Brackets,
        DisplayStyle::Total,
    ];

    /// Look up a style by its 1-based number.
    pub fn from_number(n: u8) -> Result<Self, UnknownStyle> {
        match n {
            1 => Ok(Self::Vertical),
            2 => Ok(Self::Horizontal),
            3 => Ok(Self::FullNames),
            4 => Ok(Self::Brackets),
            5 => Ok(Self::Total),
            other => Err(UnknownStyle(other)),
        }
    }

    /// 1-based style number.
    pub fn number(&self) -> u8 {
        match self {
            Self::Vertical => 1,
            Self::Horizontal => 2,
            Self::FullNames => 3,
            Self::Brackets => 4,
            Self::Total => 5,
        }
    }

    /// Human-readable description (French, shown on the dashboard).
    pub fn description(&self) -> &'static str {
        match self {
            Self::Vertical => "Style vertical simple",
            Self::Horizontal => "Style horizontal avec séparateurs",
            Self::FullNames => "Style avec noms complets",
            Self::Brackets => "Style avec crochets",
            Self::Total => "Style avec total",
        }
    }

    /// Render counts in this style.
    pub fn render(&self, counts: &SymbolCounts) -> String {
        let parts = |f: &dyn Fn(Suit, u64) -> String, sep: &str| -> String {
            counts
                .iter()
                .map(|(suit, n)| f(suit, n))
                .collect::<Vec<_>>()
                .join(sep)
        };

        match self {
            Self::Vertical => parts(&|s, n| format!("{}: {}", s, n), "\n"),
            Self::Horizontal => parts(&|s, n| format!("{} {}", s, n), " | "),
            Self::FullNames => parts(&|s, n| format!("{}: {}", s.name_fr(), n), " - "),
            Self::Brackets => parts(&|s, n| format!("[{} {}]", s, n), " "),
            Self::Total => format!(
                "Total: {} ({})",
                counts.total(),
                parts(&|s, n| format!("{}{}", s, n), " ")
            ),
        }
    }
}

impl TryFrom<u8> for DisplayStyle {
    type Error = UnknownStyle;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_number(n)
    }
}

impl From<DisplayStyle> for u8 {
    fn from(style: DisplayStyle) -> Self {
        style.number()
    }
}

impl fmt::Display for DisplayStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Render counts in `style`.
pub fn format_counts(counts: &SymbolCounts, style: DisplayStyle) -> String {
    style.render(counts)
}
