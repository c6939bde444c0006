//! Log-based metrics for the tally pipeline.
//!
//! ## Metrics Exposed
//!
//! - `classification` - one event per classified message, by verdict
//! - `tally` - symbols counted per processed message
//! - `reply` - reply send results
//!
//! Events go to the `card_tally::metrics` target so they can be aggregated
//! from logs.

use tracing::info;

use crate::types::{ChannelId, SymbolCounts};

/// Record one classification verdict.
pub fn record_classification(channel: ChannelId, verdict: &str, is_edit: bool) {
    info!(
        target: "card_tally::metrics",
        metric_type = "classification",
        channel = %channel,
        verdict = verdict,
        is_edit = is_edit,
        "classification_metric"
    );
}

/// Record the symbols applied for one message.
pub fn record_tally(channel: ChannelId, delta: &SymbolCounts) {
    info!(
        target: "card_tally::metrics",
        metric_type = "tally",
        channel = %channel,
        symbols = delta.total(),
        "tally_metric"
    );
}

/// Record a reply send result.
pub fn record_reply(channel: ChannelId, success: bool, rate_limited: bool) {
    let result = match (success, rate_limited) {
        (true, _) => "sent",
        (false, true) => "rate_limited",
        (false, false) => "failed",
    };
    info!(
        target: "card_tally::metrics",
        metric_type = "reply",
        channel = %channel,
        result = result,
        "reply_metric"
    );
}
