//! Field extractors: pure mappings from a captured page snapshot to
//! structured records.
//!
//! Extractors never touch the live browser — they see only a `PageSnapshot`
//! and are covered by fixture tests. Selector churn in the source UI is
//! isolated to one variant's selector constants. Missing optional fields
//! become `None`; an unparseable *required* field fails that one record, and
//! the caller drops it and keeps the batch.

mod backlinks;
mod keywords;
mod paid;
mod reviews;
mod traffic;

pub use backlinks::BacklinkExtractor;
pub use keywords::KeywordExtractor;
pub use paid::PaidKeywordExtractor;
pub use reviews::ReviewExtractor;
pub use traffic::TrafficExtractor;

use chrono::{DateTime, Utc};

use crate::core::error::{Result, ScoutError};
use crate::core::types::RecordKey;

/// A page's visible content at one instant — the only thing extractors see.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    pub captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            captured_at: Utc::now(),
        }
    }
}

/// The extraction capability: one concrete variant per data surface.
pub trait Extract {
    type Record: RecordKey + Clone;

    /// Stable name used for logging and screenshot namespacing.
    fn name(&self) -> &'static str;

    /// Map a snapshot to records. `Err` entries are individual records that
    /// failed a required field — never the batch.
    fn extract(&self, snapshot: &PageSnapshot) -> Vec<Result<Self::Record>>;
}

/// Split an extraction batch into kept records and a dropped count,
/// logging each drop. Record-level errors stop here by design.
pub fn partition_records<R>(surface: &'static str, batch: Vec<Result<R>>) -> (Vec<R>, usize) {
    let mut records = Vec::with_capacity(batch.len());
    let mut dropped = 0usize;
    for item in batch {
        match item {
            Ok(r) => records.push(r),
            Err(e) => {
                dropped += 1;
                tracing::warn!("dropping malformed {} record: {}", surface, e);
            }
        }
    }
    (records, dropped)
}

// ── Shared cell-parsing helpers ──────────────────────────────────────────────

/// Parse metric cells like "1,234", "5.3K", "2.1M", "1.2B" into a count.
pub(crate) fn parse_compact_number(raw: &str) -> Option<u64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    let (number_part, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1_000f64),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1_000_000f64),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000f64),
        _ => (cleaned.as_str(), 1f64),
    };
    let value: f64 = number_part.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Parse money cells like "$2.45" / "1,200.00" into an amount.
pub(crate) fn parse_money(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    let value: f64 = cleaned.parse().ok()?;
    (value >= 0.0).then_some(value)
}

/// Parse "45.3%" / "45.3" into a 0..=1 ratio.
pub(crate) fn parse_percent(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('%').trim();
    let value: f64 = cleaned.parse().ok()?;
    Some(value / 100.0)
}

/// Parse "mm:ss" or "hh:mm:ss" visit durations into seconds.
pub(crate) fn parse_duration_secs(raw: &str) -> Option<u64> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    match parts.as_slice() {
        [m, s] => Some(m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?),
        [h, m, s] => Some(
            h.parse::<u64>().ok()? * 3600 + m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?,
        ),
        _ => None,
    }
}

/// Collapse an element's text nodes into one trimmed string.
pub(crate) fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn required<T>(
    surface: &'static str,
    field: &'static str,
    value: Option<T>,
) -> Result<T> {
    value.ok_or_else(|| ScoutError::extraction(surface, format!("missing required field `{}`", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_numbers_cover_suffixes_and_commas() {
        assert_eq!(parse_compact_number("1,234"), Some(1234));
        assert_eq!(parse_compact_number("5.3K"), Some(5300));
        assert_eq!(parse_compact_number("2.1M"), Some(2_100_000));
        assert_eq!(parse_compact_number("1B"), Some(1_000_000_000));
        assert_eq!(parse_compact_number("  42 "), Some(42));
        assert_eq!(parse_compact_number("n/a"), None);
        assert_eq!(parse_compact_number(""), None);
    }

    #[test]
    fn money_cells_strip_currency_markers() {
        assert_eq!(parse_money("$2.45"), Some(2.45));
        assert_eq!(parse_money("1,200.00"), Some(1200.0));
        assert_eq!(parse_money("n/a"), None);
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn percents_and_durations() {
        assert_eq!(parse_percent("45.5%"), Some(0.455));
        assert_eq!(parse_percent("oops"), None);
        assert_eq!(parse_duration_secs("02:30"), Some(150));
        assert_eq!(parse_duration_secs("1:02:03"), Some(3723));
        assert_eq!(parse_duration_secs("150"), None);
    }
}
