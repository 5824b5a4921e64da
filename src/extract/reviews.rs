use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::core::error::Result;
use crate::core::types::Review;
use crate::extract::{element_text, required, Extract, PageSnapshot};

const SURFACE: &str = "reviews";

/// Review-card selector generations, newest first. The UI ships obfuscated
/// class names that rotate; `[data-review-id]` has been the most durable.
const CARD_SELECTORS: &[&str] = &[
    "[data-review-id]",
    ".jftiEf",
    "[class*='review'][class*='container']",
];

const RATING_SELECTOR: &str = "[role='img'][aria-label*='star']";
const TEXT_SELECTORS: &[&str] = &[".wiI7pd", "[class*='review-text']", "[data-review-text]"];
const AUTHOR_SELECTORS: &[&str] = &[".d4r55", "[class*='author']"];
const DATE_SELECTORS: &[&str] = &[".rsqaWe", "[class*='review-date']"];

fn rating_digit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)").expect("valid rating regex"))
}

/// Extracts review cards from a Maps reviews pane snapshot.
pub struct ReviewExtractor {
    /// Search query / place the reviews belong to; part of the identity hash.
    pub source_location: String,
    /// Cards with less text than this are UI noise, not reviews.
    pub min_text_len: usize,
}

impl ReviewExtractor {
    pub fn new(source_location: impl Into<String>, min_text_len: usize) -> Self {
        Self {
            source_location: source_location.into(),
            min_text_len,
        }
    }

    fn first_text(card: &scraper::ElementRef<'_>, selectors: &[&str]) -> Option<String> {
        for sel in selectors {
            if let Ok(selector) = Selector::parse(sel) {
                if let Some(element) = card.select(&selector).next() {
                    let text = element_text(&element);
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
        }
        None
    }

    fn parse_rating(card: &scraper::ElementRef<'_>) -> Option<u8> {
        let selector = Selector::parse(RATING_SELECTOR).ok()?;
        let label = card
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("aria-label").map(|s| s.to_string()))?;
        let digit: u8 = rating_digit().captures(&label)?.get(1)?.as_str().parse().ok()?;
        (1..=5).contains(&digit).then_some(digit)
    }

    fn parse_card(&self, snapshot: &PageSnapshot, card: scraper::ElementRef<'_>) -> Result<Review> {
        // Rating is the analysis ground-truth signal — required, 1-5 only.
        let rating = required(SURFACE, "rating", Self::parse_rating(&card))?;

        let text = Self::first_text(&card, TEXT_SELECTORS)
            .unwrap_or_else(|| element_text(&card).chars().take(1000).collect());
        let text = required(
            SURFACE,
            "text",
            (text.len() >= self.min_text_len).then_some(text),
        )?;

        let author = Self::first_text(&card, AUTHOR_SELECTORS)
            .unwrap_or_else(|| "Anonymous".to_string());
        let posted_at = Self::first_text(&card, DATE_SELECTORS);

        Ok(Review {
            review_id: Review::derive_id(&author, &text, &self.source_location),
            source_location: self.source_location.clone(),
            author_hash: Review::hash_author(&author),
            rating,
            text,
            posted_at,
            captured_at: snapshot.captured_at,
        })
    }
}

impl Extract for ReviewExtractor {
    type Record = Review;

    fn name(&self) -> &'static str {
        SURFACE
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Vec<Result<Review>> {
        let document = Html::parse_document(&snapshot.html);

        for card_sel in CARD_SELECTORS {
            if let Ok(selector) = Selector::parse(card_sel) {
                let cards: Vec<_> = document.select(&selector).collect();
                if !cards.is_empty() {
                    return cards
                        .into_iter()
                        .map(|card| self.parse_card(snapshot, card))
                        .collect();
                }
            }
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::partition_records;

    const FIXTURE: &str = r#"
        <div role="main">
          <div data-review-id="a1">
            <div class="d4r55">Pat R.</div>
            <span role="img" aria-label="3 stars"></span>
            <span class="rsqaWe">2 weeks ago</span>
            <span class="wiI7pd">Nice store but the candles barely smell of anything.</span>
          </div>
          <div data-review-id="a2">
            <div class="d4r55">Sam K.</div>
            <span role="img" aria-label="5 stars"></span>
            <span class="wiI7pd">Great service, lovely scents, will come back.</span>
          </div>
          <div data-review-id="broken">
            <div class="d4r55">No Rating Here</div>
            <span class="wiI7pd">This card has text but its rating node is gone.</span>
          </div>
        </div>
    "#;

    fn snapshot() -> PageSnapshot {
        PageSnapshot::new("https://maps.example/test", FIXTURE)
    }

    #[test]
    fn extracts_cards_and_fails_only_the_broken_record() {
        let extractor = ReviewExtractor::new("Wick & Co store New York", 10);
        let batch = extractor.extract(&snapshot());
        assert_eq!(batch.len(), 3);

        let (records, dropped) = partition_records("reviews", batch);
        assert_eq!(records.len(), 2);
        assert_eq!(dropped, 1);

        let first = &records[0];
        assert_eq!(first.rating, 3);
        assert_eq!(first.posted_at.as_deref(), Some("2 weeks ago"));
        assert!(first.text.contains("barely smell"));
        assert_eq!(first.source_location, "Wick & Co store New York");
        // Raw author name never persisted
        assert!(!first.author_hash.contains("Pat"));
    }

    #[test]
    fn missing_optional_date_is_none_not_an_error() {
        let extractor = ReviewExtractor::new("loc", 10);
        let (records, _) = partition_records("reviews", extractor.extract(&snapshot()));
        let sam = records.iter().find(|r| r.rating == 5).unwrap();
        assert!(sam.posted_at.is_none());
    }

    #[test]
    fn short_text_is_noise_and_dropped() {
        let html = r#"
            <div data-review-id="x">
              <span role="img" aria-label="4 stars"></span>
              <span class="wiI7pd">ok</span>
            </div>"#;
        let extractor = ReviewExtractor::new("loc", 10);
        let (records, dropped) =
            partition_records("reviews", extractor.extract(&PageSnapshot::new("u", html)));
        assert!(records.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn identical_cards_map_to_identical_review_ids() {
        let extractor = ReviewExtractor::new("loc", 10);
        let (a, _) = partition_records("reviews", extractor.extract(&snapshot()));
        let (b, _) = partition_records("reviews", extractor.extract(&snapshot()));
        assert_eq!(a[0].review_id, b[0].review_id);
    }

    #[test]
    fn empty_page_yields_empty_batch() {
        let extractor = ReviewExtractor::new("loc", 10);
        assert!(extractor
            .extract(&PageSnapshot::new("u", "<html><body></body></html>"))
            .is_empty());
    }
}
