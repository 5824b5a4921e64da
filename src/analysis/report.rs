//! Assembles the analysis document and the filtered negative-review export.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::config::AnalysisSettings;
use crate::core::error::{Result, ScoutError};
use crate::core::types::{AnalysisReport, Review, Sentiment, SentimentCounts, Topic};

use super::phrases::key_phrases;
use super::sentiment::score_reviews;
use super::topics::extract_topics;

/// Complaint buckets keyed by the vocabulary reviewers actually use.
/// Matched as substrings; a review can land in several buckets.
const COMPLAINT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "price_value",
        &["expensive", "overpriced", "pricey", "cost", "money", "worth", "value", "rip off"],
    ),
    (
        "customer_service",
        &["rude", "unhelpful", "ignored", "staff", "employee", "service", "attitude", "dismissive"],
    ),
    (
        "product_quality",
        &["quality", "cheap", "broke", "defect", "damage", "poor", "disappointing"],
    ),
    (
        "scent_issues",
        &["smell", "scent", "fragrance", "odor", "throw", "weak scent", "overpowering"],
    ),
    (
        "burn_quality",
        &["burn", "wick", "tunnel", "uneven", "smoke", "soot", "flame"],
    ),
    (
        "longevity",
        &["last", "hour", "burn time", "short", "quick", "duration"],
    ),
    (
        "shipping",
        &["shipping", "package", "box", "arrived", "broken", "damaged", "delivery"],
    ),
    (
        "store_experience",
        &["store", "location", "crowded", "wait", "line", "parking"],
    ),
    (
        "return_refund",
        &["return", "refund", "exchange", "policy", "money back"],
    ),
    (
        "authenticity",
        &["fake", "authentic", "counterfeit", "real", "genuine"],
    ),
];

/// One negative review as exported alongside the report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NegativeReviewExport {
    pub review_id: String,
    pub rating: u8,
    pub score: f64,
    pub text: String,
    pub categories: Vec<String>,
    pub posted_at: Option<String>,
}

#[derive(Debug)]
pub struct AnalysisOutput {
    pub report: AnalysisReport,
    pub negative: Vec<NegativeReviewExport>,
    /// Set when topic clustering was dropped for lack of data; the rest of
    /// the report is still valid.
    pub topics_skipped: Option<String>,
}

/// Pure function of the review set, the settings, and the timestamp: same
/// inputs reproduce the same document bit-for-bit.
pub fn build_report(
    reviews: &[Review],
    settings: &AnalysisSettings,
    generated_at: DateTime<Utc>,
) -> Result<AnalysisOutput> {
    if reviews.is_empty() {
        return Err(ScoutError::Skipped("no reviews to analyze".into()));
    }

    let scored = score_reviews(reviews, settings);
    let mut sentiment_counts = SentimentCounts::default();
    for s in &scored {
        sentiment_counts.tally(s.label);
    }

    let negative: Vec<NegativeReviewExport> = scored
        .iter()
        .filter(|s| s.label == Sentiment::Negative)
        .map(|s| NegativeReviewExport {
            review_id: s.review.review_id.clone(),
            rating: s.review.rating,
            score: s.score,
            text: s.review.text.clone(),
            categories: categorize(&s.review.text),
            posted_at: s.review.posted_at.clone(),
        })
        .collect();

    let (topics, topics_skipped): (Vec<Topic>, _) = match extract_topics(reviews, settings) {
        Ok(topics) => (topics, None),
        Err(ScoutError::InsufficientData(reason)) => {
            warn!("topic clustering skipped: {}", reason);
            (Vec::new(), Some(reason))
        }
        Err(e) => return Err(e),
    };

    let report = AnalysisReport {
        generated_at,
        n_reviews: reviews.len(),
        sentiment_counts,
        topics,
        key_phrases: key_phrases(reviews, settings),
    };
    info!(
        "✅ analyzed {} review(s): {} negative, {} topic(s)",
        report.n_reviews,
        negative.len(),
        report.topics.len()
    );

    Ok(AnalysisOutput {
        report,
        negative,
        topics_skipped,
    })
}

fn categorize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let hits: Vec<String> = COMPLAINT_CATEGORIES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(name, _)| name.to_string())
        .collect();
    if hits.is_empty() {
        vec!["other".to_string()]
    } else {
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn review(rating: u8, text: &str) -> Review {
        Review {
            review_id: Review::derive_id("author", text, "loc"),
            source_location: "loc".to_string(),
            author_hash: Review::hash_author("author"),
            rating,
            text: text.to_string(),
            posted_at: None,
            captured_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
        }
    }

    fn corpus() -> Vec<Review> {
        vec![
            review(5, "Great candles, love the scent, amazing staff"),
            review(2, "Overpriced and the wick tunnels badly every burn"),
            review(4, "Terrible scent throw, awful quality, very disappointed"),
            review(1, "Package arrived broken and the refund never came"),
        ]
    }

    #[test]
    fn report_counts_and_negative_export_line_up() {
        let settings = AnalysisSettings::default();
        let out = build_report(&corpus(), &settings, Utc::now()).unwrap();

        assert_eq!(out.report.n_reviews, 4);
        assert_eq!(
            out.report.sentiment_counts.negative,
            out.negative.len(),
            "every negative review is exported"
        );
        assert_eq!(out.report.sentiment_counts.positive, 1);
    }

    #[test]
    fn complaints_are_categorized_by_keyword() {
        let settings = AnalysisSettings::default();
        let out = build_report(&corpus(), &settings, Utc::now()).unwrap();

        let wick = out
            .negative
            .iter()
            .find(|n| n.text.contains("tunnels"))
            .unwrap();
        assert!(wick.categories.contains(&"price_value".to_string()));
        assert!(wick.categories.contains(&"burn_quality".to_string()));

        let shipping = out
            .negative
            .iter()
            .find(|n| n.text.contains("Package"))
            .unwrap();
        assert!(shipping.categories.contains(&"shipping".to_string()));
        assert!(shipping.categories.contains(&"return_refund".to_string()));
    }

    #[test]
    fn uncategorizable_complaint_falls_back_to_other() {
        assert_eq!(categorize("just did not enjoy it"), vec!["other"]);
    }

    #[test]
    fn identical_inputs_reproduce_the_report_bit_for_bit() {
        let settings = AnalysisSettings::default();
        let at = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();

        let a = build_report(&corpus(), &settings, at).unwrap();
        let b = build_report(&corpus(), &settings, at).unwrap();
        assert_eq!(
            serde_json::to_string(&a.report).unwrap(),
            serde_json::to_string(&b.report).unwrap()
        );
        assert_eq!(a.negative, b.negative);
    }

    #[test]
    fn empty_review_set_is_a_skip_not_a_crash() {
        let err = build_report(&[], &AnalysisSettings::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, ScoutError::Skipped(_)));
    }

    #[test]
    fn too_few_reviews_for_topics_degrades_instead_of_failing() {
        // Default n_topics is 10; four reviews cannot support that.
        let settings = AnalysisSettings::default();
        let out = build_report(&corpus(), &settings, Utc::now()).unwrap();
        assert!(out.report.topics.is_empty());
        assert!(out.topics_skipped.is_some());
        assert!(!out.report.key_phrases.is_empty());
    }
}
