//! Lexicon-based polarity scoring and the negative/neutral/positive rule.

use serde::Serialize;

use crate::core::config::AnalysisSettings;
use crate::core::types::{Review, Sentiment};

/// Signal words, matched as substrings so inflections still hit
/// ("love" covers "lovely", "loved").
const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "horrible",
    "poor",
    "worst",
    "disappointed",
    "hate",
    "waste",
];
const POSITIVE_WORDS: &[&str] = &[
    "great",
    "amazing",
    "love",
    "excellent",
    "best",
    "wonderful",
    "fantastic",
    "perfect",
];

/// Polarity in [-1, 1]: `(pos - neg) / (pos + neg)`, 0 when no signal word
/// appears at all.
pub fn polarity(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let neg = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    let pos = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    if pos + neg == 0.0 {
        0.0
    } else {
        (pos - neg) / (pos + neg)
    }
}

/// A low rating OR a sufficiently negative text each independently makes a
/// review negative; a glowing text never rescues a one-star rating.
pub fn classify(rating: u8, score: f64, settings: &AnalysisSettings) -> Sentiment {
    if rating <= settings.min_rating_negative || score < settings.sentiment_threshold {
        Sentiment::Negative
    } else if score > 0.0 {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

/// A review paired with its polarity score and label.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredReview<'a> {
    #[serde(skip)]
    pub review: &'a Review,
    pub score: f64,
    pub label: Sentiment,
}

pub fn score_reviews<'a>(
    reviews: &'a [Review],
    settings: &AnalysisSettings,
) -> Vec<ScoredReview<'a>> {
    reviews
        .iter()
        .map(|review| {
            let score = polarity(&review.text);
            ScoredReview {
                review,
                score,
                label: classify(review.rating, score, settings),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SentimentCounts;
    use chrono::Utc;

    fn review(rating: u8, text: &str) -> Review {
        Review {
            review_id: Review::derive_id("author", text, "loc"),
            source_location: "loc".to_string(),
            author_hash: Review::hash_author("author"),
            rating,
            text: text.to_string(),
            posted_at: None,
            captured_at: Utc::now(),
        }
    }

    fn settings() -> AnalysisSettings {
        AnalysisSettings::default() // threshold -0.1, min_rating_negative 3
    }

    #[test]
    fn polarity_is_signed_lexicon_balance() {
        assert!(polarity("great scent, amazing burn") > 0.0);
        assert!(polarity("terrible quality, awful service") < 0.0);
        assert_eq!(polarity("it is a candle"), 0.0);
        // one of each cancels out
        assert_eq!(polarity("great scent but terrible wick"), 0.0);
    }

    #[test]
    fn mixed_batch_tallies_one_positive_zero_neutral_two_negative() {
        let reviews = vec![
            review(5, "Great candles, love the scent, amazing staff"),
            review(2, "It was fine, nothing special about the visit"),
            review(4, "Terrible scent throw, awful quality, very disappointed"),
        ];
        let mut counts = SentimentCounts::default();
        for scored in score_reviews(&reviews, &settings()) {
            counts.tally(scored.label);
        }
        assert_eq!(counts.positive, 1);
        assert_eq!(counts.neutral, 0);
        assert_eq!(counts.negative, 2);
    }

    #[test]
    fn low_rating_is_negative_even_with_neutral_text() {
        let s = settings();
        assert_eq!(classify(1, 0.0, &s), Sentiment::Negative);
        assert_eq!(classify(3, 0.0, &s), Sentiment::Negative);
    }

    #[test]
    fn high_rating_with_negative_text_is_still_negative() {
        let s = settings();
        let score = polarity("Five stars for the staff but the candles are terrible and a waste");
        assert!(score < s.sentiment_threshold);
        assert_eq!(classify(5, score, &s), Sentiment::Negative);
    }

    #[test]
    fn rating_floor_follows_the_setting() {
        let mut s = settings();
        s.min_rating_negative = 5;
        assert_eq!(classify(5, 0.8, &s), Sentiment::Negative);
    }

    #[test]
    fn no_signal_text_above_the_floor_is_neutral() {
        let s = settings();
        assert_eq!(classify(4, 0.0, &s), Sentiment::Neutral);
        assert_eq!(classify(4, 0.5, &s), Sentiment::Positive);
    }
}
