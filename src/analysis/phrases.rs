//! Key-phrase ranking: TF-IDF-weighted n-grams (1 to 3 words) across the
//! whole review set.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::config::AnalysisSettings;
use crate::core::types::{KeyPhrase, Review};

use super::text::{ngrams, tokenize};

const MAX_NGRAM: usize = 3;

/// Top phrases by summed TF-IDF weight. Ordering is fully deterministic:
/// score descending, then shorter phrase, then lexical.
pub fn key_phrases(reviews: &[Review], settings: &AnalysisSettings) -> Vec<KeyPhrase> {
    let docs: Vec<Vec<String>> = reviews
        .iter()
        .map(|r| ngrams(&tokenize(&r.text), MAX_NGRAM))
        .collect();
    if docs.is_empty() {
        return Vec::new();
    }

    let mut term_count: HashMap<&str, usize> = HashMap::new();
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let mut in_doc: Vec<&str> = Vec::new();
        for gram in doc {
            *term_count.entry(gram.as_str()).or_insert(0) += 1;
            in_doc.push(gram.as_str());
        }
        in_doc.sort_unstable();
        in_doc.dedup();
        for gram in in_doc {
            *doc_freq.entry(gram).or_insert(0) += 1;
        }
    }

    let n_docs = docs.len() as f64;
    let mut scored: Vec<KeyPhrase> = term_count
        .into_iter()
        .map(|(phrase, count)| {
            let df = doc_freq[phrase] as f64;
            let idf = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
            KeyPhrase {
                phrase: phrase.to_string(),
                score: count as f64 * idf,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.phrase.len().cmp(&b.phrase.len()))
            .then(a.phrase.cmp(&b.phrase))
    });
    scored.truncate(settings.n_key_phrases);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(text: &str) -> Review {
        Review {
            review_id: Review::derive_id("a", text, "loc"),
            source_location: "loc".to_string(),
            author_hash: Review::hash_author("a"),
            rating: 3,
            text: text.to_string(),
            posted_at: None,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn recurring_phrase_outranks_one_off_words() {
        let reviews = vec![
            review("weak scent throw, candle smelled of nothing"),
            review("pretty jar but weak scent throw again"),
            review("weak scent throw ruined the gift"),
        ];
        let mut settings = AnalysisSettings::default();
        settings.n_key_phrases = 5;

        let phrases = key_phrases(&reviews, &settings);
        assert!(phrases
            .iter()
            .take(5)
            .any(|p| p.phrase == "weak scent throw"));
        // Scores are sorted descending.
        assert!(phrases.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn ties_break_on_length_then_lexicographically() {
        // Two single-occurrence unigrams in the same doc share a score.
        let reviews = vec![review("zebra apple")];
        let settings = AnalysisSettings::default();
        let phrases = key_phrases(&reviews, &settings);

        let apple = phrases.iter().position(|p| p.phrase == "apple").unwrap();
        let zebra = phrases.iter().position(|p| p.phrase == "zebra").unwrap();
        assert!(apple < zebra);
    }

    #[test]
    fn respects_the_requested_limit() {
        let reviews = vec![review("one two candles three four scent five six")];
        let mut settings = AnalysisSettings::default();
        settings.n_key_phrases = 3;
        assert_eq!(key_phrases(&reviews, &settings).len(), 3);
    }

    #[test]
    fn empty_input_yields_no_phrases() {
        assert!(key_phrases(&[], &AnalysisSettings::default()).is_empty());
    }
}
