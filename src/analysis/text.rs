//! Shared text primitives: tokenization, n-grams, and a small TF-IDF model.
//! Everything here is deterministic; the vocabulary is sorted so downstream
//! consumers see a stable term order.

use std::collections::HashMap;

/// Function words carrying no topical signal.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "this", "that", "with", "have", "has", "had",
    "but", "not", "you", "your", "they", "them", "their", "his", "her", "she", "him", "its",
    "our", "out", "can", "will", "would", "could", "should", "been", "being", "from", "into",
    "just", "very", "too", "also", "than", "then", "there", "here", "when", "what", "which",
    "who", "how", "all", "any", "some", "more", "most", "other", "such", "only", "own", "same",
    "about", "after", "before", "because", "while", "did", "does", "doing", "get", "got",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Lowercase word tokens, alphanumerics only, short words and stopwords
/// removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 2 && !is_stopword(s))
        .map(|s| s.to_string())
        .collect()
}

/// Contiguous n-grams of 1..=`max_n` tokens, space-joined.
pub fn ngrams(tokens: &[String], max_n: usize) -> Vec<String> {
    let mut grams = Vec::new();
    for n in 1..=max_n {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            grams.push(window.join(" "));
        }
    }
    grams
}

/// Term-frequency / inverse-document-frequency over a fixed corpus.
/// Vocabulary is lexically sorted; vectors are L2-normalized.
pub struct TfIdfModel {
    pub vocab: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfModel {
    pub fn fit(docs: &[Vec<String>]) -> Self {
        let mut df: HashMap<&str, usize> = HashMap::new();
        for doc in docs {
            let mut seen: Vec<&str> = doc.iter().map(|t| t.as_str()).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let mut vocab: Vec<String> = df.keys().map(|t| t.to_string()).collect();
        vocab.sort_unstable();

        let n_docs = docs.len() as f64;
        let idf = vocab
            .iter()
            .map(|term| {
                let d = df[term.as_str()] as f64;
                ((1.0 + n_docs) / (1.0 + d)).ln() + 1.0
            })
            .collect();
        let index = vocab
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Self { vocab, index, idf }
    }

    pub fn transform(&self, doc: &[String]) -> Vec<f64> {
        let mut vector = vec![0.0; self.vocab.len()];
        if doc.is_empty() {
            return vector;
        }
        for token in doc {
            if let Some(&i) = self.index.get(token) {
                vector[i] += 1.0;
            }
        }
        let len = doc.len() as f64;
        for (i, v) in vector.iter_mut().enumerate() {
            *v = (*v / len) * self.idf[i];
        }
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}
