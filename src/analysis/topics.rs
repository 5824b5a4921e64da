//! Topic discovery: k-means over TF-IDF vectors with a pinned RNG seed.
//!
//! Every step is deterministic for a given seed and input set — centroid
//! seeding, nearest-centroid ties (lowest cluster index wins), and term
//! ordering all have fixed tie-breaks, so identical inputs reproduce the
//! exact same topics.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::core::config::AnalysisSettings;
use crate::core::error::{Result, ScoutError};
use crate::core::types::{Review, Topic};

use super::text::{tokenize, TfIdfModel};

const MAX_ITERATIONS: usize = 20;
const TERMS_PER_TOPIC: usize = 5;

/// Cluster reviews into `n_topics` topics.
///
/// Fails with `InsufficientData` when the review set or its vocabulary is
/// smaller than the requested topic count — fewer documents than clusters
/// cannot produce meaningful groupings.
pub fn extract_topics(reviews: &[Review], settings: &AnalysisSettings) -> Result<Vec<Topic>> {
    let k = settings.n_topics;
    let docs: Vec<Vec<String>> = reviews.iter().map(|r| tokenize(&r.text)).collect();
    let model = TfIdfModel::fit(&docs);

    if reviews.len() < k {
        return Err(ScoutError::InsufficientData(format!(
            "{} review(s) for {} topics",
            reviews.len(),
            k
        )));
    }
    if model.vocab.len() < k {
        return Err(ScoutError::InsufficientData(format!(
            "vocabulary of {} term(s) for {} topics",
            model.vocab.len(),
            k
        )));
    }

    let vectors: Vec<Vec<f64>> = docs.iter().map(|d| model.transform(d)).collect();

    // Seed centroids from k shuffled documents.
    let mut rng = StdRng::seed_from_u64(settings.topic_seed);
    let mut order: Vec<usize> = (0..vectors.len()).collect();
    order.shuffle(&mut rng);
    let mut centroids: Vec<Vec<f64>> = order[..k].iter().map(|&i| vectors[i].clone()).collect();

    let mut assignment = vec![0usize; vectors.len()];
    for iteration in 0..MAX_ITERATIONS {
        let next: Vec<usize> = vectors
            .iter()
            .map(|v| nearest_centroid(v, &centroids))
            .collect();
        let converged = next == assignment;
        assignment = next;
        if converged {
            debug!("k-means converged after {} iteration(s)", iteration);
            break;
        }

        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = vectors
                .iter()
                .zip(&assignment)
                .filter(|(_, &a)| a == cluster)
                .map(|(v, _)| v)
                .collect();
            // An emptied cluster keeps its previous centroid.
            if members.is_empty() {
                continue;
            }
            for (dim, slot) in centroid.iter_mut().enumerate() {
                *slot = members.iter().map(|m| m[dim]).sum::<f64>() / members.len() as f64;
            }
        }
    }

    let topics = (0..k)
        .map(|cluster| {
            let mut member_review_ids: Vec<String> = reviews
                .iter()
                .zip(&assignment)
                .filter(|(_, &a)| a == cluster)
                .map(|(r, _)| r.review_id.clone())
                .collect();
            member_review_ids.sort_unstable();
            Topic {
                topic_id: cluster,
                top_terms: top_terms(&centroids[cluster], &model.vocab),
                member_review_ids,
            }
        })
        .collect();
    Ok(topics)
}

fn nearest_centroid(vector: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0usize;
    let mut best_sim = f64::NEG_INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let sim: f64 = vector.iter().zip(centroid).map(|(a, b)| a * b).sum();
        // Strict comparison: ties stay with the lowest cluster index.
        if sim > best_sim {
            best_sim = sim;
            best = i;
        }
    }
    best
}

fn top_terms(centroid: &[f64], vocab: &[String]) -> Vec<String> {
    let mut weighted: Vec<(usize, f64)> = centroid
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, w)| *w > 0.0)
        .collect();
    // Weight descending; vocab is sorted, so the index tie-break is lexical.
    weighted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    weighted
        .into_iter()
        .take(TERMS_PER_TOPIC)
        .map(|(i, _)| vocab[i].clone())
        .collect()
}
