//! Flat-file persistence. Every write lands in a temp sibling first and is
//! renamed into place, so a crash mid-write never leaves a partial file.
//!
//! Layout under the configured roots:
//! - `data/reviews/reviews.jsonl` — append-only review set, one record per line
//! - `data/semrush/{kind}_{domain}_{bucket}.json` — per-day metric snapshots
//! - `output/analysis/` — regenerable analysis documents

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::error::{Result, ScoutError};
use crate::core::types::{AnalysisReport, Review};

// ── Atomic file primitives ───────────────────────────────────────────────────

/// Write `bytes` to `path` via a temp sibling + rename. Parent directories are
/// created as needed.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_sibling(path);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// File-name-safe rendition of a domain ("shop.example.co" stays readable,
/// anything path-hostile becomes '_').
fn safe_domain(domain: &str) -> String {
    domain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ── Review store (JSONL, append-only) ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub total: usize,
}

/// The accumulated review set. Records are only ever added; a merge rewrites
/// the file as existing-records-in-order followed by the genuinely new ones.
pub struct ReviewStore {
    path: PathBuf,
}

impl ReviewStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("reviews").join("reviews.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every stored review. A missing file is an empty set; a malformed
    /// line is skipped with a warning rather than poisoning the whole load.
    pub async fn load(&self) -> Result<Vec<Review>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ScoutError::Io(e)),
        };

        let mut seen = HashSet::new();
        let mut reviews = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Review>(line) {
                Ok(review) => {
                    if seen.insert(review.review_id.clone()) {
                        reviews.push(review);
                    }
                }
                Err(e) => warn!(
                    "skipping malformed review at {}:{}: {}",
                    self.path.display(),
                    lineno + 1,
                    e
                ),
            }
        }
        Ok(reviews)
    }

    /// Merge a freshly harvested batch into the store. Existing records are
    /// never altered; only reviews with an unseen `review_id` are appended.
    pub async fn merge(&self, incoming: &[Review]) -> Result<MergeStats> {
        let existing = self.load().await?;
        let mut known: HashSet<&str> = existing.iter().map(|r| r.review_id.as_str()).collect();

        let mut lines = Vec::with_capacity(existing.len() + incoming.len());
        for review in &existing {
            lines.push(serde_json::to_string(review)?);
        }
        let mut added = 0usize;
        for review in incoming {
            if known.insert(review.review_id.as_str()) {
                lines.push(serde_json::to_string(review)?);
                added += 1;
            }
        }

        let total = lines.len();
        let mut body = lines.join("\n");
        body.push('\n');
        atomic_write(&self.path, body.as_bytes()).await?;
        info!(
            "💾 {} review(s) added, {} total → {}",
            added,
            total,
            self.path.display()
        );
        Ok(MergeStats { added, total })
    }
}

// ── Metric store (per-domain, per-bucket JSON) ───────────────────────────────

/// Daily metric snapshots. Re-scraping the same domain on the same day
/// overwrites that day's file; other buckets are untouched.
pub struct MetricStore {
    dir: PathBuf,
}

impl MetricStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("semrush"),
        }
    }

    pub fn bucket_path(&self, kind: &str, domain: &str, bucket: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{}.json", kind, safe_domain(domain), bucket))
    }

    pub async fn write_bucket<T: Serialize>(
        &self,
        kind: &str,
        domain: &str,
        bucket: &str,
        payload: &T,
    ) -> Result<PathBuf> {
        let path = self.bucket_path(kind, domain, bucket);
        let bytes = serde_json::to_vec_pretty(payload)?;
        atomic_write(&path, &bytes).await?;
        info!("💾 {}", path.display());
        Ok(path)
    }
}

// ── Analysis outputs ─────────────────────────────────────────────────────────

/// Regenerable analysis documents; each run overwrites wholesale.
pub struct AnalysisStore {
    dir: PathBuf,
}

impl AnalysisStore {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            dir: output_dir.join("analysis"),
        }
    }

    pub async fn write_report(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let path = self.dir.join("analysis_report.json");
        atomic_write(&path, &serde_json::to_vec_pretty(report)?).await?;
        info!("💾 {}", path.display());
        Ok(path)
    }

    pub async fn write_negative_reviews<T: Serialize>(&self, rows: &[T]) -> Result<PathBuf> {
        let path = self.dir.join("negative_reviews.json");
        atomic_write(&path, &serde_json::to_vec_pretty(rows)?).await?;
        info!("💾 {}", path.display());
        Ok(path)
    }
}

/// Directory for one extractor's screenshots within a pipeline run.
pub fn screenshot_dir(output_dir: &Path, pipeline: &str, extractor: &str) -> PathBuf {
    output_dir.join("screenshots").join(pipeline).join(extractor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(id_seed: &str, rating: u8) -> Review {
        Review {
            review_id: Review::derive_id(id_seed, "some review text here", "loc"),
            source_location: "loc".to_string(),
            author_hash: Review::hash_author(id_seed),
            rating,
            text: "some review text here".to_string(),
            posted_at: None,
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.json");
        atomic_write(&path, b"{}").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{}");
        let siblings: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(siblings, vec![std::ffi::OsString::from("c.json")]);
    }

    #[tokio::test]
    async fn missing_review_file_loads_as_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReviewStore::new(dir.path());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_appends_only_unseen_review_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReviewStore::new(dir.path());

        let first = store.merge(&[review("jane", 5), review("sam", 2)]).await.unwrap();
        assert_eq!(first, MergeStats { added: 2, total: 2 });

        // Same batch plus one new reviewer: only the new one lands.
        let second = store
            .merge(&[review("jane", 5), review("kim", 1)])
            .await
            .unwrap();
        assert_eq!(second, MergeStats { added: 1, total: 3 });

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 3);
        // Existing records keep their original order and content.
        assert_eq!(loaded[0].review_id, Review::derive_id("jane", "some review text here", "loc"));
        assert_eq!(loaded[0].rating, 5);
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReviewStore::new(dir.path());
        store.merge(&[review("jane", 4)]).await.unwrap();

        let mut raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        raw.push_str("{not json\n");
        tokio::fs::write(store.path(), raw).await.unwrap();

        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bucket_paths_encode_kind_domain_and_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricStore::new(dir.path());
        let path = store
            .write_bucket("keywords", "acmecandles.com", "2026-08-28", &vec!["x"])
            .await
            .unwrap();
        assert!(path.ends_with("semrush/keywords_acmecandles.com_2026-08-28.json"));
        assert!(path.exists());
    }
}
