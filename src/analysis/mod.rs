//! Offline review analysis: sentiment labeling, key-phrase ranking, topic
//! clustering, and the assembled report. Runs entirely on stored data and
//! never touches the browser.

pub mod phrases;
pub mod report;
pub mod sentiment;
pub mod text;
pub mod topics;

pub use report::{build_report, AnalysisOutput, NegativeReviewExport};
pub use sentiment::{classify, polarity, score_reviews, ScoredReview};
pub use topics::extract_topics;
