use thiserror::Error;

/// Error taxonomy for the whole crate.
///
/// Propagation policy:
/// * `Extraction` is record-level — the caller drops that record and keeps the batch.
/// * `Navigation` / `Capture` are transient UI failures, retried by the session
///   controller and then surfaced per-operation.
/// * `Connection` is fatal to any pipeline that needs the browser; it is never
///   retried beyond the attach budget.
/// * `InsufficientData` / `Skipped` are analysis-level outcomes, reported in the
///   run summary rather than crashing the process.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("browser unreachable at {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("navigation to {url} failed after {attempts} attempt(s): {reason}")]
    Navigation {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("capture of `{target}` failed: {reason}")]
    Capture { target: String, reason: String },

    #[error("record extraction failed ({surface}): {reason}")]
    Extraction {
        surface: &'static str,
        reason: String,
    },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("skipped: {0}")]
    Skipped(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ScoutError {
    pub fn extraction(surface: &'static str, reason: impl Into<String>) -> Self {
        ScoutError::Extraction {
            surface,
            reason: reason.into(),
        }
    }

    /// True for errors that abort a whole browser-bound pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoutError::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
