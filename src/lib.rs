pub mod analysis;
pub mod core;
pub mod extract;
pub mod harvest;
pub mod pipeline;
pub mod session;
pub mod store;

// --- Primary core exports ---
pub use core::config::Settings;
pub use core::error::{Result, ScoutError};
pub use core::types;
pub use core::types::*;

pub use extract::{Extract, PageSnapshot};
pub use harvest::{HarvestOutcome, ScrollHarvester};
pub use pipeline::{Orchestrator, PipelineKind, RunSummary};
pub use session::Session;
