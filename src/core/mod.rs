pub mod config;
pub mod error;
pub mod types;

pub use config::Settings;
pub use error::{Result, ScoutError};
