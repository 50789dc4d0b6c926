#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! TCE Harvest Library
//!
//! Planning, retrying, fetching and cataloguing light curves.

pub mod fetch;
pub mod plan;
pub mod progress;
pub mod retry;
pub mod runner;

// Re-exports for convenience
pub use fetch::LightCurveFetcher;
pub use plan::{HarvestPlan, PlanOptions};
pub use progress::{RunSummary, progress_bar};
pub use retry::LinearBackoff;
pub use runner::Harvester;
