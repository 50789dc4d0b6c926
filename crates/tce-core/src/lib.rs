#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! TCE Core Library
//!
//! Core types, errors, catalogue input and configuration for the harvester.

pub mod config;
pub mod error;
pub mod table;
pub mod types;

// Re-exports for convenience
pub use config::HarvestConfig;
pub use error::{Error, Result};
pub use table::CandidateTable;
pub use types::{HarvestTask, LightCurveRecord, Sector, SectorSet, TaskOutcome, TicId};
