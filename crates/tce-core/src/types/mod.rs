//! Core types for TCE harvesting.

mod ids;
mod proptests;
mod task;

pub use ids::{Sector, SectorSet, TicId};
pub use task::{HarvestTask, LightCurveRecord, TaskOutcome};
