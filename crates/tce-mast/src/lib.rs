#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! TCE MAST Library
//!
//! Archive client, cache layout and FITS verification.

pub mod archive;
pub mod cache;
pub mod client;
pub mod fits;
mod protocol;

pub use archive::{DataProduct, LightCurveArchive, Observation, ProductFilter, rank_observations};
pub use cache::{CacheLayout, PartialFile};
pub use client::MastClient;
pub use fits::FitsHeader;
