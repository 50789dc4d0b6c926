#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! TCE Catalog
//!
//! SQLite storage for light-curve locations and catalogue features. The
//! schema matches databases written by earlier harvester runs, so existing
//! files are opened and extended in place.

pub mod schema;
pub mod store;
pub mod tois;
pub mod writer;

pub use store::{Catalog, CatalogStats};
pub use tois::ColumnType;
pub use writer::CatalogWriter;
