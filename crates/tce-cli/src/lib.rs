#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! TCE CLI
//!
//! Argument parsing, logging setup and command handlers for the `tce`
//! binary.

pub mod cli;
pub mod commands;
pub mod config_handlers;
pub mod logging;
