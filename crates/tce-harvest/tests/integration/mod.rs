//! Integration tests for fetching and running harvests.

mod fetcher;
mod runner;
