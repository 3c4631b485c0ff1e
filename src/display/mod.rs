//! Terminal display utilities for CLI output.
//!
//! Provides styled tables for search results and cache statistics.

pub mod tables;

pub use tables::{
    TableBuilder, create_cache_stats_table, create_nearest_table, create_results_table,
};
