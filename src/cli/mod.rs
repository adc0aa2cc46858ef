//! Command-line interface for socrawler.

mod commands;
pub mod helpers;

pub use commands::{is_verbose, run};
