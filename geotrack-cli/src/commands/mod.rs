//! CLI command implementations.

pub mod common;
pub mod config;
pub mod options;
pub mod simulate;
