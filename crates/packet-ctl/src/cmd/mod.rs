//! CLI command modules.

pub mod cat;
pub mod config;
pub mod fetch;
pub mod output;
