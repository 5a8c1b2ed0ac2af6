//! Infrastructure adapters for parsing, config, and external tools.

pub mod config;
pub mod parser;
pub mod testgen;
