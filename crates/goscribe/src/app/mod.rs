//! Application layer: the editing services and the commands exposing them.

pub mod commands;
pub mod comments;
pub mod imports;
pub mod scan;
