//! Core types shared by every service.

pub mod errors;
pub mod model;
