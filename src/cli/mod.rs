//! CLI command handlers

pub mod commands;

pub use commands::{analyze, captions, figures, identity, inspect, multiplier, validate};
