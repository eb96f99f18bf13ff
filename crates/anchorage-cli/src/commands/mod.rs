//! CLI command implementations

pub mod anchor;
pub mod chain;
pub mod common;
pub mod ingest;
pub mod verify;
