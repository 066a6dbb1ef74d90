//! SharpXch: backoffice client and value-betting engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod exchange;
pub mod storage;
pub mod strategy;
pub mod types;
