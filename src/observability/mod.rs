//! # Observability
//!
//! Structured logging for the query engine. One JSON line per event,
//! written synchronously with deterministic key order.

pub mod logger;

pub use logger::{Logger, Severity};
