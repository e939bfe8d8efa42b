//! varmarshal - query translation and execution engine for a
//! light-curve curation portal
//!
//! Accepts declarative query descriptors (structured find/aggregate,
//! astronomical cone search, or screened free-form expressions),
//! validates them against a per-user access policy, canonicalizes sky
//! coordinates into a geospatial form, executes against a document
//! store under a deadline, and optionally tracks results through a
//! durable bookkeeping store.

pub mod cli;
pub mod config;
pub mod coord;
pub mod engine;
pub mod executor;
pub mod http;
pub mod literal;
pub mod memstore;
pub mod observability;
pub mod policy;
pub mod query;
pub mod tasks;
