//! Infrastructure implementations of the Skillrun collaborator traits.
//!
//! SQLite persistence for execution records, a dashmap-backed in-memory
//! catalog, an in-process Tokio work queue with a permit-bounded worker,
//! and an HTTP client for the external workload engine.

pub mod catalog;
pub mod queue;
pub mod sqlite;
pub mod workload;
