//! Skillrun execution engine.
//!
//! Turns a skill's interdependent workflow units into a leveled DAG plan,
//! drives level-by-level dispatch onto a work queue, maps data between
//! dependent units, retries failures with backoff, and aggregates a final
//! result. Storage, queueing, and the workload engine are collaborator
//! traits implemented in skillrun-infra.

pub mod engine;
pub mod repository;
