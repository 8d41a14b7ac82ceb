//! The skill execution engine.
//!
//! Components, leaves first: plan builder (`plan`), data mapper (`mapper`),
//! retry/backoff policy (`retry`), dependency-condition evaluation
//! (`condition`), collaborator contracts (`queue`, `workload`), completion
//! signaling (`signal`), and the stateful coordinator (`orchestrator`).

pub mod condition;
pub mod mapper;
pub mod orchestrator;
pub mod plan;
pub mod queue;
pub mod retry;
pub mod signal;
pub mod workload;

pub use orchestrator::ExecutionOrchestrator;
pub use plan::ExecutionPlan;
