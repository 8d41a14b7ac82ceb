//! Observability setup for Skillrun.

pub mod tracing_setup;
