//! Logging infrastructure for the engine
//!
//! Structured audit events for certification and reward operations,
//! written as JSONL alongside the tracing output.

pub mod operations;

pub use operations::{OperationEvent, OperationLogger, OperationKind};
