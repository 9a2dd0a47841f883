//! Runtime glue that wires configs, sinks, progress tracking, telemetry, and
//! runner orchestration.

pub mod config;
pub mod error;
pub mod progress;
pub mod runner;
pub mod sink;
pub mod telemetry;
