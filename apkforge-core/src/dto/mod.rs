//! Data Transfer Objects
//!
//! Wire shapes used between the orchestrator HTTP API and its clients.

pub mod build;
pub mod progress;
