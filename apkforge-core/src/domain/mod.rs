//! Core domain types
//!
//! These types describe a build job and the request that started it. They are
//! shared between the orchestrator (which tracks jobs) and the runner (which
//! advances them through the build pipeline).

pub mod build;
pub mod job;
