//! Repository layer
//!
//! The job registry is the only mutable state shared between the dispatcher,
//! the running pipelines and the progress streams. It is trait-based so the
//! orchestrator can be wired with any backing store and tests can inspect it
//! directly.

mod jobs;

// Re-export trait
pub use jobs::{JobRegistry, RegistryError};

// Re-export implementation
pub use jobs::InMemoryJobRegistry;
