//! Service Module
//!
//! Business logic layer for the orchestrator: accepting builds, following
//! their progress and handing out finished artifacts.

pub mod artifact;
pub mod dispatcher;
pub mod progress_stream;

pub use dispatcher::{DispatchError, JobDispatcher};
pub use progress_stream::{EventStream, ProgressStream};
