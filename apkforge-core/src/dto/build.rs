//! Build submission DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// Response to an accepted build submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAccepted {
    pub build_id: JobId,
}

/// Error body returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
