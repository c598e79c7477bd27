//! Progress rule table and reporting window

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Gradle task markers in the order an Android release build emits them
const GRADLE_RELEASE_TASKS: &[(&str, u8)] = &[
    ("preBuild", 5),
    ("preReleaseBuild", 8),
    ("compileReleaseAidl", 10),
    ("compileReleaseRenderscript", 12),
    ("generateReleaseBuildConfig", 15),
    ("generateReleaseResValues", 18),
    ("generateReleaseResources", 20),
    ("mergeReleaseResources", 25),
    ("processReleaseResources", 30),
    ("compileReleaseJavaWithJavac", 45),
    ("compileReleaseSources", 50),
    ("mergeReleaseJavaResource", 55),
    ("dexBuilderRelease", 60),
    ("mergeDexRelease", 70),
    ("mergeReleaseJniLibFolders", 72),
    ("mergeReleaseNativeLibs", 75),
    ("packageRelease", 85),
    ("assembleRelease", 90),
    ("signReleaseBundle", 92),
    ("BUILD SUCCESSFUL", 95),
];

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("rule #{index} has an empty marker")]
    EmptyMarker { index: usize },

    #[error("rule '{marker}' has checkpoint {checkpoint}, expected 0-100")]
    CheckpointOutOfRange { marker: String, checkpoint: u8 },

    #[error("window [{base}, {ceiling}] is invalid, expected base <= ceiling <= 100")]
    InvalidWindow { base: u8, ceiling: u8 },

    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A textual marker and the checkpoint it stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRule {
    pub marker: String,
    pub checkpoint: u8,
}

/// Ordered, immutable rule table
///
/// The first rule whose marker occurs in a line wins, so a more specific
/// marker has to be listed before any marker it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRules {
    rules: Vec<ProgressRule>,
}

impl ProgressRules {
    pub fn new(rules: Vec<ProgressRule>) -> Result<Self, RulesError> {
        for (index, rule) in rules.iter().enumerate() {
            if rule.marker.is_empty() {
                return Err(RulesError::EmptyMarker { index });
            }
            if rule.checkpoint > 100 {
                return Err(RulesError::CheckpointOutOfRange {
                    marker: rule.marker.clone(),
                    checkpoint: rule.checkpoint,
                });
            }
        }
        Ok(Self { rules })
    }

    /// Builds a table from `(marker, checkpoint)` pairs
    pub fn from_pairs(pairs: &[(&str, u8)]) -> Result<Self, RulesError> {
        Self::new(
            pairs
                .iter()
                .map(|(marker, checkpoint)| ProgressRule {
                    marker: marker.to_string(),
                    checkpoint: *checkpoint,
                })
                .collect(),
        )
    }

    /// Android release build markers
    pub fn gradle_release() -> Self {
        Self {
            rules: GRADLE_RELEASE_TASKS
                .iter()
                .map(|(marker, checkpoint)| ProgressRule {
                    marker: marker.to_string(),
                    checkpoint: *checkpoint,
                })
                .collect(),
        }
    }

    /// Parses a JSON array of `{"marker": ..., "checkpoint": ...}` objects
    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        let rules: Vec<ProgressRule> = serde_json::from_str(json)?;
        Self::new(rules)
    }

    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let json = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// First rule whose marker occurs in `line`
    pub fn first_match(&self, line: &str) -> Option<&ProgressRule> {
        self.rules.iter().find(|rule| line.contains(&rule.marker))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ProgressRules {
    fn default() -> Self {
        Self::gradle_release()
    }
}

/// The `[base, ceiling]` slice of overall progress one stage reports into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressWindow {
    base: u8,
    ceiling: u8,
}

impl ProgressWindow {
    /// Window of the external build stage
    pub const BUILD_STAGE: ProgressWindow = ProgressWindow {
        base: 50,
        ceiling: 95,
    };

    pub fn new(base: u8, ceiling: u8) -> Result<Self, RulesError> {
        if base > ceiling || ceiling > 100 {
            return Err(RulesError::InvalidWindow { base, ceiling });
        }
        Ok(Self { base, ceiling })
    }

    pub fn base(&self) -> u8 {
        self.base
    }

    pub fn ceiling(&self) -> u8 {
        self.ceiling
    }

    /// Maps a 0-100 checkpoint linearly into the window, truncating
    pub fn scale(&self, checkpoint: u8) -> u8 {
        let checkpoint = u32::from(checkpoint.min(100));
        let span = u32::from(self.ceiling - self.base);
        self.base + (checkpoint * span / 100) as u8
    }
}
