use apkforge_core::domain::job::JobUpdate;

use super::rules::{ProgressRules, ProgressWindow};

const DOWNLOAD_MARKER: &str = "Download";
const DOWNLOAD_MESSAGE: &str = "Downloading dependencies...";
const COMPILE_MARKER: &str = "Compiling";
const COMPILE_MESSAGE: &str = "Compiling source code...";
const MAX_TASK_CHARS: usize = 50;

/// Change derived from one output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorUpdate {
    /// New overall progress, present only when it went up
    pub progress: Option<u8>,
    pub message: String,
}

impl EstimatorUpdate {
    pub fn into_job_update(self) -> JobUpdate {
        match self.progress {
            Some(progress) => JobUpdate::progress(progress, self.message),
            None => JobUpdate::message(self.message),
        }
    }
}

/// Turns the output of one tool invocation into progress updates
///
/// Holds the last emitted value so repeated or out-of-order lines never move
/// progress backwards. One estimator serves exactly one invocation.
#[derive(Debug)]
pub struct ProgressEstimator<'a> {
    rules: &'a ProgressRules,
    window: ProgressWindow,
    last: u8,
}

impl<'a> ProgressEstimator<'a> {
    pub fn new(rules: &'a ProgressRules, window: ProgressWindow) -> Self {
        Self {
            rules,
            window,
            last: window.base(),
        }
    }

    /// Last emitted progress, or the window base before any emission
    pub fn current(&self) -> u8 {
        self.last
    }

    /// Progress comes from the first matching rule; the download and compile
    /// heuristics replace the message on any line they match
    pub fn observe(&mut self, line: &str) -> Option<EstimatorUpdate> {
        let rules = self.rules;
        let mut update = rules.first_match(line).and_then(|rule| {
            let scaled = self.window.scale(rule.checkpoint);
            (scaled > self.last).then(|| {
                self.last = scaled;
                EstimatorUpdate {
                    progress: Some(scaled),
                    message: format!("Building: {}", task_label(line, &rule.marker)),
                }
            })
        });

        if let Some(message) = heuristic_message(line) {
            match update.as_mut() {
                Some(update) => update.message = message.to_string(),
                None => {
                    update = Some(EstimatorUpdate {
                        progress: None,
                        message: message.to_string(),
                    })
                }
            }
        }

        update
    }
}

fn heuristic_message(line: &str) -> Option<&'static str> {
    if line.contains(DOWNLOAD_MARKER) {
        Some(DOWNLOAD_MESSAGE)
    } else if line.contains(COMPILE_MARKER) {
        Some(COMPILE_MESSAGE)
    } else {
        None
    }
}

/// Text after the last `>` of a gradle task line, capped
fn task_label<'l>(line: &'l str, marker: &'l str) -> String {
    let label = match line.rfind('>') {
        Some(idx) => line[idx + 1..].trim(),
        None => marker,
    };
    label.chars().take(MAX_TASK_CHARS).collect()
}
