//! Replay observation source.
//!
//! Stands in for the live camera/recognizer pipeline, which is an
//! out-of-scope collaborator: one `<label>,<dissimilarity>` line per
//! observation, optionally paced to simulate a frame interval.
//! Malformed lines are skipped with a warning, the same policy the
//! label-map loader uses.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;

use rollcall_core::source::{RecognitionSource, SourceError};
use rollcall_core::types::RecognitionObservation;

#[derive(Debug)]
pub struct ReplaySource {
    queue: VecDeque<(i32, f64)>,
    frame_interval: Duration,
}

impl ReplaySource {
    pub fn from_path(path: &Path, frame_interval: Duration) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(SourceError::DeviceUnavailable(format!(
                "observation replay not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| SourceError::CaptureFailed(format!("{}: {e}", path.display())))?;

        let source = Self::parse(&text, frame_interval);
        tracing::info!(
            path = %path.display(),
            observations = source.queue.len(),
            "replay source loaded"
        );
        Ok(source)
    }

    pub fn parse(text: &str, frame_interval: Duration) -> Self {
        let mut queue = VecDeque::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let parsed = line.split_once(',').and_then(|(label, dissimilarity)| {
                Some((
                    label.trim().parse::<i32>().ok()?,
                    dissimilarity.trim().parse::<f64>().ok()?,
                ))
            });
            match parsed {
                Some(pair) => queue.push_back(pair),
                None => tracing::warn!(line = idx + 1, "malformed replay line; skipped"),
            }
        }
        Self {
            queue,
            frame_interval,
        }
    }
}

impl RecognitionSource for ReplaySource {
    fn next_observation(&mut self) -> Result<Option<RecognitionObservation>, SourceError> {
        let Some((label, dissimilarity)) = self.queue.pop_front() else {
            return Ok(None);
        };
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        Ok(Some(RecognitionObservation {
            label,
            dissimilarity,
            observed_at: Utc::now(),
        }))
    }
}
