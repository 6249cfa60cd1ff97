//! Collaborator seams for frame acquisition and recognition.
//!
//! The pixel-level work lives behind these traits: a [`FrameSource`]
//! yields raw frames, a [`Recognizer`] turns a frame into per-face
//! verdicts, and [`ObservationStream`] adapts the pair into the flat
//! observation stream the session engine consumes.

use std::collections::VecDeque;

use thiserror::Error;

use crate::types::{Detection, Frame, RecognitionObservation};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("recognizer failed: {0}")]
    RecognizerFailed(String),
}

/// Yields raw frames until the underlying stream ends.
pub trait FrameSource {
    /// `Ok(None)` means end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Black-box detector/recognizer collaborator: given a frame, returns
/// one ranked verdict per detected face.
pub trait Recognizer {
    fn detect_and_recognize(&mut self, frame: &Frame) -> Result<Vec<Detection>, SourceError>;
}

/// A lazy, unbounded sequence of per-face observations; finite only
/// when the underlying stream ends or the session is cancelled.
pub trait RecognitionSource {
    /// `Ok(None)` means the stream has ended.
    fn next_observation(&mut self) -> Result<Option<RecognitionObservation>, SourceError>;
}

/// Adapts a frame source plus a recognizer into an observation stream,
/// one observation per detected face per frame. Bounding boxes are for
/// display only and are dropped here.
pub struct ObservationStream<S, R> {
    frames: S,
    recognizer: R,
    pending: VecDeque<RecognitionObservation>,
}

impl<S, R> ObservationStream<S, R> {
    pub fn new(frames: S, recognizer: R) -> Self {
        Self {
            frames,
            recognizer,
            pending: VecDeque::new(),
        }
    }
}

impl<S: FrameSource, R: Recognizer> RecognitionSource for ObservationStream<S, R> {
    fn next_observation(&mut self) -> Result<Option<RecognitionObservation>, SourceError> {
        loop {
            if let Some(obs) = self.pending.pop_front() {
                return Ok(Some(obs));
            }

            // Frames with no detected face yield nothing; keep pulling.
            let Some(frame) = self.frames.next_frame()? else {
                return Ok(None);
            };

            let observed_at = frame.captured_at;
            for detection in self.recognizer.detect_and_recognize(&frame)? {
                self.pending.push_back(RecognitionObservation {
                    label: detection.label,
                    dissimilarity: detection.dissimilarity,
                    observed_at,
                });
            }
        }
    }
}
