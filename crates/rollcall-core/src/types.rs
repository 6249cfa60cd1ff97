use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A student known to the roster. Created once at first enrollment,
/// never deleted by this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
}

/// A course attendance can be taken for. Immutable during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
}

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    pub sequence: u32,
}

/// Region of a frame containing a detected face. Display-only; the
/// session engine never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One recognizer verdict for a single face in a single frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub region: FaceBox,
    /// Recognizer-native integer label of the best-ranked identity.
    pub label: i32,
    /// Lower-is-better distance from the best-ranked identity.
    /// Not a probability.
    pub dissimilarity: f64,
}

/// One detector/recognizer output for a single face in a single frame.
/// Produced by the recognition source, consumed once by the aggregator,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionObservation {
    pub label: i32,
    pub dissimilarity: f64,
    pub observed_at: DateTime<Utc>,
}

/// Emitted by the aggregator exactly once per student per session, on
/// the observation that reaches the confirmation threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedIdentity {
    pub student: Student,
    /// Timestamp of the confirming sighting.
    pub confirmed_at: DateTime<Utc>,
}
