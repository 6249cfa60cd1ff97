//! rollcall-core — Attendance session domain logic.
//!
//! Consumes per-frame recognition observations from a collaborator
//! detector/recognizer and filters recognition noise by requiring
//! repeated low-dissimilarity sightings before confirming an identity.

pub mod aggregator;
pub mod labelmap;
pub mod source;
pub mod types;

pub use aggregator::IdentityAggregator;
pub use labelmap::LabelMap;
pub use source::{ObservationStream, RecognitionSource};
pub use types::{ConfirmedIdentity, Course, RecognitionObservation, Student};
