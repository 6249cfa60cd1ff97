//! Identity aggregation — repeated-sighting noise filter.
//!
//! A single frame can misclassify; three cheap sightings in one session
//! rarely do. The aggregator counts accepted observations per identity
//! and confirms an identity exactly once, when its count reaches the
//! confirmation threshold.

use std::collections::HashMap;

use crate::types::{ConfirmedIdentity, RecognitionObservation, Student};

/// Dissimilarity cutoff on the recognizer's native scale (LBPH);
/// observations at or above it are treated as unknown.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 80.0;
/// Accepted sightings of the same identity required before confirming.
pub const DEFAULT_CONFIRMATION_THRESHOLD: u32 = 3;

/// Per-session confirmation state. Counts only increase; the whole
/// aggregator is discarded at session end.
pub struct IdentityAggregator {
    /// Recognizer label → rostered student. Built once at session
    /// start from the label map, immutable for the session.
    identities: HashMap<i32, Student>,
    counts: HashMap<i64, u32>,
    confidence_threshold: f64,
    confirmation_threshold: u32,
}

impl IdentityAggregator {
    pub fn new(identities: HashMap<i32, Student>) -> Self {
        Self::with_thresholds(
            identities,
            DEFAULT_CONFIDENCE_THRESHOLD,
            DEFAULT_CONFIRMATION_THRESHOLD,
        )
    }

    pub fn with_thresholds(
        identities: HashMap<i32, Student>,
        confidence_threshold: f64,
        confirmation_threshold: u32,
    ) -> Self {
        Self {
            identities,
            counts: HashMap::new(),
            confidence_threshold,
            // A threshold of zero could never emit; clamp to one.
            confirmation_threshold: confirmation_threshold.max(1),
        }
    }

    /// Feed one observation through the filter.
    ///
    /// Returns `Some` exactly once per student, on the observation
    /// whose count reaches the confirmation threshold. Observations at
    /// or above the confidence threshold, and labels with no roster
    /// entry, are dropped silently and never touch a counter.
    pub fn observe(&mut self, obs: &RecognitionObservation) -> Option<ConfirmedIdentity> {
        if obs.dissimilarity >= self.confidence_threshold {
            tracing::trace!(
                label = obs.label,
                dissimilarity = obs.dissimilarity,
                "observation above confidence threshold; dropped as unknown"
            );
            return None;
        }

        let Some(student) = self.identities.get(&obs.label) else {
            tracing::debug!(label = obs.label, "no roster entry for label; dropped");
            return None;
        };

        let count = self.counts.entry(student.id).or_insert(0);
        *count += 1;

        if *count == self.confirmation_threshold {
            tracing::info!(
                student = %student.name,
                sightings = *count,
                "identity confirmed"
            );
            Some(ConfirmedIdentity {
                student: student.clone(),
                confirmed_at: obs.observed_at,
            })
        } else {
            tracing::trace!(
                student = %student.name,
                sightings = *count,
                "sighting counted"
            );
            None
        }
    }

    /// Accepted sightings so far for a student (0 if never sighted).
    pub fn sighting_count(&self, student_id: i64) -> u32 {
        self.counts.get(&student_id).copied().unwrap_or(0)
    }

    /// Number of identities that have reached the confirmation threshold.
    pub fn confirmed_count(&self) -> usize {
        self.counts
            .values()
            .filter(|&&c| c >= self.confirmation_threshold)
            .count()
    }
}
