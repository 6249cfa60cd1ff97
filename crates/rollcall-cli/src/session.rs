//! Attendance session pipeline.
//!
//! Two stages joined by a bounded queue: an acquisition thread pulling
//! observations from the recognition source, and the controller loop
//! consuming them in arrival order, feeding the aggregator and
//! committing confirmations to the ledger. The session runs under a
//! wall-clock deadline; a full queue blocks acquisition rather than
//! dropping observations, since drops would corrupt confirmation
//! counts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;

use rollcall_core::aggregator::IdentityAggregator;
use rollcall_core::source::RecognitionSource;
use rollcall_core::types::{Course, RecognitionObservation};
use rollcall_store::{MarkOutcome, Store, StoreError};

use crate::report::{self, ReconciliationReport};

/// Upper bound on how long a stop signal or deadline can go unobserved
/// while the queue is idle.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to spawn acquisition stage: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Why a session left the `Running` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    DeadlineExpired,
    SourceEnded,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
}

pub struct SessionSummary {
    pub course_id: i64,
    pub started_at: DateTime<Utc>,
    pub end_reason: EndReason,
    pub observations: u64,
    pub confirmed: usize,
    pub committed: usize,
    pub already_present: usize,
    pub commit_failures: usize,
    pub report: ReconciliationReport,
}

/// Owns the wall-clock window and the pipeline for one session.
/// `Idle -> Running -> Completed`; `Completed` is terminal for the
/// run, and a controller can be reused for the next session.
pub struct SessionController {
    duration: Duration,
    queue_depth: usize,
    state: SessionState,
}

impl SessionController {
    pub fn new(duration: Duration, queue_depth: usize) -> Self {
        Self {
            duration,
            // Zero-capacity rendezvous channels stall the pipeline.
            queue_depth: queue_depth.max(1),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one attendance session to completion and reconcile the
    /// roster.
    ///
    /// Transient commit failures are logged and never abort the
    /// session; the affected student simply stays absent for this run.
    /// The report is generated exactly once, on every completion path.
    pub fn run(
        &mut self,
        source: Box<dyn RecognitionSource + Send>,
        mut aggregator: IdentityAggregator,
        store: &Store,
        course: &Course,
        stop: Arc<AtomicBool>,
    ) -> Result<SessionSummary, SessionError> {
        let started_at = Utc::now();
        let deadline = Instant::now() + self.duration;
        self.state = SessionState::Running;
        tracing::info!(
            course = %course.name,
            duration_secs = self.duration.as_secs(),
            "attendance session started"
        );

        let (tx, rx) = sync_channel::<RecognitionObservation>(self.queue_depth);
        let acquisition_stop = stop.clone();
        let acquisition = thread::Builder::new()
            .name("rollcall-acquire".into())
            .spawn(move || acquisition_stage(source, tx, acquisition_stop))?;

        let mut observations = 0u64;
        let mut confirmed = 0usize;
        let mut committed = 0usize;
        let mut already_present = 0usize;
        let mut commit_failures = 0usize;

        let end_reason = loop {
            if stop.load(Ordering::Relaxed) {
                break EndReason::Stopped;
            }
            let now = Instant::now();
            if now >= deadline {
                break EndReason::DeadlineExpired;
            }

            let wait = (deadline - now).min(STOP_POLL_INTERVAL);
            match rx.recv_timeout(wait) {
                Ok(obs) => {
                    observations += 1;
                    let Some(identity) = aggregator.observe(&obs) else {
                        continue;
                    };
                    confirmed += 1;

                    match store.mark_present(identity.student.id, course.id, identity.confirmed_at)
                    {
                        Ok(MarkOutcome::Committed) => {
                            committed += 1;
                            tracing::info!(
                                student = %identity.student.name,
                                course = %course.name,
                                "attendance committed"
                            );
                        }
                        Ok(MarkOutcome::AlreadyPresent) => {
                            already_present += 1;
                            tracing::debug!(
                                student = %identity.student.name,
                                "already marked present for this course"
                            );
                        }
                        Err(err) => {
                            commit_failures += 1;
                            tracing::error!(
                                student = %identity.student.name,
                                error = %err,
                                "commit failed; student stays absent for this session"
                            );
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break EndReason::SourceEnded,
            }
        };

        // Release the acquisition stage on every exit path: raise the
        // stop flag, drop the receiver to unblock a pending send, then
        // join so the source (and its capture device) is dropped before
        // reconciliation.
        stop.store(true, Ordering::Relaxed);
        drop(rx);
        if acquisition.join().is_err() {
            tracing::error!("acquisition stage panicked; continuing to reconciliation");
        }

        self.state = SessionState::Completed;
        tracing::info!(
            ?end_reason,
            observations,
            confirmed,
            committed,
            commit_failures,
            "attendance session ended"
        );

        let report = report::generate(store, course)?;
        Ok(SessionSummary {
            course_id: course.id,
            started_at,
            end_reason,
            observations,
            confirmed,
            committed,
            already_present,
            commit_failures,
            report,
        })
    }
}

/// Acquisition stage: pulls observations until the source ends, the
/// stop flag is raised, or the consumer goes away. May block on a full
/// queue (backpressure) or for the duration of one frame's processing
/// inside the source; holds no lock shared with the ledger.
fn acquisition_stage(
    mut source: Box<dyn RecognitionSource + Send>,
    tx: SyncSender<RecognitionObservation>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        match source.next_observation() {
            Ok(Some(obs)) => {
                if tx.send(obs).is_err() {
                    // Consumer gone: the session is over.
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("recognition source ended");
                break;
            }
            Err(err) => {
                // A single bad frame must not end the session.
                tracing::warn!(error = %err, "observation skipped");
            }
        }
    }
    // Dropping the source here releases the capture device.
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::source::SourceError;
    use rollcall_core::types::Student;
    use std::collections::{HashMap, VecDeque};

    struct VecSource(VecDeque<RecognitionObservation>);

    impl RecognitionSource for VecSource {
        fn next_observation(&mut self) -> Result<Option<RecognitionObservation>, SourceError> {
            Ok(self.0.pop_front())
        }
    }

    /// Never ends; yields an unknown observation per simulated frame.
    struct EndlessSource;

    impl RecognitionSource for EndlessSource {
        fn next_observation(&mut self) -> Result<Option<RecognitionObservation>, SourceError> {
            thread::sleep(Duration::from_millis(5));
            Ok(Some(obs(1, 95.0)))
        }
    }

    fn obs(label: i32, dissimilarity: f64) -> RecognitionObservation {
        RecognitionObservation {
            label,
            dissimilarity,
            observed_at: Utc::now(),
        }
    }

    fn seeded_store() -> (Store, Vec<Student>, Course) {
        let store = Store::open_in_memory().unwrap();
        let asha = store.insert_student("Asha").unwrap();
        let ravi = store.insert_student("Ravi").unwrap();
        let course = store.insert_course("Databases").unwrap();
        (store, vec![asha, ravi], course)
    }

    fn identities(students: &[Student]) -> HashMap<i32, Student> {
        students
            .iter()
            .enumerate()
            .map(|(i, s)| (i as i32 + 1, s.clone()))
            .collect()
    }

    fn run_session(
        source: Box<dyn RecognitionSource + Send>,
        duration: Duration,
    ) -> (SessionSummary, Store, Course) {
        let (store, students, course) = seeded_store();
        let aggregator = IdentityAggregator::new(identities(&students));
        let mut controller = SessionController::new(duration, 8);
        let summary = controller
            .run(
                source,
                aggregator,
                &store,
                &course,
                Arc::new(AtomicBool::new(false)),
            )
            .unwrap();
        assert_eq!(controller.state(), SessionState::Completed);
        (summary, store, course)
    }

    #[test]
    fn test_concrete_scenario_single_confirmation() {
        // Three accepted sightings of label 1, then the stream ends.
        let source = VecSource(VecDeque::from(vec![
            obs(1, 40.0),
            obs(1, 40.0),
            obs(1, 40.0),
        ]));
        let (summary, store, course) = run_session(Box::new(source), Duration::from_secs(5));

        assert_eq!(summary.end_reason, EndReason::SourceEnded);
        assert_eq!(summary.confirmed, 1);
        assert_eq!(summary.committed, 1);
        assert_eq!(summary.commit_failures, 0);

        let asha = store.find_student_by_name("Asha").unwrap().unwrap();
        assert!(store.find_attendance(asha.id, course.id).unwrap().is_some());

        // Report is total over the roster, in roster order.
        let rows = &summary.report.rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student_name, "Asha");
        assert!(rows[0].present);
        assert!(rows[0].marked_at.is_some());
        assert_eq!(rows[1].student_name, "Ravi");
        assert!(!rows[1].present);
        assert!(rows[1].marked_at.is_none());
    }

    #[test]
    fn test_two_sightings_confirm_nothing() {
        let source = VecSource(VecDeque::from(vec![obs(1, 40.0), obs(1, 40.0)]));
        let (summary, ..) = run_session(Box::new(source), Duration::from_secs(5));

        assert_eq!(summary.confirmed, 0);
        assert_eq!(summary.committed, 0);
        assert!(summary.report.rows.iter().all(|r| !r.present));
    }

    #[test]
    fn test_repeat_sightings_commit_once() {
        // Six accepted sightings: one confirmation, one commit.
        let source = VecSource(VecDeque::from(vec![obs(1, 40.0); 6]));
        let (summary, ..) = run_session(Box::new(source), Duration::from_secs(5));

        assert_eq!(summary.confirmed, 1);
        assert_eq!(summary.committed, 1);
        assert_eq!(summary.already_present, 0);
    }

    #[test]
    fn test_ledger_defends_against_prior_record() {
        // Student already marked before the session: the ledger
        // reports AlreadyPresent rather than duplicating the row.
        let (store, students, course) = seeded_store();
        store
            .mark_present(students[0].id, course.id, Utc::now())
            .unwrap();

        let aggregator = IdentityAggregator::new(identities(&students));
        let mut controller = SessionController::new(Duration::from_secs(5), 8);
        let source = VecSource(VecDeque::from(vec![obs(1, 40.0); 3]));
        let summary = controller
            .run(
                Box::new(source),
                aggregator,
                &store,
                &course,
                Arc::new(AtomicBool::new(false)),
            )
            .unwrap();

        assert_eq!(summary.confirmed, 1);
        assert_eq!(summary.committed, 0);
        assert_eq!(summary.already_present, 1);
    }

    #[test]
    fn test_deadline_terminates_endless_source() {
        let started = Instant::now();
        let (summary, ..) = run_session(Box::new(EndlessSource), Duration::from_millis(80));

        assert_eq!(summary.end_reason, EndReason::DeadlineExpired);
        // Bounded by the deadline plus one poll interval, with margin.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.committed, 0);
        assert_eq!(summary.report.rows.len(), 2);
    }

    #[test]
    fn test_stop_signal_observed() {
        let (store, students, course) = seeded_store();
        let aggregator = IdentityAggregator::new(identities(&students));
        let mut controller = SessionController::new(Duration::from_secs(60), 8);

        let stop = Arc::new(AtomicBool::new(false));
        let trigger = stop.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            trigger.store(true, Ordering::Relaxed);
        });

        let started = Instant::now();
        let summary = controller
            .run(Box::new(EndlessSource), aggregator, &store, &course, stop)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(summary.end_reason, EndReason::Stopped);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(controller.state(), SessionState::Completed);
    }

    #[test]
    fn test_backpressure_does_not_drop_observations() {
        // Queue depth 1 with six quick sightings of two students:
        // every observation must still arrive, in order.
        let observations: Vec<_> = (0..3)
            .flat_map(|_| (1..=2).map(|label| obs(label, 30.0)))
            .collect();
        let source = VecSource(VecDeque::from(observations));

        let (store, students, course) = seeded_store();
        let aggregator = IdentityAggregator::new(identities(&students));
        let mut controller = SessionController::new(Duration::from_secs(5), 1);
        let summary = controller
            .run(
                Box::new(source),
                aggregator,
                &store,
                &course,
                Arc::new(AtomicBool::new(false)),
            )
            .unwrap();

        assert_eq!(summary.observations, 6);
        assert_eq!(summary.confirmed, 2);
        assert_eq!(summary.committed, 2);
        assert!(summary.report.rows.iter().all(|r| r.present));
    }
}
