//! Roster reconciliation and CSV report output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use rollcall_core::types::Course;
use rollcall_store::{Store, StoreError};

/// One roster row: every enrolled student appears exactly once,
/// whether or not they produced any observation during the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub student_name: String,
    pub present: bool,
    pub marked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub course_id: i64,
    pub course_name: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
}

impl ReconciliationReport {
    pub fn present_count(&self) -> usize {
        self.rows.iter().filter(|r| r.present).count()
    }

    pub fn absent_count(&self) -> usize {
        self.rows.len() - self.present_count()
    }
}

/// Reconcile the full roster against the ledger's records for the
/// course. Rows come out in roster (creation) order, not resorted.
pub fn generate(store: &Store, course: &Course) -> Result<ReconciliationReport, StoreError> {
    let mut rows = Vec::new();
    for student in store.list_students()? {
        let marked_at = store.find_attendance(student.id, course.id)?;
        rows.push(ReportRow {
            student_name: student.name,
            present: marked_at.is_some(),
            marked_at,
        });
    }

    Ok(ReconciliationReport {
        course_id: course.id,
        course_name: course.name.clone(),
        generated_at: Utc::now(),
        rows,
    })
}

pub fn csv_file_name(course_id: i64) -> String {
    format!("attendance_report_course_{course_id}.csv")
}

/// Write the report as CSV into `dir`, returning the file path.
/// Present rows carry an RFC 3339 timestamp; absent rows leave the
/// field empty.
pub fn write_csv(report: &ReconciliationReport, dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(csv_file_name(report.course_id));

    let mut out = String::from("Student Name,Attendance,Date & Time\n");
    for row in &report.rows {
        match &row.marked_at {
            Some(ts) => {
                let stamp = ts.to_rfc3339_opts(SecondsFormat::Secs, true);
                out.push_str(&format!("{},P,{}\n", row.student_name, stamp));
            }
            None => out.push_str(&format!("{},A,\n", row.student_name)),
        }
    }

    std::fs::write(&path, out)?;
    tracing::info!(path = %path.display(), rows = report.rows.len(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seeded() -> (Store, Course) {
        let store = Store::open_in_memory().unwrap();
        for name in ["Asha", "Ravi", "Meera"] {
            store.insert_student(name).unwrap();
        }
        let course = store.insert_course("Databases").unwrap();
        (store, course)
    }

    #[test]
    fn test_total_roster_coverage() {
        let (store, course) = seeded();
        let ravi = store.find_student_by_name("Ravi").unwrap().unwrap();
        store.mark_present(ravi.id, course.id, Utc::now()).unwrap();

        let report = generate(&store, &course).unwrap();
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.present_count(), 1);
        assert_eq!(report.absent_count(), 2);

        let names: Vec<&str> = report.rows.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["Asha", "Ravi", "Meera"]);
        assert!(report.rows[1].present);
        assert!(!report.rows[0].present && !report.rows[2].present);
    }

    #[test]
    fn test_empty_course_all_absent() {
        let (store, course) = seeded();
        let report = generate(&store, &course).unwrap();
        assert_eq!(report.present_count(), 0);
        assert!(report.rows.iter().all(|r| r.marked_at.is_none()));
    }

    #[test]
    fn test_csv_format() {
        let (store, course) = seeded();
        let asha = store.find_student_by_name("Asha").unwrap().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 8, 25, 9, 30, 0).unwrap();
        store.mark_present(asha.id, course.id, at).unwrap();

        let report = generate(&store, &course).unwrap();

        let dir = std::env::temp_dir().join(format!("rollcall-csv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_csv(&report, &dir).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("attendance_report_course_{}.csv", course.id)
        );

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Student Name,Attendance,Date & Time");
        assert_eq!(lines[1], "Asha,P,2026-08-25T09:30:00Z");
        assert_eq!(lines[2], "Ravi,A,");
        assert_eq!(lines[3], "Meera,A,");
        assert_eq!(lines.len(), 4);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_report_serializes_to_json() {
        let (store, course) = seeded();
        let report = generate(&store, &course).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"student_name\":\"Asha\""));
        assert!(json.contains("\"present\":false"));
    }
}
