use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use rollcall_core::types::{Course, Student};

use crate::error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    student_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS courses (
    course_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS attendance_log (
    student_id INTEGER NOT NULL REFERENCES students(student_id),
    course_id  INTEGER NOT NULL REFERENCES courses(course_id),
    marked_at  TEXT NOT NULL,
    UNIQUE (student_id, course_id)
);
";

/// Outcome of an idempotent mark-present call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new attendance record was inserted.
    Committed,
    /// A record for this (student, course) already exists; nothing
    /// was written.
    AlreadyPresent,
}

/// Roster and ledger handle. All calls run on one logical thread per
/// session; each call is its own unit of work, no cross-call
/// transaction.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the attendance database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::init(conn)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // --- roster ---

    /// First-enrollment insert, idempotent by name: returns the
    /// existing student if the name is already enrolled.
    pub fn insert_student(&self, name: &str) -> Result<Student, StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO students (name) VALUES (?1)",
            params![name],
        )?;
        let student = self.conn.query_row(
            "SELECT student_id, name FROM students WHERE name = ?1",
            params![name],
            |row| {
                Ok(Student {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )?;
        Ok(student)
    }

    pub fn find_student_by_name(&self, name: &str) -> Result<Option<Student>, StoreError> {
        let student = self
            .conn
            .query_row(
                "SELECT student_id, name FROM students WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Student {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(student)
    }

    /// All enrolled students in roster (creation) order.
    pub fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT student_id, name FROM students ORDER BY student_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Student {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert_course(&self, name: &str) -> Result<Course, StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO courses (name) VALUES (?1)",
            params![name],
        )?;
        let course = self.conn.query_row(
            "SELECT course_id, name FROM courses WHERE name = ?1",
            params![name],
            |row| {
                Ok(Course {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )?;
        Ok(course)
    }

    pub fn find_course(&self, course_id: i64) -> Result<Option<Course>, StoreError> {
        let course = self
            .conn
            .query_row(
                "SELECT course_id, name FROM courses WHERE course_id = ?1",
                params![course_id],
                |row| {
                    Ok(Course {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(course)
    }

    pub fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT course_id, name FROM courses ORDER BY course_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Course {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // --- ledger ---

    /// Timestamp of the committed attendance record for this
    /// (student, course), if any.
    pub fn find_attendance(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let marked_at: Option<String> = self
            .conn
            .query_row(
                "SELECT marked_at FROM attendance_log WHERE student_id = ?1 AND course_id = ?2",
                params![student_id, course_id],
                |row| row.get(0),
            )
            .optional()?;

        marked_at
            .map(|text| {
                DateTime::parse_from_rfc3339(&text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| StoreError::BadTimestamp(text))
            })
            .transpose()
    }

    /// Idempotent mark-present: check for an existing record, insert
    /// only if absent. Never produces a duplicate row and never errors
    /// on a repeat call.
    pub fn mark_present(
        &self,
        student_id: i64,
        course_id: i64,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        if self.find_attendance(student_id, course_id)?.is_some() {
            return Ok(MarkOutcome::AlreadyPresent);
        }

        self.conn.execute(
            "INSERT INTO attendance_log (student_id, course_id, marked_at) VALUES (?1, ?2, ?3)",
            params![student_id, course_id, at.to_rfc3339()],
        )?;
        tracing::debug!(student_id, course_id, "attendance record inserted");
        Ok(MarkOutcome::Committed)
    }
}
