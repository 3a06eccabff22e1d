//! # Domain Types
//!
//! Typed school records, one per synchronized entity.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │   User ◄──── Teacher ◄──── Course ◄──── Exam                           │
//! │     ▲           ▲                                                       │
//! │     │           └──── SchoolClass ◄──── Student ◄──── Fee              │
//! │     │                                      ▲                            │
//! │     └──────────────────────────────────────┘◄──── AttendanceRecord     │
//! │                                                                         │
//! │   Arrows point at the record's parent_id (the indexed lookup key).     │
//! │   References are NOT enforced by the cache: a student can land before  │
//! │   its class and the link resolves once classes sync.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names are camelCase on the wire, matching the documents written by
//! the mobile clients.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityKind, Role, SyncRecord};

// =============================================================================
// User
// =============================================================================

/// An account that can sign in to the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

impl SyncRecord for User {
    const ENTITY: EntityKind = EntityKind::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Teacher
// =============================================================================

/// Teaching staff profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    /// Linked login account, if the teacher has one.
    pub user_id: Option<String>,
    pub full_name: String,
    pub subject: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl SyncRecord for Teacher {
    const ENTITY: EntityKind = EntityKind::Teachers;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

// =============================================================================
// Student
// =============================================================================

/// Enrolled student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub user_id: Option<String>,
    pub full_name: String,
    /// Class the student is enrolled in.
    pub class_id: Option<String>,
    pub roll_number: Option<String>,
    pub guardian_phone: Option<String>,
}

impl SyncRecord for Student {
    const ENTITY: EntityKind = EntityKind::Students;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.class_id.as_deref()
    }
}

// =============================================================================
// Course
// =============================================================================

/// A course taught by one teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub credits: u32,
}

impl SyncRecord for Course {
    const ENTITY: EntityKind = EntityKind::Courses;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.teacher_id.as_deref()
    }
}

// =============================================================================
// School Class
// =============================================================================

/// A class (grade + section) with an optional class teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    pub class_teacher_id: Option<String>,
}

impl SyncRecord for SchoolClass {
    const ENTITY: EntityKind = EntityKind::Classes;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.class_teacher_id.as_deref()
    }
}

// =============================================================================
// Attendance
// =============================================================================

/// Attendance mark for one student on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

/// One attendance entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub class_id: Option<String>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

impl SyncRecord for AttendanceRecord {
    const ENTITY: EntityKind = EntityKind::Attendance;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.student_id)
    }
}

// =============================================================================
// Exam
// =============================================================================

/// A scheduled exam for a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub exam_date: NaiveDate,
    pub max_marks: u32,
}

impl SyncRecord for Exam {
    const ENTITY: EntityKind = EntityKind::Exams;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.course_id)
    }
}

// =============================================================================
// Fee
// =============================================================================

/// Payment state of a fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Pending,
    Paid,
    Overdue,
    Waived,
}

/// A fee charged to a student. Amounts are integer cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    pub id: String,
    pub student_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub status: FeeStatus,
}

impl SyncRecord for Fee {
    const ENTITY: EntityKind = EntityKind::Fees;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_student_from_camel_case_document() {
        let doc = json!({
            "id": "s-1",
            "fullName": "Grace Hopper",
            "classId": "c-7",
            "rollNumber": "17"
        });

        let student: Student = serde_json::from_value(doc).unwrap();
        assert_eq!(student.class_id.as_deref(), Some("c-7"));
        assert_eq!(student.parent_id(), Some("c-7"));
        assert!(student.guardian_phone.is_none());
    }

    #[test]
    fn test_exam_schema_mismatch_is_an_error() {
        // max_marks as a string is what an outdated client used to write
        let doc = json!({
            "id": "e-1",
            "courseId": "c-1",
            "title": "Midterm",
            "examDate": "2026-03-02",
            "maxMarks": "one hundred"
        });

        assert!(serde_json::from_value::<Exam>(doc).is_err());
    }

    #[test]
    fn test_course_credits_default() {
        let doc = json!({ "id": "c-1", "code": "MATH101", "name": "Algebra" });
        let course: Course = serde_json::from_value(doc).unwrap();
        assert_eq!(course.credits, 0);
        assert_eq!(course.parent_id(), None);
    }
}
