//! Courses domain module (courses, students, enrollment rules).
//!
//! This crate contains the business rules for courses and students,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod course;
pub mod filter;
pub mod student;
pub mod validation;

pub use course::{Course, CourseDraft, CoursePatch, EnrollmentLimits};
pub use filter::CourseFilter;
pub use student::{Student, StudentDraft};
