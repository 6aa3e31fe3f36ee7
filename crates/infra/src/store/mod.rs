//! Course/student persistence boundary.
//!
//! Handlers only see `CourseStore`; the backend (in-memory for dev/test,
//! Postgres for persistent deployments) is picked at startup.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use campus_core::{CourseId, DomainError, StudentId};
use campus_courses::{Course, CourseDraft, CourseFilter, CoursePatch, EnrollmentLimits, Student, StudentDraft};

pub use in_memory::InMemoryCourseStore;
pub use postgres::PostgresCourseStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Deterministic failure (not found, validation) raised by the store or the domain.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backend failed (connection, SQL, poisoned lock).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Domain(DomainError::NotFound(_)))
    }
}

/// Validation error for a student id that does not resolve.
pub(crate) fn unknown_student(id: StudentId) -> StoreError {
    DomainError::validation(format!("invalid student id {id}: object does not exist")).into()
}

/// Persistence operations for courses and the students they enroll.
///
/// Every method is a single atomic operation against the backend. Lists are
/// ordered by ascending id.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn list_courses(&self, filter: &CourseFilter) -> StoreResult<Vec<Course>>;

    async fn get_course(&self, id: CourseId) -> StoreResult<Course>;

    /// Insert a course; every enrolled student must exist.
    async fn create_course(&self, draft: CourseDraft) -> StoreResult<Course>;

    /// Apply a partial update atomically (read, merge, validate, write).
    async fn update_course(
        &self,
        id: CourseId,
        patch: &CoursePatch,
        limits: &EnrollmentLimits,
    ) -> StoreResult<Course>;

    /// Remove a course and its enrollments (students are kept).
    async fn delete_course(&self, id: CourseId) -> StoreResult<()>;

    async fn count_courses(&self) -> StoreResult<u64>;

    async fn list_students(&self) -> StoreResult<Vec<Student>>;

    async fn get_student(&self, id: StudentId) -> StoreResult<Student>;

    async fn create_student(&self, draft: StudentDraft) -> StoreResult<Student>;

    /// Remove a student and unenroll it from every course.
    async fn delete_student(&self, id: StudentId) -> StoreResult<()>;
}
