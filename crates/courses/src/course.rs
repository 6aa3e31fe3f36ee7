use campus_core::{CourseId, DomainError, DomainResult, Entity, StudentId};

use crate::validation::{dedup_ids, normalize_name};

/// Default cap on enrolled students per course.
pub const DEFAULT_MAX_STUDENTS: usize = 20;

/// Enrollment rules applied to every course write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EnrollmentLimits {
    pub max_students: usize,
}

impl EnrollmentLimits {
    pub fn new(max_students: usize) -> Self {
        Self { max_students }
    }
}

impl Default for EnrollmentLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STUDENTS)
    }
}

/// A stored course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    /// Enrolled students, unique, in enrollment order.
    pub students: Vec<StudentId>,
}

impl Entity for Course {
    type Id = CourseId;
    const KIND: &'static str = "course";

    fn id(&self) -> CourseId {
        self.id
    }
}

/// Validated field values for a course that has not been given an id yet
/// (create), or that will overwrite an existing course (update).
///
/// Student ids are checked for uniqueness and the enrollment cap here; whether
/// they refer to existing students is the store's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDraft {
    name: String,
    students: Vec<StudentId>,
}

impl CourseDraft {
    pub fn new(
        name: &str,
        students: impl IntoIterator<Item = StudentId>,
        limits: &EnrollmentLimits,
    ) -> DomainResult<Self> {
        let name = normalize_name("name", name)?;
        let students = dedup_ids(students);
        if students.len() > limits.max_students {
            return Err(DomainError::validation(format!(
                "a course can have at most {} students, got {}",
                limits.max_students,
                students.len()
            )));
        }
        Ok(Self { name, students })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn students(&self) -> &[StudentId] {
        &self.students
    }

    pub fn into_course(self, id: CourseId) -> Course {
        Course {
            id,
            name: self.name,
            students: self.students,
        }
    }
}

/// Partial update: `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursePatch {
    pub name: Option<String>,
    pub students: Option<Vec<StudentId>>,
}

impl CoursePatch {
    /// Patch that overwrites every mutable field (full replacement).
    pub fn replace(name: String, students: Vec<StudentId>) -> Self {
        Self {
            name: Some(name),
            students: Some(students),
        }
    }

    /// Merge the patch over `current` and validate the result.
    pub fn apply(&self, current: &Course, limits: &EnrollmentLimits) -> DomainResult<CourseDraft> {
        let name = self.name.as_deref().unwrap_or(&current.name);
        let students = self
            .students
            .clone()
            .unwrap_or_else(|| current.students.clone());
        CourseDraft::new(name, students, limits)
    }

    /// Whether applying the patch may change enrollment rows.
    pub fn touches_students(&self) -> bool {
        self.students.is_some()
    }
}
