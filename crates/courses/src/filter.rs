use campus_core::CourseId;

use crate::course::Course;

/// Exact-match filter for course listings. Set fields are combined with AND;
/// an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub id: Option<CourseId>,
    pub name: Option<String>,
}

impl CourseFilter {
    pub fn by_id(id: CourseId) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }

    pub fn matches(&self, course: &Course) -> bool {
        self.id.is_none_or(|id| course.id == id)
            && self.name.as_deref().is_none_or(|name| course.name == name)
    }
}
