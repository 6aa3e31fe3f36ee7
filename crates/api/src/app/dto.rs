use chrono::NaiveDate;
use serde::Deserialize;

use campus_core::{CourseId, StudentId};
use campus_courses::{Course, CourseFilter, Student};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub name: String,
    #[serde(default)]
    pub students: Vec<StudentId>,
}

/// PATCH body: omitted fields keep their stored value; an explicit `null` is rejected.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCourseRequest {
    #[serde(default, deserialize_with = "non_null")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub students: Option<Vec<StudentId>>,
}

// Only runs when the key is present; absence falls back to `None` via `default`.
fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Option::<T>::deserialize(deserializer)? {
        Some(value) => Ok(Some(value)),
        None => Err(serde::de::Error::custom("this field may not be null")),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// Raw `GET /courses/` query string. Values are parsed by hand so that a bad
/// filter gets a JSON error and an empty value means "no filter".
#[derive(Debug, Default)]
pub struct ListCoursesQuery {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl ListCoursesQuery {
    /// Collect known keys from decoded query pairs. A repeated key keeps its
    /// last value; unknown keys are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "id" => query.id = Some(value),
                "name" => query.name = Some(value),
                _ => {}
            }
        }
        query
    }

    pub fn into_filter(self) -> Result<CourseFilter, axum::response::Response> {
        let id = match self.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<CourseId>().map_err(|_| {
                errors::json_error(
                    axum::http::StatusCode::BAD_REQUEST,
                    "invalid_filter",
                    format!("id filter must be an integer, got {raw:?}"),
                )
            })?),
        };
        let name = self.name.filter(|n| !n.is_empty());
        Ok(CourseFilter { id, name })
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn course_to_json(course: Course) -> serde_json::Value {
    serde_json::json!({
        "id": course.id,
        "name": course.name,
        "students": course.students,
    })
}

pub fn student_to_json(student: Student) -> serde_json::Value {
    serde_json::json!({
        "id": student.id,
        "name": student.name,
        "birth_date": student.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
    })
}
