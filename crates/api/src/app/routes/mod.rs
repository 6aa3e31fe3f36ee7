use axum::Router;

pub mod courses;
pub mod students;
pub mod system;

/// Router for the resource endpoints.
pub fn router() -> Router {
    Router::new()
        .merge(courses::router())
        .merge(students::router())
}
