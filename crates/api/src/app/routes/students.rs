use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use campus_core::StudentId;
use campus_courses::StudentDraft;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/students/", get(list_students).post(create_student))
        .route("/students/:id/", get(get_student).delete(delete_student))
}

pub async fn list_students(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().list_students().await {
        Ok(students) => {
            let items = students.into_iter().map(dto::student_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_student(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StudentId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().get_student(id).await {
        Ok(student) => (StatusCode::OK, Json(dto::student_to_json(student))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_student(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateStudentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection_to_response(rejection),
    };

    let draft = match StudentDraft::new(&body.name, body.birth_date) {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().create_student(draft).await {
        Ok(student) => (StatusCode::CREATED, Json(dto::student_to_json(student))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_student(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StudentId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().delete_student(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
