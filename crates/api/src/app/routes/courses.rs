use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use campus_core::CourseId;
use campus_courses::{CourseDraft, CoursePatch};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/courses/", get(list_courses).post(create_course))
        .route(
            "/courses/:id/",
            get(get_course)
                .patch(update_course)
                .put(replace_course)
                .delete(delete_course),
        )
}

pub async fn list_courses(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> axum::response::Response {
    let Query(pairs) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };

    let filter = match dto::ListCoursesQuery::from_pairs(pairs).into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services.store().list_courses(&filter).await {
        Ok(courses) => {
            let items = courses.into_iter().map(dto::course_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_course(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CourseId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().get_course(id).await {
        Ok(course) => (StatusCode::OK, Json(dto::course_to_json(course))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_course(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateCourseRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection_to_response(rejection),
    };

    let draft = match CourseDraft::new(&body.name, body.students, services.limits()) {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().create_course(draft).await {
        Ok(course) => (StatusCode::CREATED, Json(dto::course_to_json(course))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_course(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateCourseRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection_to_response(rejection),
    };

    let patch = CoursePatch {
        name: body.name,
        students: body.students,
    };
    apply_patch(services, id, patch).await
}

/// Full replacement: fields missing from the body are reset (students to empty).
pub async fn replace_course(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::CreateCourseRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection_to_response(rejection),
    };

    apply_patch(services, id, CoursePatch::replace(body.name, body.students)).await
}

pub async fn delete_course(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CourseId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().delete_course(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

async fn apply_patch(
    services: Arc<AppServices>,
    id: String,
    patch: CoursePatch,
) -> axum::response::Response {
    let id: CourseId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .store()
        .update_course(id, &patch, services.limits())
        .await
    {
        Ok(course) => (StatusCode::OK, Json(dto::course_to_json(course))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
