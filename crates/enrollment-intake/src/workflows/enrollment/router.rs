use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use super::brackets::{AgeBracketService, BracketAdminError};
use super::domain::{AgeBracketId, EnrollmentId};
use super::intake::{EnrollmentIntakeService, IntakeError};
use super::queue::MessageQueue;
use super::repository::{AgeBracketStore, EnrollmentRepository};

/// Shared handler state: bracket admin and enrollment intake over the same bracket store.
pub struct EnrollmentApi<B, R, Q> {
    pub brackets: Arc<AgeBracketService<B>>,
    pub intake: Arc<EnrollmentIntakeService<B, R, Q>>,
}

impl<B, R, Q> Clone for EnrollmentApi<B, R, Q> {
    fn clone(&self) -> Self {
        Self {
            brackets: self.brackets.clone(),
            intake: self.intake.clone(),
        }
    }
}

/// Router builder exposing the age-group and enrollment endpoints.
pub fn enrollment_router<B, R, Q>(api: EnrollmentApi<B, R, Q>) -> Router
where
    B: AgeBracketStore + 'static,
    R: EnrollmentRepository + 'static,
    Q: MessageQueue + 'static,
{
    Router::new()
        .route(
            "/api/v1/age-groups",
            post(create_age_group_handler::<B, R, Q>).get(list_age_groups_handler::<B, R, Q>),
        )
        .route(
            "/api/v1/age-groups/:id",
            delete(delete_age_group_handler::<B, R, Q>),
        )
        .route(
            "/api/v1/enrollments",
            post(request_enrollment_handler::<B, R, Q>),
        )
        .route(
            "/api/v1/enrollments/:id",
            get(enrollment_status_handler::<B, R, Q>),
        )
        .with_state(api)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

pub(crate) async fn create_age_group_handler<B, R, Q>(
    State(api): State<EnrollmentApi<B, R, Q>>,
    body: Bytes,
) -> Response
where
    B: AgeBracketStore + 'static,
    R: EnrollmentRepository + 'static,
    Q: MessageQueue + 'static,
{
    match api.brackets.create(&body) {
        Ok(bracket) => (StatusCode::CREATED, Json(json!({ "id": bracket.id }))).into_response(),
        Err(err @ BracketAdminError::BadRequest(_)) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(other) => {
            error!(error = %other, "failed to create age group");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub(crate) async fn list_age_groups_handler<B, R, Q>(
    State(api): State<EnrollmentApi<B, R, Q>>,
) -> Response
where
    B: AgeBracketStore + 'static,
    R: EnrollmentRepository + 'static,
    Q: MessageQueue + 'static,
{
    match api.brackets.list() {
        Ok(brackets) => (StatusCode::OK, Json(brackets)).into_response(),
        Err(other) => {
            error!(error = %other, "failed to list age groups");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub(crate) async fn delete_age_group_handler<B, R, Q>(
    State(api): State<EnrollmentApi<B, R, Q>>,
    Path(id): Path<String>,
) -> Response
where
    B: AgeBracketStore + 'static,
    R: EnrollmentRepository + 'static,
    Q: MessageQueue + 'static,
{
    let id = AgeBracketId(id);
    match api.brackets.delete(&id) {
        Ok(()) => {
            let payload = json!({
                "message": format!("Age group {id} deleted successfully"),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(BracketAdminError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Item not found")
        }
        Err(other) => {
            error!(error = %other, age_group_id = %id, "failed to delete age group");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub(crate) async fn request_enrollment_handler<B, R, Q>(
    State(api): State<EnrollmentApi<B, R, Q>>,
    body: Bytes,
) -> Response
where
    B: AgeBracketStore + 'static,
    R: EnrollmentRepository + 'static,
    Q: MessageQueue + 'static,
{
    match api.intake.submit(&body) {
        Ok(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(err) if err.is_validation() => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(other) => {
            error!(error = %other, "failed to request enrollment");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub(crate) async fn enrollment_status_handler<B, R, Q>(
    State(api): State<EnrollmentApi<B, R, Q>>,
    Path(id): Path<String>,
) -> Response
where
    B: AgeBracketStore + 'static,
    R: EnrollmentRepository + 'static,
    Q: MessageQueue + 'static,
{
    let id = EnrollmentId(id);
    match api.intake.status(&id) {
        Ok(enrollment) => (StatusCode::OK, Json(enrollment)).into_response(),
        Err(IntakeError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Enrollment not found")
        }
        Err(other) => {
            error!(error = %other, enrollment_id = %id, "failed to fetch enrollment");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
