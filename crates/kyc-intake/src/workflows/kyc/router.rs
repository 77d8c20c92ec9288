use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Attachment, AttachmentSlot, Field, COUNTRY_OPTIONS, DOCUMENT_TYPE_OPTIONS};
use super::gateway::{Notifier, SubmissionGateway};
use super::service::{KycIntakeService, ServiceError, SessionId};
use super::uploads::SlotStatus;
use super::wizard::{StepOutcome, SubmitOutcome, WizardError};

/// Header carrying the original file name of a raw attachment upload.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Large enough for a document scan at the highest configured cap plus headroom.
const ATTACHMENT_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub(crate) struct FieldChange {
    field: Field,
    value: String,
}

/// Router builder exposing the headless wizard session API.
pub fn kyc_router<G, N>(service: Arc<KycIntakeService<G, N>>) -> Router
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/kyc/options", get(options_handler))
        .route("/api/v1/kyc/sessions", post(start_handler::<G, N>))
        .route(
            "/api/v1/kyc/sessions/:session_id",
            get(view_handler::<G, N>).delete(close_handler::<G, N>),
        )
        .route(
            "/api/v1/kyc/sessions/:session_id/fields",
            put(field_handler::<G, N>),
        )
        .route(
            "/api/v1/kyc/sessions/:session_id/attachments/:slot",
            put(attachment_handler::<G, N>).delete(remove_attachment_handler::<G, N>),
        )
        .route(
            "/api/v1/kyc/sessions/:session_id/next",
            post(next_handler::<G, N>),
        )
        .route(
            "/api/v1/kyc/sessions/:session_id/back",
            post(back_handler::<G, N>),
        )
        .route(
            "/api/v1/kyc/sessions/:session_id/steps/:index",
            post(jump_handler::<G, N>),
        )
        .route(
            "/api/v1/kyc/sessions/:session_id/submit",
            post(submit_handler::<G, N>),
        )
        .layer(DefaultBodyLimit::max(ATTACHMENT_BODY_LIMIT))
        .with_state(service)
}

pub(crate) async fn options_handler() -> Response {
    let payload = json!({
        "document_types": DOCUMENT_TYPE_OPTIONS,
        "countries": COUNTRY_OPTIONS,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn start_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    let snapshot = service.start();
    (StatusCode::CREATED, axum::Json(snapshot)).into_response()
}

pub(crate) async fn view_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.view(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn close_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.close(&SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn field_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path(session_id): Path<String>,
    axum::Json(change): axum::Json<FieldChange>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.update_field(&SessionId(session_id), change.field, change.value) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn attachment_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path((session_id, slot)): Path<(String, AttachmentSlot)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref());
    let name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(slot.field().name());
    let file = Attachment::new(name, mime_type, body.to_vec());

    match service.set_attachment(&SessionId(session_id), slot, file) {
        Ok((SlotStatus::Rejected, view)) => {
            let error = view
                .attachments
                .iter()
                .find(|state| state.slot == slot)
                .and_then(|state| state.error.clone());
            let payload = json!({
                "error": error,
                "view": view,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Ok((_, view)) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_attachment_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path((session_id, slot)): Path<(String, AttachmentSlot)>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.remove_attachment(&SessionId(session_id), slot) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn next_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.next(&SessionId(session_id)) {
        Ok((StepOutcome::Invalid { errors }, view)) => {
            let payload = json!({
                "errors": errors,
                "view": view,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Ok((outcome @ StepOutcome::Advanced { .. }, view)) => {
            let payload = json!({
                "result": outcome,
                "view": view,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn back_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.back(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn jump_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path((session_id, index)): Path<(String, usize)>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.go_to_step(&SessionId(session_id), index) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<G, N>(
    State(service): State<Arc<KycIntakeService<G, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: SubmissionGateway + 'static,
    N: Notifier + 'static,
{
    match service.submit(&SessionId(session_id)).await {
        Ok((SubmitOutcome::Accepted(receipt), view)) => {
            let payload = json!({
                "receipt": receipt,
                "view": view,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok((SubmitOutcome::Invalid { step, errors }, view)) => {
            let payload = json!({
                "step": step,
                "errors": errors,
                "view": view,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Ok((SubmitOutcome::Failed(error), view)) => {
            let payload = json!({
                "error": error.to_string(),
                "message": view.last_failure,
                "view": view,
            });
            (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Wizard(WizardError::StepOutOfRange { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServiceError::Wizard(_) => StatusCode::CONFLICT,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
