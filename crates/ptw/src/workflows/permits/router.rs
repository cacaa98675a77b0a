use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use image::ImageFormat;
use serde_json::json;
use tracing::{error, warn};

use super::access::{AccessError, AccessGate, Role};
use super::domain::{NewPermit, Permit, PermitId, PermitSubmission};
use super::repository::{PermitRepository, RepositoryError};
use super::service::{PermitService, PermitServiceError};
use super::views::{decode_photo_payload, PermitView, PhotoView, ReviewRequest, SubmitPermitRequest};

/// Header carrying the shared reviewer access code.
pub const ACCESS_CODE_HEADER: &str = "x-access-code";

/// Photos arrive inline, so request bodies are allowed to be large.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub struct PermitApi<R> {
    service: Arc<PermitService<R>>,
    gate: Arc<AccessGate>,
}

impl<R> Clone for PermitApi<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            gate: Arc::clone(&self.gate),
        }
    }
}

/// Router builder exposing contractor and reviewer endpoints.
pub fn permit_router<R>(service: Arc<PermitService<R>>, gate: Arc<AccessGate>) -> Router
where
    R: PermitRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/permits",
            post(submit_handler::<R>).get(list_handler::<R>),
        )
        .route("/api/v1/permits/active", get(active_handler::<R>))
        .route("/api/v1/permits/review-queue", get(review_queue_handler::<R>))
        .route("/api/v1/permits/export.csv", get(export_handler::<R>))
        .route("/api/v1/permits/:permit_id", get(status_handler::<R>))
        .route("/api/v1/permits/:permit_id/photos", get(photos_handler::<R>))
        .route(
            "/api/v1/permits/:permit_id/photos/during",
            post(during_photo_handler::<R>),
        )
        .route(
            "/api/v1/permits/:permit_id/photos/after",
            post(after_photo_handler::<R>),
        )
        .route("/api/v1/permits/:permit_id/approve", post(approve_handler::<R>))
        .route("/api/v1/permits/:permit_id/close", post(close_handler::<R>))
        .route("/api/v1/permits/:permit_id/report", get(report_handler::<R>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(PermitApi { service, gate })
}

pub(crate) async fn submit_handler<R>(
    State(api): State<PermitApi<R>>,
    Json(request): Json<SubmitPermitRequest>,
) -> Response
where
    R: PermitRepository + 'static,
{
    let before_photo = match decode_photo_payload(&request.before_photo) {
        Ok(bytes) => bytes,
        Err(err) => {
            let payload = json!({ "error": format!("before_photo is not valid base64: {err}") });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
    };
    if let Err(rejected) = check_photo_format(&before_photo) {
        return rejected;
    }

    let submission = PermitSubmission {
        permit: NewPermit {
            contractor_name: request.contractor_name,
            work_type: request.work_type,
            location: request.location,
            description: request.description,
        },
        before_photo,
    };

    match run_blocking(&api, move |service| service.submit(submission)).await {
        Ok(permit) => (StatusCode::CREATED, Json(PermitView::from(permit))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn status_handler<R>(
    State(api): State<PermitApi<R>>,
    Path(permit_id): Path<i64>,
) -> Response
where
    R: PermitRepository + 'static,
{
    match run_blocking(&api, move |service| service.get(PermitId(permit_id))).await {
        Ok(permit) => (StatusCode::OK, Json(PermitView::from(permit))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn active_handler<R>(State(api): State<PermitApi<R>>) -> Response
where
    R: PermitRepository + 'static,
{
    permits_response(run_blocking(&api, |service| service.active_permits()).await)
}

pub(crate) async fn list_handler<R>(State(api): State<PermitApi<R>>, headers: HeaderMap) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(denied) = reviewer_view(&api.gate, &headers) {
        return denied;
    }
    permits_response(run_blocking(&api, |service| service.list()).await)
}

pub(crate) async fn review_queue_handler<R>(
    State(api): State<PermitApi<R>>,
    headers: HeaderMap,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(denied) = reviewer_view(&api.gate, &headers) {
        return denied;
    }
    permits_response(run_blocking(&api, |service| service.review_queue()).await)
}

pub(crate) async fn export_handler<R>(
    State(api): State<PermitApi<R>>,
    headers: HeaderMap,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(denied) = reviewer_view(&api.gate, &headers) {
        return denied;
    }
    match run_blocking(&api, |service| service.export_csv()).await {
        Ok(csv) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime::TEXT_CSV.to_string())],
            csv,
        )
            .into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn photos_handler<R>(
    State(api): State<PermitApi<R>>,
    Path(permit_id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(denied) = reviewer_view(&api.gate, &headers) {
        return denied;
    }
    match run_blocking(&api, move |service| service.photos(PermitId(permit_id))).await {
        Ok(photos) => {
            let views: Vec<PhotoView> = photos.into_iter().map(PhotoView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn during_photo_handler<R>(
    State(api): State<PermitApi<R>>,
    Path(permit_id): Path<i64>,
    body: Bytes,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(rejected) = check_photo_format(&body) {
        return rejected;
    }
    match run_blocking(&api, move |service| {
        service.add_during_photo(PermitId(permit_id), &body)
    })
    .await
    {
        Ok(photo) => (StatusCode::CREATED, Json(PhotoView::from(photo))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn after_photo_handler<R>(
    State(api): State<PermitApi<R>>,
    Path(permit_id): Path<i64>,
    body: Bytes,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(rejected) = check_photo_format(&body) {
        return rejected;
    }
    match run_blocking(&api, move |service| {
        service.record_after_photo(PermitId(permit_id), &body)
    })
    .await
    {
        Ok(permit) => (StatusCode::OK, Json(PermitView::from(permit))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn approve_handler<R>(
    State(api): State<PermitApi<R>>,
    Path(permit_id): Path<i64>,
    headers: HeaderMap,
    Json(review): Json<ReviewRequest>,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(err) = api.gate.authorize_reviewer(review.role, access_code(&headers)) {
        return access_error_response(err);
    }
    let approver = review.role.approver_name(review.approver_name.as_deref());
    match run_blocking(&api, move |service| service.approve(PermitId(permit_id), &approver)).await {
        Ok(permit) => (StatusCode::OK, Json(PermitView::from(permit))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn close_handler<R>(
    State(api): State<PermitApi<R>>,
    Path(permit_id): Path<i64>,
    headers: HeaderMap,
    Json(review): Json<ReviewRequest>,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(err) = api.gate.authorize_reviewer(review.role, access_code(&headers)) {
        return access_error_response(err);
    }
    let approver = review.role.approver_name(review.approver_name.as_deref());
    match run_blocking(&api, move |service| service.close(PermitId(permit_id), &approver)).await {
        Ok(permit) => (StatusCode::OK, Json(PermitView::from(permit))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn report_handler<R>(
    State(api): State<PermitApi<R>>,
    Path(permit_id): Path<i64>,
    headers: HeaderMap,
) -> Response
where
    R: PermitRepository + 'static,
{
    if let Err(denied) = reviewer_view(&api.gate, &headers) {
        return denied;
    }
    match run_blocking(&api, move |service| service.generate_report(PermitId(permit_id))).await {
        Ok(report) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report.file_name),
                ),
            ],
            report.bytes,
        )
            .into_response(),
        Err(err) => service_error_response(err),
    }
}

/// Storage, image decoding and PDF rendering are synchronous; keep them off
/// the async workers.
async fn run_blocking<R, T, F>(api: &PermitApi<R>, work: F) -> Result<T, PermitServiceError>
where
    R: PermitRepository + 'static,
    T: Send + 'static,
    F: FnOnce(&PermitService<R>) -> Result<T, PermitServiceError> + Send + 'static,
{
    let service = Arc::clone(&api.service);
    tokio::task::spawn_blocking(move || work(&service))
        .await
        .map_err(|err| {
            error!(error = %err, "permit task did not complete");
            PermitServiceError::Interrupted(err.to_string())
        })?
}

/// Only JPEG and PNG photos are stored. Empty bodies fall through to the
/// service, which reports the missing photo by stage.
fn check_photo_format(bytes: &[u8]) -> Result<(), Response> {
    if bytes.is_empty() {
        return Ok(());
    }
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg | ImageFormat::Png) => Ok(()),
        _ => {
            let payload = json!({ "error": "photo must be a JPG or PNG image" });
            Err((StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response())
        }
    }
}

fn access_code(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACCESS_CODE_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Reviewer dashboards only check the shared code; any reviewer role may read.
fn reviewer_view(gate: &AccessGate, headers: &HeaderMap) -> Result<(), Response> {
    gate.authorize(Role::SafetyOfficer, access_code(headers))
        .map_err(access_error_response)
}

fn permits_response(result: Result<Vec<Permit>, PermitServiceError>) -> Response {
    match result {
        Ok(permits) => {
            let views: Vec<PermitView> = permits.into_iter().map(PermitView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => service_error_response(err),
    }
}

fn access_error_response(err: AccessError) -> Response {
    let status = match err {
        AccessError::MissingCode(_) => StatusCode::UNAUTHORIZED,
        AccessError::InvalidCode(_) | AccessError::NotReviewer(_) => StatusCode::FORBIDDEN,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

pub(crate) fn service_error_status(err: &PermitServiceError) -> StatusCode {
    match err {
        PermitServiceError::NotFound(_)
        | PermitServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        PermitServiceError::InvalidInput(_)
        | PermitServiceError::Repository(RepositoryError::EmptyImage) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PermitServiceError::InvalidTransition(_)
        | PermitServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        PermitServiceError::Repository(_)
        | PermitServiceError::Report(_)
        | PermitServiceError::Export(_)
        | PermitServiceError::Interrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn service_error_response(err: PermitServiceError) -> Response {
    let status = service_error_status(&err);
    if status.is_server_error() {
        warn!(error = %err, "permit request failed");
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
