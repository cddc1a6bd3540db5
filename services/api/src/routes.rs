use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Extension;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use fiskus::error::AppError;
use fiskus::jobs::{JobId, JobStatusView, JobType};

pub(crate) fn gateway_routes() -> axum::Router {
    axum::Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/v2/ping", get(ping))
        .route("/v2/fsc/request", post(submit_unlock_code_request))
        .route("/v2/fsc/request/:id", get(job_status_endpoint))
        .route("/v2/fsc/activation", post(submit_unlock_code_activation))
        .route("/v2/fsc/activation/:id", get(job_status_endpoint))
        .route("/v2/fsc/revocation", post(submit_unlock_code_revocation))
        .route("/v2/fsc/revocation/:id", get(job_status_endpoint))
        .route("/v2/tax_number_validity", post(submit_tax_number_validity))
        .route("/v2/tax_number_validity/:id", get(job_status_endpoint))
        .route("/v2/ests", post(submit_income_tax_return))
        .route("/v2/ests/:id", get(job_status_endpoint))
        .route("/v2/grundsteuer", post(submit_property_tax_return))
        .route("/v2/grundsteuer/:id", get(job_status_endpoint))
        .route("/v2/tax_offices", get(state_ids_endpoint))
        .route("/v2/tax_offices/:state_id", get(tax_offices_endpoint))
        .route("/v2/cert_properties", get(cert_properties_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn ping() -> &'static str {
    "pong"
}

fn submit_job(
    state: &AppState,
    job_type: JobType,
    payload: Value,
) -> Result<(StatusCode, Json<String>), AppError> {
    let job = state.jobs.submit(job_type, payload, "api")?;
    Ok((StatusCode::CREATED, Json(format!("request/{}", job.id))))
}

pub(crate) async fn submit_unlock_code_request(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    submit_job(&state, JobType::UnlockCodeRequest, payload)
}

pub(crate) async fn submit_unlock_code_activation(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    submit_job(&state, JobType::UnlockCodeActivation, payload)
}

pub(crate) async fn submit_unlock_code_revocation(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    submit_job(&state, JobType::UnlockCodeRevocation, payload)
}

pub(crate) async fn submit_tax_number_validity(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    submit_job(&state, JobType::TaxNumberValidity, payload)
}

pub(crate) async fn submit_income_tax_return(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    submit_job(&state, JobType::IncomeTaxReturn, payload)
}

pub(crate) async fn submit_property_tax_return(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    submit_job(&state, JobType::PropertyTaxReturn, payload)
}

pub(crate) async fn job_status_endpoint(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusView>, AppError> {
    Ok(Json(state.jobs.status(&JobId(id))?))
}

pub(crate) async fn tax_offices_endpoint(
    Extension(state): Extension<AppState>,
    Path(state_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let xml = state.jobs.tax_offices(&state_id)?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}

pub(crate) async fn state_ids_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let xml = state.jobs.state_id_list()?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}

pub(crate) async fn cert_properties_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let xml = state.jobs.certificate_properties()?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}
