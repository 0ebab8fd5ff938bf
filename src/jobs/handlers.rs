use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, AppJson, MessageBody},
    jobs::{dto::JobRequest, repo_types::JobApplication},
    state::AppState,
};

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:id", get(get_job).put(update_job).delete(delete_job))
}

// malformed ids are reported like absent records
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_jobs(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<JobApplication>>, ApiError> {
    Ok(Json(state.jobs.list_by_user(user.id).await?))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn get_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JobApplication>, ApiError> {
    let id = parse_id(&id)?;
    state
        .jobs
        .get(user.id, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<JobRequest>,
) -> Result<(StatusCode, Json<JobApplication>), ApiError> {
    let fields = body.into_fields(state.clock.now().date())?;
    let job = state.jobs.create(user.id, fields).await?;
    info!(job_id = %job.id, "job application created");
    Ok((StatusCode::CREATED, Json(job)))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn update_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<JobRequest>,
) -> Result<Json<JobApplication>, ApiError> {
    let id = parse_id(&id)?;
    let fields = body.into_fields(state.clock.now().date())?;
    let job = state
        .jobs
        .update(user.id, id, fields)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(job))
}

#[instrument(skip_all, fields(user_id = %user.id, %id))]
pub async fn delete_job(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = parse_id(&id)?;
    if !state.jobs.delete(user.id, id).await? {
        return Err(ApiError::NotFound);
    }
    info!("job application deleted");
    Ok(Json(MessageBody::new("Job application deleted.")))
}
