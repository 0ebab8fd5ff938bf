use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::{
        dto::{
            DashboardResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest,
            ResetPasswordRequest, TokenResponse,
        },
        extractors::AuthUser,
        services::{PASSWORD_RESET_MESSAGE, REGISTERED_MESSAGE, RESET_REQUESTED_MESSAGE},
    },
    error::{ApiError, AppJson, MessageBody},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Json<MessageBody>, ApiError> {
    state
        .auth
        .register(&payload.name, &payload.email, &payload.password)
        .await?;
    Ok(Json(MessageBody::new(REGISTERED_MESSAGE)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Json<MessageBody> {
    // the answer never varies, not even for an unreadable body
    let message = match payload {
        Ok(Json(payload)) => state.auth.request_reset(&payload.email).await,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "reset request body rejected");
            RESET_REQUESTED_MESSAGE
        }
    };
    Json(MessageBody::new(message))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageBody>, ApiError> {
    state
        .auth
        .confirm_reset(&payload.token, &payload.password)
        .await?;
    Ok(Json(MessageBody::new(PASSWORD_RESET_MESSAGE)))
}

#[instrument(skip_all)]
pub async fn dashboard(AuthUser(user): AuthUser) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        message: format!("Welcome, {}!", user.name),
        email: user.email,
    })
}
