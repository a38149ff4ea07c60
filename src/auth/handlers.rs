use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, SignupRequest, TokenResponse, UserPublic},
        jwt::AuthUser,
        services::AuthService,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[instrument(skip(auth, payload))]
pub async fn signup(
    State(auth): State<AuthService>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<UserPublic>, AuthError> {
    let Json(payload) = payload.map_err(|e| AuthError::Validation(e.body_text()))?;
    let user = auth.signup(payload).await?;
    Ok(Json(user))
}

#[instrument(skip(auth, form))]
pub async fn login(
    State(auth): State<AuthService>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Form(form) = form.map_err(|e| AuthError::Validation(e.body_text()))?;
    let token = auth.login(form).await?;
    Ok(Json(token))
}

#[instrument(skip(auth))]
pub async fn me(
    State(auth): State<AuthService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserPublic>, AuthError> {
    Ok(Json(auth.current_user(user_id).await?))
}
