use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, PasswordResetRequest, PublicUser,
            RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse,
            ResetPasswordRequest,
        },
        jwt::{JwtKeys, TokenKind},
        password::{hash_password, verify_password},
    },
    error::ApiError,
    metrics::{
        record_login_failure, record_login_success, record_logout, record_password_reset_request,
        record_refresh_failure, record_refresh_success, record_register_attempt,
        record_register_failure, record_register_success, session_closed, session_opened,
    },
    session::{refresh_token_key, reset_token_key, session_key, SessionRecord},
    state::AppState,
    users::repo::{Profile, User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset-request", post(password_reset_request))
        .route("/auth/password-reset", post(reset_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let start = Instant::now();
    record_register_attempt();
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    // Ensure email is not taken
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        record_register_failure();
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.email, &hash).await {
        Ok(u) => u,
        // The unique index backstops a racing duplicate registration.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered");
            record_register_failure();
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    // Not wrapped in a transaction with the user insert; a crash in
    // between leaves a user row without a profile.
    Profile::create(&state.db, user.id, &payload.first_name, &payload.last_name).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    record_register_success(start.elapsed());
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user_id: user.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let start = Instant::now();
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    // Unknown email returns before any hash comparison; the timing
    // difference versus the wrong-password branch is observable.
    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        record_login_failure();
        return Err(ApiError::Auth("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        record_login_failure();
        return Err(ApiError::Auth("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;

    // One key per user: a second login overwrites both entries and the
    // previous refresh token stops matching.
    let ttl = keys.refresh_ttl;
    state
        .sessions
        .set(&refresh_token_key(user.id), &refresh_token, ttl)
        .await?;
    let session = SessionRecord {
        user_id: user.id,
        email: user.email.clone(),
    };
    let session_json = serde_json::to_string(&session).context("serialize session record")?;
    state
        .sessions
        .set(&session_key(user.id), &session_json, ttl)
        .await?;

    session_opened();
    record_login_success(start.elapsed());
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        expires_in: keys.access_ttl.as_secs(),
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        debug!(error = %e, "refresh token rejected");
        record_refresh_failure();
        ApiError::Auth("Invalid refresh token".into())
    })?;

    // Only the most recently stored token for this user is accepted;
    // logout and re-login both make the stored value diverge.
    let stored = state.sessions.get(&refresh_token_key(claims.sub)).await?;
    if stored.as_deref() != Some(payload.refresh_token.as_str()) {
        warn!(user_id = %claims.sub, "refresh token superseded or revoked");
        record_refresh_failure();
        return Err(ApiError::Auth("Invalid refresh token".into()));
    }

    // A new access token only: the refresh token is not rotated and the
    // session TTL is not extended.
    let access_token = keys.sign_access(claims.sub, &claims.email)?;
    record_refresh_success();
    debug!(user_id = %claims.sub, "access token refreshed");
    Ok(Json(RefreshResponse {
        access_token,
        expires_in: keys.access_ttl.as_secs(),
    }))
}

#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<MessageResponse> {
    record_logout();
    let keys = JwtKeys::from_ref(&state);

    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    // Best effort: an absent or invalid token still logs out with 200.
    if let Some(claims) = token.and_then(|t| keys.verify(t).ok()) {
        if claims.kind == TokenKind::Access {
            let user_id = claims.sub;
            if let Err(e) = state.sessions.delete(&session_key(user_id)).await {
                warn!(error = %e, user_id = %user_id, "session delete failed");
            }
            if let Err(e) = state.sessions.delete(&refresh_token_key(user_id)).await {
                warn!(error = %e, user_id = %user_id, "refresh token delete failed");
            }
            session_closed();
            info!(user_id = %user_id, "user logged out");
        }
    }

    Json(MessageResponse {
        message: "Logged out successfully".into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn password_reset_request(
    State(state): State<AppState>,
    Json(mut payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    record_password_reset_request();
    payload.email = payload.email.trim().to_lowercase();

    // The response is identical whether or not the account exists.
    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_reset(user.id, &user.email)?;
        state
            .sessions
            .set(&reset_token_key(user.id), &token, keys.reset_ttl)
            .await?;
        // Mail delivery is not implemented; the token is only logged.
        debug!(user_id = %user.id, token = %token, "password reset token issued");
    }

    Ok(Json(MessageResponse {
        message: "If the email exists, a reset link has been sent".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.new_password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_reset(&payload.token).map_err(|e| {
        debug!(error = %e, "reset token rejected");
        ApiError::Auth("Invalid reset token".into())
    })?;

    let stored = state.sessions.get(&reset_token_key(claims.sub)).await?;
    if stored.as_deref() != Some(payload.token.as_str()) {
        warn!(user_id = %claims.sub, "reset token expired or already used");
        return Err(ApiError::Auth("Invalid reset token".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password_hash(&state.db, claims.sub, &hash).await?;

    // Single use, and a reset invalidates any live login.
    state.sessions.delete(&reset_token_key(claims.sub)).await?;
    state.sessions.delete(&refresh_token_key(claims.sub)).await?;
    state.sessions.delete(&session_key(claims.sub)).await?;

    info!(user_id = %claims.sub, "password reset completed");
    Ok(Json(MessageResponse {
        message: "Password has been reset".into(),
    }))
}
