use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    state::AppState,
    users::repo::{Profile, User},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<Profile> for ProfileBody {
    fn from(p: Profile) -> Self {
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            phone: p.phone,
            address: p.address,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub profile: Option<ProfileBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/me/profile", put(update_profile))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    let profile = Profile::find_by_user(&state.db, user_id).await?;

    Ok(Json(MeResponse {
        id: user.id,
        email: user.email,
        created_at: user.created_at,
        profile: profile.map(ProfileBody::from),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileBody>, ApiError> {
    let profile = Profile::update(
        &state.db,
        user_id,
        &payload.first_name,
        &payload.last_name,
        payload.phone.as_deref(),
        payload.address.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?;

    info!(user_id = %user_id, "profile updated");
    Ok(Json(ProfileBody::from(profile)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn me_response_serialization() {
        let response = MeResponse {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            profile: Some(ProfileBody {
                first_name: "A".into(),
                last_name: "B".into(),
                phone: None,
                address: None,
            }),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("createdAt"));
        assert!(json.contains("firstName"));
    }

    #[test]
    fn update_profile_request_accepts_camel_case() {
        let body = r#"{"firstName":"A","lastName":"B","phone":"123","address":null}"#;
        let parsed: UpdateProfileRequest = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.first_name, "A");
        assert_eq!(parsed.phone.as_deref(), Some("123"));
        assert!(parsed.address.is_none());
    }
}
