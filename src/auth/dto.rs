use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body asking for a password reset token.
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Request body completing a password reset.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: PublicUser,
}

/// Response returned after token refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: u64,
}

/// Generic message-only response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_uses_camel_case() {
        let response = LoginResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 900,
            user: PublicUser {
                id: Uuid::new_v4(),
                email: "a@x.com".into(),
            },
        };
        let json = serde_json::to_string(&response).expect("serialize");
        assert!(json.contains("accessToken"));
        assert!(json.contains("refreshToken"));
        assert!(json.contains("expiresIn"));
        assert!(json.contains("a@x.com"));
    }

    #[test]
    fn register_request_accepts_camel_case() {
        let body = r#"{"email":"a@x.com","password":"password1","firstName":"A","lastName":"B"}"#;
        let parsed: RegisterRequest = serde_json::from_str(body).expect("deserialize");
        assert_eq!(parsed.first_name, "A");
        assert_eq!(parsed.last_name, "B");
    }

    #[test]
    fn refresh_request_accepts_camel_case() {
        let body = r#"{"refreshToken":"abc"}"#;
        let parsed: RefreshRequest = serde_json::from_str(body).expect("deserialize");
        assert_eq!(parsed.refresh_token, "abc");
    }
}
