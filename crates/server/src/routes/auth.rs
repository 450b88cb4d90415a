//! `POST /auth/{register,login,refresh,logout}` (§6 auth surface).

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use revisit_types::{DomainError, Role};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_opaque_token, hash_password, hash_presented_token, issue_access_token, parse_role, verify_password, REFRESH_TOKEN_TTL_DAYS};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub login_handle: String,
    pub password: String,
    pub invite_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub login_handle: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub login_handle: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

async fn issue_tokens(state: &AppState, user_id: &str, login_handle: &str, role: Role) -> ApiResult<AuthResponse> {
    let access_token = issue_access_token(user_id, role, &state.config.jwt_secret)?;
    let (refresh_token, refresh_hash) = generate_opaque_token();
    state
        .db
        .store_refresh_token(user_id, &refresh_hash, Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS))
        .await?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: UserView {
            id: user_id.to_string(),
            login_handle: login_handle.to_string(),
            role,
        },
    })
}

async fn register(State(state): State<Arc<AppState>>, Json(req): Json<RegisterRequest>) -> ApiResult<Json<AuthResponse>> {
    if req.login_handle.trim().is_empty() || req.password.len() < 8 {
        return Err(ApiError::Domain(DomainError::BadRequest(
            "login_handle is required and password must be at least 8 characters".into(),
        )));
    }

    let signup_open = state.db.signup_enabled().await;
    if !signup_open {
        let invite_codes_on = state.db.invite_codes_enabled().await;
        let code = req
            .invite_code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DomainError::Forbidden("signup is closed and no invite code was provided".into()))?;
        if !invite_codes_on {
            return Err(ApiError::Domain(DomainError::Forbidden("invite codes are disabled".into())));
        }
        // Redeem after creating the user, so a race on the code doesn't orphan one.
        let user = state.db.create_user(&req.login_handle, &hash_password(&req.password), Role::User).await?;
        state.db.redeem_invite_code(&hash_presented_token(code), &user.id).await?;
        return Ok(Json(issue_tokens(&state, &user.id, &user.login_handle, Role::User).await?));
    }

    let user = state.db.create_user(&req.login_handle, &hash_password(&req.password), Role::User).await?;
    Ok(Json(issue_tokens(&state, &user.id, &user.login_handle, Role::User).await?))
}

async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .db
        .get_user_by_handle(&req.login_handle)
        .await?
        .filter(|u| u.active)
        .ok_or(DomainError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Domain(DomainError::InvalidCredentials));
    }

    let role = parse_role(&user.role);
    Ok(Json(issue_tokens(&state, &user.id, &user.login_handle, role).await?))
}

async fn refresh(State(state): State<Arc<AppState>>, Json(req): Json<RefreshRequest>) -> ApiResult<Json<AuthResponse>> {
    let presented_hash = hash_presented_token(&req.refresh_token);
    let user_id = state
        .db
        .find_live_refresh_token(&presented_hash)
        .await?
        .ok_or(DomainError::InvalidToken)?;

    // Rotate: the presented token is single-use.
    state.db.revoke_refresh_token(&presented_hash).await?;

    let user = state.db.get_user_by_id(&user_id).await?;
    let role = parse_role(&user.role);
    Ok(Json(issue_tokens(&state, &user.id, &user.login_handle, role).await?))
}

async fn logout(State(state): State<Arc<AppState>>, Json(req): Json<LogoutRequest>) -> ApiResult<()> {
    state.db.revoke_refresh_token(&hash_presented_token(&req.refresh_token)).await?;
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use revisit_db::Database;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            env_tag: "test".into(),
            database_url: None,
            jwt_secret: "secret".into(),
            default_weights: revisit_core::WeightVector::default().into(),
            csv_bundle_path: None,
        }
    }

    #[tokio::test]
    async fn register_requires_open_signup_or_invite_code() {
        let db = Database::new_in_memory().await.unwrap();
        let state = AppState::new(db, test_config());
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/register")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"loginHandle":"alice","password":"supersecret"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_invalid_credentials() {
        let db = Database::new_in_memory().await.unwrap();
        db.create_user("alice", &hash_password("correct-password"), revisit_types::Role::User).await.unwrap();
        let state = AppState::new(db, test_config());
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"loginHandle":"alice","password":"wrong-password"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn successful_login_returns_tokens() {
        let db = Database::new_in_memory().await.unwrap();
        db.create_user("alice", &hash_password("correct-password"), revisit_types::Role::User).await.unwrap();
        let state = AppState::new(db, test_config());
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"loginHandle":"alice","password":"correct-password"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["accessToken"].is_string());
        assert!(parsed["refreshToken"].is_string());
    }
}
