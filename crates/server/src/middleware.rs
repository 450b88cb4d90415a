//! Bearer-token authentication middleware: verifies the JWT, injects the
//! caller's identity into request extensions for handlers to pull out.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use revisit_types::{DomainError, Role};

use crate::auth::verify_access_token;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

pub async fn require_auth(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(DomainError::Unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or(DomainError::Unauthorized)?;
    let claims = verify_access_token(token, &state.config.jwt_secret)?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        role: crate::auth::parse_role(&claims.role),
    });

    Ok(next.run(req).await)
}

/// Require the caller to be an admin. Composed after [`require_auth`] on
/// admin-only routes (§6 "Admin surface").
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(DomainError::Unauthorized)?;
    if user.role != Role::Admin {
        return Err(ApiError::Domain(DomainError::Forbidden("admin role required".into())));
    }
    Ok(next.run(req).await)
}
