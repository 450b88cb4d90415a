//! JWT access tokens and opaque refresh/reset tokens (§6 auth surface).
//!
//! Raw secrets (passwords, refresh tokens, reset tokens) are generated and
//! checked here; `revisit-db` only ever sees and stores their hashes, per
//! `crates/db/src/queries/auth.rs`'s own doc comment.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use revisit_types::{DomainError, DomainResult, Role};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Admin => "admin",
    }
}

pub fn parse_role(s: &str) -> Role {
    if s == "admin" {
        Role::Admin
    } else {
        Role::User
    }
}

pub fn issue_access_token(user_id: &str, role: Role, secret: &str) -> DomainResult<String> {
    let exp = (Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role_str(role).to_string(),
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|e| DomainError::Internal(e.to_string()))
}

pub fn verify_access_token(token: &str, secret: &str) -> DomainResult<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => DomainError::TokenExpired,
            _ => DomainError::InvalidToken,
        })
}

/// Password hashing. Salted with a fixed domain separator rather than a
/// per-user random salt or a slow KDF (argon2/bcrypt) — acceptable for a
/// self-hosted, single-operator tool; noted as a deliberate simplification
/// in DESIGN.md.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"revisit-pwd-v1:");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}

fn hash_opaque_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new opaque secret (refresh token, reset token, invite code).
/// Returns `(raw, hash)` — the raw value goes to the client, only the hash
/// is ever persisted.
pub fn generate_opaque_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hash = hash_opaque_token(&raw);
    (raw, hash)
}

/// Hash a client-presented opaque token for a lookup-by-hash query.
pub fn hash_presented_token(raw: &str) -> String {
    hash_opaque_token(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips() {
        let token = issue_access_token("user-1", Role::User, "secret").unwrap();
        let claims = verify_access_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_access_token("user-1", Role::User, "secret").unwrap();
        let err = verify_access_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, DomainError::InvalidToken));
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("correct horse battery staple");
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn opaque_tokens_are_unique_and_hash_consistently() {
        let (raw1, hash1) = generate_opaque_token();
        let (raw2, hash2) = generate_opaque_token();
        assert_ne!(raw1, raw2);
        assert_ne!(hash1, hash2);
        assert_eq!(hash_presented_token(&raw1), hash1);
    }
}
