//! Minimal JWT auth for the task API.
//!
//! - Client submits the shared password to `/api/auth/login`
//! - Server returns a JWT valid for ~30 days whose `sub` is the user id
//! - When `DEV_MODE=false`, all task endpoints require `Authorization: Bearer <jwt>`
//! - When `DEV_MODE=true`, the user id comes from `X-User-Id` (default `dev`)
//!
//! # Security notes
//! - One shared password; the user id picked at login scopes every query.
//! - Use a strong `JWT_SECRET` in production.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};

/// Header carrying the user id in dev mode.
pub const DEV_USER_HEADER: &str = "x-user-id";
const DEV_USER: &str = "dev";
const DEFAULT_LOGIN_USER: &str = "owner";

/// The caller every task query is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// User id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn issue_jwt(secret: &str, user_id: &str, ttl_days: i64) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    // If dev_mode is enabled, we still allow login, but it won't be required.
    let expected = state
        .config
        .auth
        .dashboard_password
        .as_deref()
        .unwrap_or("");

    if expected.is_empty() || !constant_time_eq(req.password.trim(), expected) {
        return Err((StatusCode::UNAUTHORIZED, "Invalid password".to_string()));
    }

    let secret = state.config.auth.jwt_secret.as_deref().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "JWT_SECRET not configured".to_string(),
        )
    })?;

    let user_id = req
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_LOGIN_USER)
        .to_string();

    let (token, exp) = issue_jwt(secret, &user_id, state.config.auth.jwt_ttl_days)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    tracing::info!(user_id = %user_id, "session issued");
    Ok(Json(LoginResponse {
        token,
        exp,
        user_id,
    }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks, caller names itself.
    if state.config.dev_mode {
        let id = req
            .headers()
            .get(DEV_USER_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEV_USER)
            .to_string();
        req.extensions_mut().insert(AuthUser { id });
        return next.run(req).await;
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let secret = match state.config.auth.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match verify_jwt(token, secret) {
        Ok(claims) if !claims.sub.trim().is_empty() => {
            req.extensions_mut().insert(AuthUser { id: claims.sub });
            next.run(req).await
        }
        _ => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_carries_user_id() {
        let (token, exp) = issue_jwt("secret", "alice", 30).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, exp);
        assert!(verify_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn constant_time_eq_compares_contents() {
        assert!(constant_time_eq("hunter2", "hunter2"));
        assert!(!constant_time_eq("hunter2", "hunter3"));
        assert!(!constant_time_eq("short", "longer"));
    }
}
