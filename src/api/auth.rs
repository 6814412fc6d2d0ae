use crate::ports::{AuthError, Principal};
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;

use super::{
    error::ApiError,
    extract::ApiJson,
    handlers::AppState,
    types::{LoginRequest, LoginResponse},
};

/// 認証ミドルウェア
///
/// ハンドラーより先に実行され、検証済みのプリンシパルをリクエスト拡張に格納する。
pub async fn require_principal(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let token = bearer_token(header)?;

    let principal = state
        .identity
        .verify(token, Utc::now())
        .await
        .inspect_err(|reason| tracing::debug!(%reason, "credential rejected"))?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// `Authorization: Bearer <token>` からトークンを取り出す
fn bearer_token(value: &HeaderValue) -> Result<&str, AuthError> {
    let value = value.to_str().map_err(|_| AuthError::MalformedCredential)?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

/// POST /auth/login - 司書としてログインしトークンを発行
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state
        .identity
        .login(&req.username, &req.password, Utc::now())
        .await?;

    Ok(Json(LoginResponse::from(token)))
}

/// GET /auth/me - 認証済みの司書
pub async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}
