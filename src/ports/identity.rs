use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 認証済みの司書
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub name: String,
}

/// 発行されたベアラートークン
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub principal: Principal,
}

/// 認証エラー
///
/// 「未指定」「期限切れ」「不正な形式」を区別する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Credential is missing")]
    MissingCredential,
    #[error("Credential has expired")]
    ExpiredCredential,
    #[error("Credential is malformed or invalid")]
    MalformedCredential,
    /// ユーザー名またはパスワードの誤り（どちらかは明かさない）
    #[error("Invalid username or password")]
    InvalidLogin,
}

/// 認証・セッションポート
///
/// すべてのコアのエントリーポイントは、ポリシーエンジンの実行前に
/// `verify`で有効なプリンシパルを得ていなければならない。
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// 資格情報を検証してトークンを発行する
    async fn login(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError>;

    /// ベアラートークンを検証する
    async fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError>;
}
