use crate::ports::identity::{
    AuthError, IdentityService as IdentityServiceTrait, IssuedToken, Principal,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac, digest::InvalidLength};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// トークンのペイロード
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    name: String,
    /// 有効期限（Unix秒）
    exp: i64,
}

/// ログイン可能な司書アカウント
#[derive(Debug, Clone)]
pub struct LibrarianAccount {
    pub username: String,
    pub password: String,
    pub name: String,
}

/// HMAC-SHA256署名付きベアラートークンによるIdentityService実装
///
/// トークン形式：`base64url(claims json) "." base64url(前半部分のMAC)`
///
/// パスワードは同じ鍵によるMACとしてのみ保持し、比較は`verify_slice`（定数時間）で行う。
pub struct IdentityService {
    mac: HmacSha256,
    ttl: Duration,
    username: String,
    name: String,
    password_mac: Vec<u8>,
}

impl IdentityService {
    pub fn new(
        secret: &[u8],
        ttl: Duration,
        account: LibrarianAccount,
    ) -> Result<Self, InvalidLength> {
        let mac = HmacSha256::new_from_slice(secret)?;

        let mut password_mac = mac.clone();
        password_mac.update(account.password.as_bytes());

        Ok(Self {
            password_mac: password_mac.finalize().into_bytes().to_vec(),
            mac,
            ttl,
            username: account.username,
            name: account.name,
        })
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn issue(&self, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now + self.ttl;
        let claims = TokenClaims {
            sub: self.username.clone(),
            name: self.name.clone(),
            exp: expires_at.timestamp(),
        };
        let json = serde_json::to_vec(&claims).map_err(|_| AuthError::MalformedCredential)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&payload);

        Ok(IssuedToken {
            access_token: format!("{}.{}", payload, signature),
            expires_at,
            principal: Principal {
                username: claims.sub,
                name: claims.name,
            },
        })
    }
}

#[async_trait]
impl IdentityServiceTrait for IdentityService {
    async fn login(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let mut mac = self.mac.clone();
        mac.update(password.as_bytes());
        let password_ok = mac.verify_slice(&self.password_mac).is_ok();

        if username != self.username || !password_ok {
            tracing::warn!(username, "login rejected");
            return Err(AuthError::InvalidLogin);
        }

        let token = self.issue(now)?;
        tracing::info!(username, expires_at = %token.expires_at, "token issued");
        Ok(token)
    }

    async fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or(AuthError::MalformedCredential)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedCredential)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::MalformedCredential)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::MalformedCredential)?;
        let claims: TokenClaims =
            serde_json::from_slice(&json).map_err(|_| AuthError::MalformedCredential)?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::ExpiredCredential);
        }

        Ok(Principal {
            username: claims.sub,
            name: claims.name,
        })
    }
}
