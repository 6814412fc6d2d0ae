use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 168;
/// トークン有効期限の上限（1年）
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
pub const DEFAULT_LIBRARIAN_USERNAME: &str = "admin";
pub const DEFAULT_LIBRARIAN_PASSWORD: &str = "admin123";
pub const DEFAULT_LIBRARIAN_NAME: &str = "Head Librarian";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be at most {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        max: i64,
    },

    #[error("TOKEN_SECRET must be set when DATABASE_URL is configured")]
    MissingTokenSecret,
}

/// アプリケーション設定
///
/// すべて環境変数から読み込む。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 未設定の場合はインメモリストアを使用
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub port: u16,
    /// 未設定の場合は起動ごとに一時的な鍵を生成
    pub token_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub librarian_username: String,
    pub librarian_password: String,
    pub librarian_name: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から設定を組み立てる（テストではHashMapを渡す）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL");
        let token_secret = get("TOKEN_SECRET");
        if database_url.is_some() && token_secret.is_none() {
            return Err(ConfigError::MissingTokenSecret);
        }

        let token_ttl_hours = parse_positive(
            "TOKEN_TTL_HOURS",
            get("TOKEN_TTL_HOURS"),
            DEFAULT_TOKEN_TTL_HOURS,
        )?;
        if token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(ConfigError::OutOfRange {
                name: "TOKEN_TTL_HOURS",
                value: token_ttl_hours,
                max: MAX_TOKEN_TTL_HOURS,
            });
        }

        Ok(Self {
            max_connections: parse_positive(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            )?,
            port: parse_positive("PORT", get("PORT"), DEFAULT_PORT)?,
            token_ttl_hours,
            librarian_username: get("LIBRARIAN_USERNAME")
                .unwrap_or_else(|| DEFAULT_LIBRARIAN_USERNAME.to_string()),
            librarian_password: get("LIBRARIAN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_LIBRARIAN_PASSWORD.to_string()),
            librarian_name: get("LIBRARIAN_NAME")
                .unwrap_or_else(|| DEFAULT_LIBRARIAN_NAME.to_string()),
            database_url,
            token_secret,
        })
    }

    pub fn uses_default_password(&self) -> bool {
        self.librarian_password == DEFAULT_LIBRARIAN_PASSWORD
    }
}

fn parse_positive<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}
