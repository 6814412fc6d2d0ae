use crate::application::ApplicationError;
use crate::domain::ValueError;
use crate::ports::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層・認証のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    Application(ApplicationError),
    Auth(AuthError),
    /// クエリパラメータなど、コマンド以前の入力エラー
    BadRequest(String),
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        ApiError::Application(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<ValueError> for ApiError {
    fn from(err: ValueError) -> Self {
        ApiError::Application(ApplicationError::InvalidInput(err))
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Application(err) => match err {
                // 404 Not Found - リクエストされたリソースが存在しない
                ApplicationError::MemberNotFound => (StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND"),
                ApplicationError::BookNotFound => (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND"),
                ApplicationError::LoanNotFound => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND"),
                ApplicationError::FineNotFound => (StatusCode::NOT_FOUND, "FINE_NOT_FOUND"),

                // 422 Unprocessable Entity - ビジネスルール違反
                ApplicationError::MemberHasActiveLoan => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "MEMBER_HAS_ACTIVE_LOAN")
                }
                ApplicationError::MemberHasPendingFine => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "MEMBER_HAS_PENDING_FINE")
                }
                ApplicationError::BookUnavailable => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "BOOK_UNAVAILABLE")
                }
                ApplicationError::LoanAlreadyReturned => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "LOAN_ALREADY_RETURNED")
                }

                // 409 Conflict - 一意キーの重複
                ApplicationError::DuplicateDocumentId => {
                    (StatusCode::CONFLICT, "DUPLICATE_DOCUMENT_ID")
                }
                ApplicationError::DuplicateBookCode => (StatusCode::CONFLICT, "DUPLICATE_BOOK_CODE"),

                ApplicationError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),

                ApplicationError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            },

            // 401 Unauthorized - 未指定・期限切れ・不正な形式を区別する
            ApiError::Auth(err) => {
                let code = match err {
                    AuthError::MissingCredential => "MISSING_CREDENTIAL",
                    AuthError::ExpiredCredential => "EXPIRED_CREDENTIAL",
                    AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
                    AuthError::InvalidLogin => "INVALID_LOGIN",
                };
                (StatusCode::UNAUTHORIZED, code)
            }

            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            ApiError::Application(ApplicationError::Store(ref e)) => {
                tracing::error!(error = ?e, "Entity store error");
                "Internal storage error".to_string()
            }
            ApiError::Application(err) => err.to_string(),
            ApiError::Auth(err) => err.to_string(),
            ApiError::BadRequest(message) => message,
        };

        let mut response = (status, Json(ErrorResponse::new(code, message))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StartLoanError;

    #[test]
    fn test_policy_errors_map_to_statuses() {
        let cases = [
            (StartLoanError::MemberNotFound, StatusCode::NOT_FOUND),
            (StartLoanError::MemberHasActiveLoan, StatusCode::UNPROCESSABLE_ENTITY),
            (StartLoanError::MemberHasPendingFine, StatusCode::UNPROCESSABLE_ENTITY),
            (StartLoanError::BookNotFound, StatusCode::NOT_FOUND),
            (StartLoanError::BookUnavailable, StatusCode::UNPROCESSABLE_ENTITY),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(ApplicationError::from(err)).into_response();
            assert_eq!(response.status(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_auth_errors_are_unauthorized() {
        for err in [
            AuthError::MissingCredential,
            AuthError::ExpiredCredential,
            AuthError::MalformedCredential,
            AuthError::InvalidLogin,
        ] {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers()["www-authenticate"], "Bearer");
        }
    }

    #[test]
    fn test_duplicates_are_conflicts() {
        let response = ApiError::from(ApplicationError::DuplicateDocumentId).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
