use crate::domain::{
    IssueFineError, ReturnLoanError, SettleFineError, StartLoanError, ValueError,
};
use crate::ports::{StoreError, UniqueKey};
use thiserror::Error;

/// アプリケーション層のエラー
///
/// ドメインの各エラーを平坦化し、ストアの一意制約違反を業務エラーに読み替える。
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Member not found")]
    MemberNotFound,

    /// 会員に貸出中の貸出がある
    #[error("Member already has an active loan")]
    MemberHasActiveLoan,

    /// 会員に未払いの罰金がある
    #[error("Member has pending fines")]
    MemberHasPendingFine,

    #[error("Book not found")]
    BookNotFound,

    #[error("Book is not available")]
    BookUnavailable,

    #[error("Loan not found")]
    LoanNotFound,

    #[error("Loan was already returned")]
    LoanAlreadyReturned,

    #[error("Fine not found")]
    FineNotFound,

    #[error("A member with this document ID is already registered")]
    DuplicateDocumentId,

    #[error("A book with this code is already catalogued")]
    DuplicateBookCode,

    /// 入力値の検証エラー
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValueError),

    /// ストアの障害
    #[error("Entity store error")]
    Store(#[source] StoreError),
}

impl From<StartLoanError> for ApplicationError {
    fn from(err: StartLoanError) -> Self {
        match err {
            StartLoanError::MemberNotFound => Self::MemberNotFound,
            StartLoanError::MemberHasActiveLoan => Self::MemberHasActiveLoan,
            StartLoanError::MemberHasPendingFine => Self::MemberHasPendingFine,
            StartLoanError::BookNotFound => Self::BookNotFound,
            StartLoanError::BookUnavailable => Self::BookUnavailable,
        }
    }
}

impl From<ReturnLoanError> for ApplicationError {
    fn from(err: ReturnLoanError) -> Self {
        match err {
            ReturnLoanError::LoanNotFound => Self::LoanNotFound,
            ReturnLoanError::LoanAlreadyReturned => Self::LoanAlreadyReturned,
        }
    }
}

impl From<IssueFineError> for ApplicationError {
    fn from(err: IssueFineError) -> Self {
        match err {
            IssueFineError::MemberNotFound => Self::MemberNotFound,
        }
    }
}

impl From<SettleFineError> for ApplicationError {
    fn from(err: SettleFineError) -> Self {
        match err {
            SettleFineError::FineNotFound => Self::FineNotFound,
        }
    }
}

/// 一意制約違反は、ロックをすり抜けた競合の最後の防衛線として業務エラーになる
impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(UniqueKey::ActiveLoanForMember) => Self::MemberHasActiveLoan,
            StoreError::Duplicate(UniqueKey::ActiveLoanForBook) => Self::BookUnavailable,
            StoreError::Duplicate(UniqueKey::DocumentId) => Self::DuplicateDocumentId,
            StoreError::Duplicate(UniqueKey::BookCode) => Self::DuplicateBookCode,
            other => Self::Store(other),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, ApplicationError>;
