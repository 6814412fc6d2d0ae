use thiserror::Error;

/// 値オブジェクトの入力エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("book code must not be empty")]
    EmptyBookCode,
    #[error("document ID must not be empty")]
    EmptyDocumentId,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    /// 金額は正の値のみ
    #[error("amount must be positive (got {0} cents)")]
    NonPositiveAmount(i64),
}

/// 貸出開始のエラー
///
/// バリアントの順序は判定順序と一致する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartLoanError {
    #[error("Member not found")]
    MemberNotFound,
    #[error("Member already has an active loan")]
    MemberHasActiveLoan,
    #[error("Member has pending fines")]
    MemberHasPendingFine,
    #[error("Book not found")]
    BookNotFound,
    #[error("Book is not available")]
    BookUnavailable,
}

/// 返却のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReturnLoanError {
    #[error("Loan not found")]
    LoanNotFound,
    /// 既に返却済み
    #[error("Loan was already returned")]
    LoanAlreadyReturned,
}

/// 罰金発行のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IssueFineError {
    #[error("Member not found")]
    MemberNotFound,
}

/// 罰金精算のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettleFineError {
    #[error("Fine not found")]
    FineNotFound,
}
