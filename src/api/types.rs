use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::lookup::{FineView, LoanView};
use crate::application::registry::{BookDetail, DashboardStats, MemberDetail};
use crate::domain::{
    Amount, Book, BookCode, Fine, Loan, LoanId, LoanStatus, Member, MemberNumber, ValueError,
    commands::{IssueFine, RegisterBook, RegisterMember, StartLoan},
    policy::ReturnOutcome,
};
use crate::ports::{IssuedToken, Principal};

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub librarian: Principal,
}

impl From<IssuedToken> for LoginResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            access_token: token.access_token,
            token_type: "bearer",
            expires_at: token.expires_at,
            librarian: token.principal,
        }
    }
}

// ============================================================================
// Books
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterBookRequest {
    pub code: String,
    pub title: String,
    pub author: String,
    pub cover_image_url: Option<String>,
}

impl RegisterBookRequest {
    pub fn to_command(&self) -> Result<RegisterBook, ValueError> {
        RegisterBook::new(
            &self.code,
            &self.title,
            &self.author,
            self.cover_image_url.as_deref(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub code: BookCode,
    pub title: String,
    pub author: String,
    pub cover_image_url: Option<String>,
    pub status: String,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            status: book.status.as_str().to_string(),
            code: book.code,
            title: book.title,
            author: book.author,
            cover_image_url: book.cover_image_url,
        }
    }
}

/// 書籍詳細レスポンス（貸出履歴付き）
#[derive(Debug, Serialize)]
pub struct BookDetailResponse {
    #[serde(flatten)]
    pub book: BookResponse,
    pub loans: Vec<LoanResponse>,
}

impl From<BookDetail> for BookDetailResponse {
    fn from(detail: BookDetail) -> Self {
        Self {
            book: detail.book.into(),
            loans: detail.loans.into_iter().map(LoanResponse::from).collect(),
        }
    }
}

// ============================================================================
// Members
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterMemberRequest {
    pub name: String,
    pub document_id: String,
}

impl RegisterMemberRequest {
    pub fn to_command(&self, registered_at: DateTime<Utc>) -> Result<RegisterMember, ValueError> {
        RegisterMember::new(&self.name, &self.document_id, registered_at)
    }
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member_number: i64,
    pub name: String,
    pub document_id: String,
    pub registered_at: DateTime<Utc>,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            member_number: member.number.value(),
            name: member.name,
            document_id: member.document_id.into(),
            registered_at: member.registered_at,
        }
    }
}

/// 会員詳細レスポンス（貸出中の貸出・未払い罰金付き）
#[derive(Debug, Serialize)]
pub struct MemberDetailResponse {
    #[serde(flatten)]
    pub member: MemberResponse,
    pub active_loan: Option<LoanResponse>,
    pub pending_fines: Vec<FineResponse>,
}

impl From<MemberDetail> for MemberDetailResponse {
    fn from(detail: MemberDetail) -> Self {
        Self {
            member: detail.member.into(),
            active_loan: detail.active_loan.map(LoanResponse::from),
            pending_fines: detail
                .pending_fines
                .into_iter()
                .map(FineResponse::from)
                .collect(),
        }
    }
}

// ============================================================================
// Loans
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartLoanRequest {
    pub book_code: String,
    pub member_number: i64,
}

impl StartLoanRequest {
    pub fn to_command(&self, started_at: DateTime<Utc>) -> Result<StartLoan, ValueError> {
        Ok(StartLoan {
            book_code: BookCode::parse(&self.book_code)?,
            member_number: MemberNumber::new(self.member_number),
            started_at,
        })
    }
}

/// 返却リクエスト（ボディ省略時は破損なし）
#[derive(Debug, Default, Deserialize)]
pub struct ReturnLoanRequest {
    #[serde(default)]
    pub damaged: bool,
}

impl ReturnLoanRequest {
    /// 空のボディのみ省略とみなす。解釈できないボディは破損フラグを失わないよう拒否する。
    pub fn from_body(body: &[u8]) -> Result<Self, String> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| format!("Invalid return body: {}", e))
    }
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    /// ステータスでフィルタリング（active, returned）
    pub status: Option<String>,
}

/// 貸出レコード
#[derive(Debug, Serialize)]
pub struct LoanRecordResponse {
    pub loan_id: Uuid,
    pub book_code: BookCode,
    pub member_number: i64,
    pub started_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl From<Loan> for LoanRecordResponse {
    fn from(loan: Loan) -> Self {
        Self {
            loan_id: loan.id.value(),
            member_number: loan.member_number.value(),
            started_at: loan.started_at,
            returned_at: loan.returned_at,
            status: loan.status.as_str().to_string(),
            book_code: loan.book_code,
        }
    }
}

/// 一覧表示用の貸出（書籍名・著者・会員名付き）
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    #[serde(flatten)]
    pub loan: LoanRecordResponse,
    pub book_title: String,
    pub book_author: String,
    pub member_name: String,
}

impl From<LoanView> for LoanResponse {
    fn from(view: LoanView) -> Self {
        Self {
            loan: view.loan.into(),
            book_title: view.display.book_title,
            book_author: view.display.book_author,
            member_name: view.display.member_name,
        }
    }
}

/// 返却レスポンス
#[derive(Debug, Serialize)]
pub struct ReturnLoanResponse {
    pub loan: LoanRecordResponse,
    /// 破損返却の場合のみ
    pub fine: Option<FineResponse>,
}

impl From<ReturnOutcome> for ReturnLoanResponse {
    fn from(outcome: ReturnOutcome) -> Self {
        Self {
            loan: outcome.loan.into(),
            fine: outcome.fine.map(FineResponse::from),
        }
    }
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<LoanStatus, String> {
    status.parse::<LoanStatus>()
}

// ============================================================================
// Fines
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IssueFineRequest {
    pub member_number: i64,
    pub loan_id: Option<Uuid>,
    pub reason: String,
    /// 最小通貨単位。省略時は既定額
    pub amount_cents: Option<i64>,
}

impl IssueFineRequest {
    pub fn to_command(&self, issued_at: DateTime<Utc>) -> Result<IssueFine, ValueError> {
        let amount = self.amount_cents.map(Amount::from_cents).transpose()?;
        IssueFine::new(
            MemberNumber::new(self.member_number),
            self.loan_id.map(LoanId::from_uuid),
            &self.reason,
            amount,
            issued_at,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ListFinesQuery {
    pub member_number: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FineResponse {
    pub fine_id: Uuid,
    pub member_number: i64,
    pub loan_id: Option<Uuid>,
    pub reason: String,
    pub amount_cents: i64,
    /// 表示用（例: "150.00"）
    pub amount: String,
    pub issued_at: DateTime<Utc>,
    pub status: String,
}

impl From<Fine> for FineResponse {
    fn from(fine: Fine) -> Self {
        Self {
            fine_id: fine.id.value(),
            member_number: fine.member_number.value(),
            loan_id: fine.loan_id.map(|id| id.value()),
            amount_cents: fine.amount.cents(),
            amount: fine.amount.to_string(),
            issued_at: fine.issued_at,
            status: fine.status.as_str().to_string(),
            reason: fine.reason,
        }
    }
}

/// 一覧表示用の罰金（会員名付き）
#[derive(Debug, Serialize)]
pub struct FineListItemResponse {
    #[serde(flatten)]
    pub fine: FineResponse,
    pub member_name: String,
}

impl From<FineView> for FineListItemResponse {
    fn from(view: FineView) -> Self {
        Self {
            fine: view.fine.into(),
            member_name: view.member_name,
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardStatsResponse {
    pub total_books: usize,
    pub available_books: usize,
    pub total_members: usize,
    pub active_loans: usize,
    pub pending_fines: usize,
}

impl From<DashboardStats> for DashboardStatsResponse {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total_books: stats.total_books,
            available_books: stats.available_books,
            total_members: stats.total_members,
            active_loans: stats.active_loans,
            pending_fines: stats.pending_fines,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
