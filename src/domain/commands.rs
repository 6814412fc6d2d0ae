use chrono::{DateTime, Utc};

use super::{
    Amount, BookCode, DocumentId, FineId, LoanId, MemberNumber, ValueError, value_objects::non_empty,
};

/// コマンド：書籍を貸し出す
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartLoan {
    pub book_code: BookCode,
    pub member_number: MemberNumber,
    pub started_at: DateTime<Utc>,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnLoan {
    pub loan_id: LoanId,
    pub damaged: bool,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：罰金を発行する
///
/// 金額を省略した場合は`Amount::LIBRARIAN_DEFAULT`が適用される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFine {
    pub member_number: MemberNumber,
    pub loan_id: Option<LoanId>,
    pub reason: String,
    pub amount: Amount,
    pub issued_at: DateTime<Utc>,
}

impl IssueFine {
    pub fn new(
        member_number: MemberNumber,
        loan_id: Option<LoanId>,
        reason: &str,
        amount: Option<Amount>,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, ValueError> {
        Ok(Self {
            member_number,
            loan_id,
            reason: non_empty("reason", reason)?,
            amount: amount.unwrap_or(Amount::LIBRARIAN_DEFAULT),
            issued_at,
        })
    }
}

/// コマンド：罰金を精算する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleFine {
    pub fine_id: FineId,
}

/// コマンド：会員を登録する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMember {
    pub name: String,
    pub document_id: DocumentId,
    pub registered_at: DateTime<Utc>,
}

impl RegisterMember {
    pub fn new(name: &str, document_id: &str, registered_at: DateTime<Utc>) -> Result<Self, ValueError> {
        Ok(Self {
            name: non_empty("name", name)?,
            document_id: DocumentId::parse(document_id)?,
            registered_at,
        })
    }
}

/// コマンド：書籍を目録に登録する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBook {
    pub code: BookCode,
    pub title: String,
    pub author: String,
    pub cover_image_url: Option<String>,
}

impl RegisterBook {
    pub fn new(
        code: &str,
        title: &str,
        author: &str,
        cover_image_url: Option<&str>,
    ) -> Result<Self, ValueError> {
        Ok(Self {
            code: BookCode::parse(code)?,
            title: non_empty("title", title)?,
            author: non_empty("author", author)?,
            cover_image_url: cover_image_url
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
        })
    }
}
