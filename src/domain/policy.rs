//! ポリシーエンジン
//!
//! 関連する3エンティティの読み取り専用スナップショットに対する純粋関数群。
//! 副作用なし。同じ入力に対して常に同じ結果を返す。

use chrono::{DateTime, Utc};

use super::{
    Amount, Book, BookCode, DAMAGE_REASON, Fine, FineId, FineStatus, IssueFineError, Loan, LoanId,
    LoanStatus, Member, MemberNumber, ReturnLoanError, SettleFineError, StartLoanError,
};

/// 貸出承認
///
/// `can_start_loan`が成功した場合にのみ得られる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanApproval {
    pub member_number: MemberNumber,
    pub book_code: BookCode,
}

/// 返却処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnOutcome {
    /// Returnedに遷移した貸出
    pub loan: Loan,
    /// Availableに戻すべき書籍
    pub released_book: BookCode,
    /// 破損返却の場合のみ発行される罰金
    pub fine: Option<Fine>,
}

/// 罰金精算の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub fine: Fine,
    /// 既に支払済みだった場合はfalse（冪等な再精算）
    pub changed: bool,
}

/// 純粋関数：貸出可否を判定する
///
/// ビジネスルール（この順序で評価し、最初に失敗したルールのエラーを返す）：
/// 1. 会員が存在すること
/// 2. 会員に貸出中の貸出がないこと
/// 3. 会員に未払いの罰金がないこと
/// 4. 書籍が存在すること
/// 5. 書籍が貸出可能であること
pub fn can_start_loan(
    member: Option<&Member>,
    book: Option<&Book>,
    has_active_loan: bool,
    has_pending_fine: bool,
) -> Result<LoanApproval, StartLoanError> {
    let member = member.ok_or(StartLoanError::MemberNotFound)?;

    if has_active_loan {
        return Err(StartLoanError::MemberHasActiveLoan);
    }

    if has_pending_fine {
        return Err(StartLoanError::MemberHasPendingFine);
    }

    let book = book.ok_or(StartLoanError::BookNotFound)?;

    if !book.is_available() {
        return Err(StartLoanError::BookUnavailable);
    }

    Ok(LoanApproval {
        member_number: member.number,
        book_code: book.code.clone(),
    })
}

/// 純粋関数：承認済みの貸出を開始する
///
/// 呼び出し側は返された貸出を挿入し、書籍をLoanedに更新する。
pub fn open_loan(approval: LoanApproval, started_at: DateTime<Utc>) -> Loan {
    Loan {
        id: LoanId::new(),
        book_code: approval.book_code,
        member_number: approval.member_number,
        started_at,
        returned_at: None,
        status: LoanStatus::Active,
    }
}

/// 純粋関数：返却を処理する
///
/// ビジネスルール：
/// - 貸出が存在すること
/// - 貸出がActiveであること（二重返却は拒否）
/// - 破損している場合は定額の罰金（Amount::DAMAGE）をPendingで発行する
pub fn process_return(
    loan: Option<Loan>,
    damaged: bool,
    returned_at: DateTime<Utc>,
) -> Result<ReturnOutcome, ReturnLoanError> {
    let loan = loan.ok_or(ReturnLoanError::LoanNotFound)?;

    if !loan.is_active() {
        return Err(ReturnLoanError::LoanAlreadyReturned);
    }

    let fine = damaged.then(|| Fine {
        id: FineId::new(),
        member_number: loan.member_number,
        loan_id: Some(loan.id),
        reason: DAMAGE_REASON.to_string(),
        amount: Amount::DAMAGE,
        issued_at: returned_at,
        status: FineStatus::Pending,
    });

    let released_book = loan.book_code.clone();
    let returned = Loan {
        returned_at: Some(returned_at),
        status: LoanStatus::Returned,
        ..loan
    };

    Ok(ReturnOutcome {
        loan: returned,
        released_book,
        fine,
    })
}

/// 純粋関数：罰金を発行する
///
/// 会員が存在することのみを要求する。未払い罰金の累積は制限しない。
pub fn issue_fine(
    member: Option<&Member>,
    loan_id: Option<LoanId>,
    reason: String,
    amount: Amount,
    issued_at: DateTime<Utc>,
) -> Result<Fine, IssueFineError> {
    let member = member.ok_or(IssueFineError::MemberNotFound)?;

    Ok(Fine {
        id: FineId::new(),
        member_number: member.number,
        loan_id,
        reason,
        amount,
        issued_at,
        status: FineStatus::Pending,
    })
}

/// 純粋関数：罰金を精算する
///
/// 支払済みの罰金を再度精算しても成功する（変更なし）。
pub fn settle_fine(fine: Option<Fine>) -> Result<Settlement, SettleFineError> {
    let fine = fine.ok_or(SettleFineError::FineNotFound)?;
    let changed = fine.is_pending();

    Ok(Settlement {
        fine: Fine {
            status: FineStatus::Paid,
            ..fine
        },
        changed,
    })
}
