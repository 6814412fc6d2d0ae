use crate::domain::{
    BookStatus, FineStatus, Loan, LoanStatus,
    commands::{ReturnLoan, StartLoan},
    policy::{self, ReturnOutcome},
};
use crate::ports::{FineFilter, LoanFilter};

use crate::application::{
    ServiceDependencies,
    errors::Result,
    lookup::{LoanView, enrich_loans},
};

/// 書籍を貸し出す
///
/// ビジネスルール（この順序で判定）：
/// 1. 会員が存在すること
/// 2. 会員に貸出中の貸出がないこと
/// 3. 会員に未払いの罰金がないこと
/// 4. 書籍が存在すること
/// 5. 書籍が貸出可能であること
///
/// # 一貫性保証
///
/// 判定と書き込み（貸出の挿入、書籍のLoanedへの更新）は1つのトランザクションで行う。
/// ロック順序は 会員 → 書籍。同じ会員・書籍に対する並行リクエストは直列化される。
/// 途中で失敗した場合、トランザクションはドロップ時にロールバックされる。
#[tracing::instrument(skip(deps), fields(book_code = %cmd.book_code, member_number = %cmd.member_number))]
pub async fn start_loan(deps: &ServiceDependencies, cmd: StartLoan) -> Result<Loan> {
    let mut tx = deps.store.begin().await?;

    // 1. 会員をロックし、貸出中・未払い罰金の有無を確認
    let member = tx.lock_member(cmd.member_number).await?;
    let has_active_loan = tx
        .exists_loan(
            &LoanFilter::all()
                .for_member(cmd.member_number)
                .with_status(LoanStatus::Active),
        )
        .await?;
    let has_pending_fine = tx
        .exists_fine(
            &FineFilter::all()
                .for_member(cmd.member_number)
                .with_status(FineStatus::Pending),
        )
        .await?;

    // 2. 書籍をロック
    let book = tx.lock_book(&cmd.book_code).await?;

    // 3. ポリシーエンジンで判定
    let approval = policy::can_start_loan(
        member.as_ref(),
        book.as_ref(),
        has_active_loan,
        has_pending_fine,
    )
    .inspect_err(|reason| tracing::debug!(%reason, "loan rejected"))?;

    // 4. 書き込み
    let loan = policy::open_loan(approval, cmd.started_at);
    tx.insert_loan(&loan).await?;
    tx.set_book_status(&loan.book_code, BookStatus::Loaned)
        .await?;
    tx.commit().await?;

    tracing::info!(loan_id = %loan.id, "loan started");
    Ok(loan)
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - 貸出が存在すること
/// - 貸出がActiveであること（二重返却は拒否）
/// - 破損している場合は定額の罰金を発行する
///
/// ロック順序は 貸出 → 書籍。
#[tracing::instrument(skip(deps), fields(loan_id = %cmd.loan_id, damaged = cmd.damaged))]
pub async fn return_loan(deps: &ServiceDependencies, cmd: ReturnLoan) -> Result<ReturnOutcome> {
    let mut tx = deps.store.begin().await?;

    let loan = tx.lock_loan(cmd.loan_id).await?;
    if let Some(loan) = &loan {
        tx.lock_book(&loan.book_code).await?;
    }

    let outcome = policy::process_return(loan, cmd.damaged, cmd.returned_at)
        .inspect_err(|reason| tracing::debug!(%reason, "return rejected"))?;

    tx.update_loan(&outcome.loan).await?;
    tx.set_book_status(&outcome.released_book, BookStatus::Available)
        .await?;
    if let Some(fine) = &outcome.fine {
        tx.insert_fine(fine).await?;
    }
    tx.commit().await?;

    match &outcome.fine {
        Some(fine) => tracing::info!(fine_id = %fine.id, amount = %fine.amount, "loan returned damaged, fine issued"),
        None => tracing::info!("loan returned"),
    }
    Ok(outcome)
}

/// 貸出一覧（書籍名・著者・会員名付き）
///
/// 開始日時の昇順。
#[tracing::instrument(skip(deps))]
pub async fn list_loans(
    deps: &ServiceDependencies,
    status: Option<LoanStatus>,
) -> Result<Vec<LoanView>> {
    let filter = match status {
        Some(status) => LoanFilter::all().with_status(status),
        None => LoanFilter::all(),
    };

    let loans = deps.store.find_loans(&filter).await?;
    enrich_loans(deps.store.as_ref(), loans).await
}
