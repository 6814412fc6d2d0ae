use crate::domain::{
    Fine, MemberNumber,
    commands::{IssueFine, SettleFine},
    policy,
};
use crate::ports::FineFilter;

use crate::application::{
    ServiceDependencies,
    errors::Result,
    lookup::{FineView, enrich_fines},
};

/// 罰金を発行する
///
/// 会員が存在することのみを要求する。貸出IDは値としてコピーするだけで検証しない。
#[tracing::instrument(skip(deps), fields(member_number = %cmd.member_number, amount = %cmd.amount))]
pub async fn issue_fine(deps: &ServiceDependencies, cmd: IssueFine) -> Result<Fine> {
    let mut tx = deps.store.begin().await?;

    let member = tx.lock_member(cmd.member_number).await?;
    let fine = policy::issue_fine(
        member.as_ref(),
        cmd.loan_id,
        cmd.reason,
        cmd.amount,
        cmd.issued_at,
    )?;

    tx.insert_fine(&fine).await?;
    tx.commit().await?;

    tracing::info!(fine_id = %fine.id, "fine issued");
    Ok(fine)
}

/// 罰金を精算する
///
/// 支払済みの罰金に対しては何も書き込まずに現在の状態を返す（冪等）。
#[tracing::instrument(skip(deps), fields(fine_id = %cmd.fine_id))]
pub async fn settle_fine(deps: &ServiceDependencies, cmd: SettleFine) -> Result<Fine> {
    let mut tx = deps.store.begin().await?;

    let fine = tx.lock_fine(cmd.fine_id).await?;
    let settlement = policy::settle_fine(fine)?;

    if settlement.changed {
        tx.update_fine(&settlement.fine).await?;
        tx.commit().await?;
        tracing::info!("fine settled");
    } else {
        tracing::debug!("fine was already paid");
    }

    Ok(settlement.fine)
}

/// 罰金一覧（会員名付き）
///
/// 発行日時の昇順。会員番号を指定した場合はその会員の罰金のみ。
#[tracing::instrument(skip(deps))]
pub async fn list_fines(
    deps: &ServiceDependencies,
    member_number: Option<MemberNumber>,
) -> Result<Vec<FineView>> {
    let filter = match member_number {
        Some(number) => FineFilter::all().for_member(number),
        None => FineFilter::all(),
    };

    let fines = deps.store.find_fines(&filter).await?;
    enrich_fines(deps.store.as_ref(), fines).await
}
