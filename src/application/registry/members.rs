use crate::domain::{
    Fine, FineStatus, LoanStatus, Member, MemberNumber, NewMember, commands::RegisterMember,
};
use crate::ports::{FineFilter, LoanFilter};

use crate::application::{
    ServiceDependencies,
    errors::{ApplicationError, Result},
    lookup::{LoanView, enrich_loans},
};

/// 会員詳細
#[derive(Debug, Clone)]
pub struct MemberDetail {
    pub member: Member,
    /// 書籍名付きの貸出中の貸出（最大1件）
    pub active_loan: Option<LoanView>,
    pub pending_fines: Vec<Fine>,
}

/// 会員を登録する
///
/// 会員番号はストアが挿入時に採番する。身分証番号が重複する場合はDuplicateDocumentId。
#[tracing::instrument(skip(deps), fields(document_id = %cmd.document_id))]
pub async fn register_member(deps: &ServiceDependencies, cmd: RegisterMember) -> Result<Member> {
    let mut tx = deps.store.begin().await?;

    let member = tx
        .insert_member(&NewMember {
            name: cmd.name,
            document_id: cmd.document_id,
            registered_at: cmd.registered_at,
        })
        .await?;
    tx.commit().await?;

    tracing::info!(member_number = %member.number, "member registered");
    Ok(member)
}

#[tracing::instrument(skip(deps))]
pub async fn list_members(deps: &ServiceDependencies) -> Result<Vec<Member>> {
    Ok(deps.store.find_members().await?)
}

#[tracing::instrument(skip(deps))]
pub async fn get_member_detail(
    deps: &ServiceDependencies,
    number: MemberNumber,
) -> Result<MemberDetail> {
    let member = deps
        .store
        .find_member(number)
        .await?
        .ok_or(ApplicationError::MemberNotFound)?;

    let active = LoanFilter::all()
        .for_member(number)
        .with_status(LoanStatus::Active);
    let pending = FineFilter::all()
        .for_member(number)
        .with_status(FineStatus::Pending);
    let (active_loans, pending_fines) = futures::try_join!(
        deps.store.find_loans(&active),
        deps.store.find_fines(&pending),
    )?;

    let active_loan = enrich_loans(deps.store.as_ref(), active_loans)
        .await?
        .into_iter()
        .next();

    Ok(MemberDetail {
        member,
        active_loan,
        pending_fines,
    })
}
