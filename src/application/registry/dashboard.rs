use crate::domain::{FineStatus, LoanStatus};
use crate::ports::{FineFilter, LoanFilter};

use crate::application::{ServiceDependencies, errors::Result};

/// ダッシュボードの集計値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_books: usize,
    pub available_books: usize,
    pub total_members: usize,
    pub active_loans: usize,
    pub pending_fines: usize,
}

#[tracing::instrument(skip(deps))]
pub async fn dashboard_stats(deps: &ServiceDependencies) -> Result<DashboardStats> {
    let active = LoanFilter::all().with_status(LoanStatus::Active);
    let pending = FineFilter::all().with_status(FineStatus::Pending);

    let (books, members, loans, fines) = futures::try_join!(
        deps.store.find_books(),
        deps.store.find_members(),
        deps.store.find_loans(&active),
        deps.store.find_fines(&pending),
    )?;

    Ok(DashboardStats {
        total_books: books.len(),
        available_books: books.iter().filter(|book| book.is_available()).count(),
        total_members: members.len(),
        active_loans: loans.len(),
        pending_fines: fines.len(),
    })
}
