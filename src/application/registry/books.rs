use crate::domain::{Book, BookCode, commands::RegisterBook};
use crate::ports::LoanFilter;

use crate::application::{
    ServiceDependencies,
    errors::{ApplicationError, Result},
    lookup::{LoanView, enrich_loans},
};

/// 書籍詳細
#[derive(Debug, Clone)]
pub struct BookDetail {
    pub book: Book,
    /// 会員名付きの貸出履歴（開始日時の昇順）
    pub loans: Vec<LoanView>,
}

/// 書籍を目録に登録する
///
/// 新規の書籍は常に貸出可能。目録コードが重複する場合はDuplicateBookCode。
#[tracing::instrument(skip(deps), fields(code = %cmd.code))]
pub async fn register_book(deps: &ServiceDependencies, cmd: RegisterBook) -> Result<Book> {
    let book = Book::catalogue(cmd.code, cmd.title, cmd.author, cmd.cover_image_url);

    let mut tx = deps.store.begin().await?;
    tx.insert_book(&book).await?;
    tx.commit().await?;

    tracing::info!("book catalogued");
    Ok(book)
}

#[tracing::instrument(skip(deps))]
pub async fn list_books(deps: &ServiceDependencies) -> Result<Vec<Book>> {
    Ok(deps.store.find_books().await?)
}

#[tracing::instrument(skip(deps))]
pub async fn get_book_detail(deps: &ServiceDependencies, code: BookCode) -> Result<BookDetail> {
    let book = deps
        .store
        .find_book(&code)
        .await?
        .ok_or(ApplicationError::BookNotFound)?;

    let loans = deps
        .store
        .find_loans(&LoanFilter::all().for_book(code))
        .await?;
    let loans = enrich_loans(deps.store.as_ref(), loans).await?;

    Ok(BookDetail { book, loans })
}
