//! 表示用の結合（貸出 → 書籍・会員、罰金 → 会員）
//!
//! エンティティ自体は変更せず、表示専用のフィールドを持つビューを組み立てる。
//! 参照先が存在しない場合は一覧全体を失敗させず、プレースホルダーを表示する。

use crate::domain::{Book, BookCode, Fine, Loan, Member, MemberNumber};
use crate::ports::EntityStore;
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};

use super::errors::Result;

/// 参照先が見つからない場合の表示
pub const UNKNOWN: &str = "Unknown";

/// 貸出の表示用フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanDisplay {
    pub book_title: String,
    pub book_author: String,
    pub member_name: String,
}

/// 表示用の貸出ビュー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanView {
    pub loan: Loan,
    pub display: LoanDisplay,
}

/// 表示用の罰金ビュー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FineView {
    pub fine: Fine,
    pub member_name: String,
}

/// 参照される書籍・会員を重複なく一度ずつ取得する
async fn fetch_books(
    store: &dyn EntityStore,
    codes: BTreeSet<&BookCode>,
) -> Result<BTreeMap<BookCode, Book>> {
    let books = try_join_all(codes.into_iter().map(|code| store.find_book(code))).await?;
    Ok(books
        .into_iter()
        .flatten()
        .map(|book| (book.code.clone(), book))
        .collect())
}

async fn fetch_members(
    store: &dyn EntityStore,
    numbers: BTreeSet<MemberNumber>,
) -> Result<BTreeMap<MemberNumber, Member>> {
    let members =
        try_join_all(numbers.into_iter().map(|number| store.find_member(number))).await?;
    Ok(members
        .into_iter()
        .flatten()
        .map(|member| (member.number, member))
        .collect())
}

pub async fn enrich_loans(store: &dyn EntityStore, loans: Vec<Loan>) -> Result<Vec<LoanView>> {
    let (books, members) = futures::try_join!(
        fetch_books(store, loans.iter().map(|loan| &loan.book_code).collect()),
        fetch_members(store, loans.iter().map(|loan| loan.member_number).collect()),
    )?;

    Ok(loans
        .into_iter()
        .map(|loan| {
            let book = books.get(&loan.book_code);
            let display = LoanDisplay {
                book_title: book.map_or(UNKNOWN, |b| b.title.as_str()).to_string(),
                book_author: book.map_or(UNKNOWN, |b| b.author.as_str()).to_string(),
                member_name: members
                    .get(&loan.member_number)
                    .map_or(UNKNOWN, |m| m.name.as_str())
                    .to_string(),
            };
            LoanView { loan, display }
        })
        .collect())
}

pub async fn enrich_fines(store: &dyn EntityStore, fines: Vec<Fine>) -> Result<Vec<FineView>> {
    let members =
        fetch_members(store, fines.iter().map(|fine| fine.member_number).collect()).await?;

    Ok(fines
        .into_iter()
        .map(|fine| FineView {
            member_name: members
                .get(&fine.member_number)
                .map_or(UNKNOWN, |m| m.name.as_str())
                .to_string(),
            fine,
        })
        .collect())
}
