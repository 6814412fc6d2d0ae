use crate::domain::{
    Book, BookCode, BookStatus, Fine, FineId, FineStatus, Loan, LoanId, LoanStatus, Member,
    MemberNumber, NewMember,
};
use async_trait::async_trait;
use thiserror::Error;

/// ストアが保証する一意制約
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    BookCode,
    DocumentId,
    /// 会員ごとのActiveな貸出は1件まで
    ActiveLoanForMember,
    /// 書籍ごとのActiveな貸出は1件まで
    ActiveLoanForBook,
}

/// エンティティストアのエラー
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    Duplicate(UniqueKey),

    #[error("store backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// 貸出の検索条件（すべて等値条件、AND結合）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub member_number: Option<MemberNumber>,
    pub book_code: Option<BookCode>,
}

impl LoanFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: LoanStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_member(mut self, member_number: MemberNumber) -> Self {
        self.member_number = Some(member_number);
        self
    }

    pub fn for_book(mut self, book_code: BookCode) -> Self {
        self.book_code = Some(book_code);
        self
    }

    pub fn matches(&self, loan: &Loan) -> bool {
        self.status.is_none_or(|s| loan.status == s)
            && self.member_number.is_none_or(|n| loan.member_number == n)
            && self.book_code.as_ref().is_none_or(|c| &loan.book_code == c)
    }
}

/// 罰金の検索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineFilter {
    pub status: Option<FineStatus>,
    pub member_number: Option<MemberNumber>,
}

impl FineFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: FineStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_member(mut self, member_number: MemberNumber) -> Self {
        self.member_number = Some(member_number);
        self
    }

    pub fn matches(&self, fine: &Fine) -> bool {
        self.status.is_none_or(|s| fine.status == s)
            && self.member_number.is_none_or(|n| fine.member_number == n)
    }
}

/// エンティティストアポート
///
/// Book, Member, Loan, Fineの4コレクションを保持する。
/// 外部キー制約は持たない（参照整合性はポリシーエンジンが書き込み時に保証する）。
/// 物理削除は行わない。
///
/// 読み取り系メソッドはトランザクション外のスナップショットを返す。
/// 状態遷移を伴う操作は必ず`begin()`で得たトランザクション内で行う。
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// 原子的な作業単位を開始する
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    async fn find_book(&self, code: &BookCode) -> Result<Option<Book>>;

    /// 目録コード順
    async fn find_books(&self) -> Result<Vec<Book>>;

    async fn find_member(&self, number: MemberNumber) -> Result<Option<Member>>;

    /// 会員番号順
    async fn find_members(&self) -> Result<Vec<Member>>;

    async fn find_loan(&self, id: LoanId) -> Result<Option<Loan>>;

    /// 貸出開始日時順
    async fn find_loans(&self, filter: &LoanFilter) -> Result<Vec<Loan>>;

    async fn find_fine(&self, id: FineId) -> Result<Option<Fine>>;

    /// 発行日時順
    async fn find_fines(&self, filter: &FineFilter) -> Result<Vec<Fine>>;
}

/// ストアのトランザクション
///
/// `lock_*`で読んだ行は、コミットまたはドロップまで他のトランザクションから変更されない。
/// `commit()`せずにドロップした場合、すべての書き込みは破棄される。
#[async_trait]
pub trait StoreTransaction: Send {
    async fn lock_member(&mut self, number: MemberNumber) -> Result<Option<Member>>;

    async fn lock_book(&mut self, code: &BookCode) -> Result<Option<Book>>;

    async fn lock_loan(&mut self, id: LoanId) -> Result<Option<Loan>>;

    async fn lock_fine(&mut self, id: FineId) -> Result<Option<Fine>>;

    async fn exists_loan(&mut self, filter: &LoanFilter) -> Result<bool>;

    async fn exists_fine(&mut self, filter: &FineFilter) -> Result<bool>;

    /// 目録コードが既に存在する場合は`Duplicate(BookCode)`
    async fn insert_book(&mut self, book: &Book) -> Result<()>;

    /// 会員番号を原子的に採番して挿入する
    ///
    /// 身分証明書番号が既に存在する場合は`Duplicate(DocumentId)`
    async fn insert_member(&mut self, member: &NewMember) -> Result<Member>;

    async fn insert_loan(&mut self, loan: &Loan) -> Result<()>;

    async fn update_loan(&mut self, loan: &Loan) -> Result<()>;

    /// 書籍が存在しない場合は何もしない
    async fn set_book_status(&mut self, code: &BookCode, status: BookStatus) -> Result<()>;

    async fn insert_fine(&mut self, fine: &Fine) -> Result<()>;

    async fn update_fine(&mut self, fine: &Fine) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
