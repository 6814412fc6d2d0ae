use crate::domain::{
    Book, BookCode, BookStatus, Fine, FineId, Loan, LoanId, Member, MemberNumber, NewMember,
};
use crate::ports::entity_store::{
    EntityStore as EntityStoreTrait, FineFilter, LoanFilter, Result, StoreError,
    StoreTransaction, UniqueKey,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Tables {
    books: BTreeMap<BookCode, Book>,
    members: BTreeMap<MemberNumber, Member>,
    loans: HashMap<LoanId, Loan>,
    fines: HashMap<FineId, Fine>,
    last_member_number: i64,
}

impl Tables {
    fn loans_matching(&self, filter: &LoanFilter) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .loans
            .values()
            .filter(|loan| filter.matches(loan))
            .cloned()
            .collect();
        loans.sort_by_key(|loan| (loan.started_at, loan.id.value()));
        loans
    }

    fn fines_matching(&self, filter: &FineFilter) -> Vec<Fine> {
        let mut fines: Vec<Fine> = self
            .fines
            .values()
            .filter(|fine| filter.matches(fine))
            .cloned()
            .collect();
        fines.sort_by_key(|fine| (fine.issued_at, fine.id.value()));
        fines
    }
}

/// EntityStoreのインメモリ実装
///
/// トランザクションは`begin()`からコミットまたはドロップまでストア全体のロックを保持する。
/// 書き込みは共有テーブルへ直接行い、変更前の値を取り消しログに積む。
/// コミットせずにドロップした場合はログを逆順に適用して元に戻す。
#[derive(Clone, Default)]
pub struct EntityStore {
    tables: Arc<Mutex<Tables>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStoreTrait for EntityStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(Transaction {
            tables,
            undo: Vec::new(),
        }))
    }

    async fn find_book(&self, code: &BookCode) -> Result<Option<Book>> {
        Ok(self.tables.lock().await.books.get(code).cloned())
    }

    async fn find_books(&self) -> Result<Vec<Book>> {
        Ok(self.tables.lock().await.books.values().cloned().collect())
    }

    async fn find_member(&self, number: MemberNumber) -> Result<Option<Member>> {
        Ok(self.tables.lock().await.members.get(&number).cloned())
    }

    async fn find_members(&self) -> Result<Vec<Member>> {
        Ok(self.tables.lock().await.members.values().cloned().collect())
    }

    async fn find_loan(&self, id: LoanId) -> Result<Option<Loan>> {
        Ok(self.tables.lock().await.loans.get(&id).cloned())
    }

    async fn find_loans(&self, filter: &LoanFilter) -> Result<Vec<Loan>> {
        Ok(self.tables.lock().await.loans_matching(filter))
    }

    async fn find_fine(&self, id: FineId) -> Result<Option<Fine>> {
        Ok(self.tables.lock().await.fines.get(&id).cloned())
    }

    async fn find_fines(&self, filter: &FineFilter) -> Result<Vec<Fine>> {
        Ok(self.tables.lock().await.fines_matching(filter))
    }
}

/// 取り消しログの1件（変更前の値。`None`は行が存在しなかったことを表す）
enum Undo {
    Book(BookCode, Option<Book>),
    Member(MemberNumber, Option<Member>),
    Loan(LoanId, Option<Loan>),
    Fine(FineId, Option<Fine>),
    LastMemberNumber(i64),
}

impl Undo {
    fn revert(self, tables: &mut Tables) {
        match self {
            Undo::Book(code, Some(book)) => {
                tables.books.insert(code, book);
            }
            Undo::Book(code, None) => {
                tables.books.remove(&code);
            }
            Undo::Member(number, Some(member)) => {
                tables.members.insert(number, member);
            }
            Undo::Member(number, None) => {
                tables.members.remove(&number);
            }
            Undo::Loan(id, Some(loan)) => {
                tables.loans.insert(id, loan);
            }
            Undo::Loan(id, None) => {
                tables.loans.remove(&id);
            }
            Undo::Fine(id, Some(fine)) => {
                tables.fines.insert(id, fine);
            }
            Undo::Fine(id, None) => {
                tables.fines.remove(&id);
            }
            Undo::LastMemberNumber(value) => tables.last_member_number = value,
        }
    }
}

/// インメモリテーブルに対する作業単位
pub struct Transaction {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Undo>,
}

impl Drop for Transaction {
    fn drop(&mut self) {
        while let Some(entry) = self.undo.pop() {
            entry.revert(&mut self.tables);
        }
    }
}

#[async_trait]
impl StoreTransaction for Transaction {
    async fn lock_member(&mut self, number: MemberNumber) -> Result<Option<Member>> {
        Ok(self.tables.members.get(&number).cloned())
    }

    async fn lock_book(&mut self, code: &BookCode) -> Result<Option<Book>> {
        Ok(self.tables.books.get(code).cloned())
    }

    async fn lock_loan(&mut self, id: LoanId) -> Result<Option<Loan>> {
        Ok(self.tables.loans.get(&id).cloned())
    }

    async fn lock_fine(&mut self, id: FineId) -> Result<Option<Fine>> {
        Ok(self.tables.fines.get(&id).cloned())
    }

    async fn exists_loan(&mut self, filter: &LoanFilter) -> Result<bool> {
        Ok(self.tables.loans.values().any(|loan| filter.matches(loan)))
    }

    async fn exists_fine(&mut self, filter: &FineFilter) -> Result<bool> {
        Ok(self.tables.fines.values().any(|fine| filter.matches(fine)))
    }

    async fn insert_book(&mut self, book: &Book) -> Result<()> {
        if self.tables.books.contains_key(&book.code) {
            return Err(StoreError::Duplicate(UniqueKey::BookCode));
        }
        self.tables.books.insert(book.code.clone(), book.clone());
        self.undo.push(Undo::Book(book.code.clone(), None));
        Ok(())
    }

    async fn insert_member(&mut self, member: &NewMember) -> Result<Member> {
        let taken = self
            .tables
            .members
            .values()
            .any(|existing| existing.document_id == member.document_id);
        if taken {
            return Err(StoreError::Duplicate(UniqueKey::DocumentId));
        }

        let previous = self.tables.last_member_number;
        self.tables.last_member_number += 1;
        self.undo.push(Undo::LastMemberNumber(previous));

        let member = member
            .clone()
            .with_number(MemberNumber::new(self.tables.last_member_number));
        self.tables.members.insert(member.number, member.clone());
        self.undo.push(Undo::Member(member.number, None));
        Ok(member)
    }

    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        if loan.is_active() {
            let active = self.tables.loans.values().filter(|l| l.is_active());
            for existing in active {
                if existing.member_number == loan.member_number {
                    return Err(StoreError::Duplicate(UniqueKey::ActiveLoanForMember));
                }
                if existing.book_code == loan.book_code {
                    return Err(StoreError::Duplicate(UniqueKey::ActiveLoanForBook));
                }
            }
        }
        let previous = self.tables.loans.insert(loan.id, loan.clone());
        self.undo.push(Undo::Loan(loan.id, previous));
        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        if let Some(slot) = self.tables.loans.get_mut(&loan.id) {
            let previous = std::mem::replace(slot, loan.clone());
            self.undo.push(Undo::Loan(loan.id, Some(previous)));
        }
        Ok(())
    }

    async fn set_book_status(&mut self, code: &BookCode, status: BookStatus) -> Result<()> {
        if let Some(book) = self.tables.books.get_mut(code) {
            let previous = book.clone();
            book.status = status;
            self.undo.push(Undo::Book(code.clone(), Some(previous)));
        }
        Ok(())
    }

    async fn insert_fine(&mut self, fine: &Fine) -> Result<()> {
        let previous = self.tables.fines.insert(fine.id, fine.clone());
        self.undo.push(Undo::Fine(fine.id, previous));
        Ok(())
    }

    async fn update_fine(&mut self, fine: &Fine) -> Result<()> {
        if let Some(slot) = self.tables.fines.get_mut(&fine.id) {
            let previous = std::mem::replace(slot, fine.clone());
            self.undo.push(Undo::Fine(fine.id, Some(previous)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.undo.clear();
        Ok(())
    }
}
