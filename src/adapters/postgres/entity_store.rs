use crate::domain::{
    Amount, Book, BookCode, BookStatus, DocumentId, Fine, FineId, FineStatus, Loan, LoanId,
    LoanStatus, Member, MemberNumber, NewMember,
};
use crate::ports::entity_store::{
    EntityStore as EntityStoreTrait, FineFilter, LoanFilter, Result, StoreError,
    StoreTransaction, UniqueKey,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use std::str::FromStr;

impl From<sqlx::Error> for StoreError {
    /// 一意制約違反は制約名で識別する。それ以外はバックエンドの障害
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let key = match db_err.constraint() {
                    Some("books_pkey") => Some(UniqueKey::BookCode),
                    Some("members_document_id_key") => Some(UniqueKey::DocumentId),
                    Some("loans_active_member_idx") => Some(UniqueKey::ActiveLoanForMember),
                    Some("loans_active_book_idx") => Some(UniqueKey::ActiveLoanForBook),
                    _ => None,
                };
                if let Some(key) = key {
                    return StoreError::Duplicate(key);
                }
            }
        }
        StoreError::Backend(Box::new(err))
    }
}

fn invalid_data(message: String) -> StoreError {
    StoreError::Backend(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let code: String = row.try_get("code")?;
    let status: &str = row.try_get("status")?;

    Ok(Book {
        code: BookCode::parse(&code).map_err(|e| invalid_data(e.to_string()))?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        cover_image_url: row.try_get("cover_image_url")?,
        status: BookStatus::from_str(status).map_err(invalid_data)?,
    })
}

fn map_row_to_member(row: &PgRow) -> Result<Member> {
    let document_id: String = row.try_get("document_id")?;

    Ok(Member {
        number: MemberNumber::new(row.try_get("member_number")?),
        name: row.try_get("name")?,
        document_id: DocumentId::parse(&document_id).map_err(|e| invalid_data(e.to_string()))?,
        registered_at: row.try_get("registered_at")?,
    })
}

fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    let book_code: String = row.try_get("book_code")?;
    let status: &str = row.try_get("status")?;

    Ok(Loan {
        id: LoanId::from_uuid(row.try_get("loan_id")?),
        book_code: BookCode::parse(&book_code).map_err(|e| invalid_data(e.to_string()))?,
        member_number: MemberNumber::new(row.try_get("member_number")?),
        started_at: row.try_get("started_at")?,
        returned_at: row.try_get("returned_at")?,
        status: LoanStatus::from_str(status).map_err(invalid_data)?,
    })
}

fn map_row_to_fine(row: &PgRow) -> Result<Fine> {
    let loan_id: Option<uuid::Uuid> = row.try_get("loan_id")?;
    let amount_cents: i64 = row.try_get("amount_cents")?;
    let status: &str = row.try_get("status")?;

    Ok(Fine {
        id: FineId::from_uuid(row.try_get("fine_id")?),
        member_number: MemberNumber::new(row.try_get("member_number")?),
        loan_id: loan_id.map(LoanId::from_uuid),
        reason: row.try_get("reason")?,
        amount: Amount::from_cents(amount_cents).map_err(|e| invalid_data(e.to_string()))?,
        issued_at: row.try_get("issued_at")?,
        status: FineStatus::from_str(status).map_err(invalid_data)?,
    })
}

/// EntityStoreのPostgreSQL実装
///
/// 作業単位はデータベーストランザクション。`lock_*`は`SELECT ... FOR UPDATE`で行を取得するため、
/// 同じ会員・書籍・貸出・罰金に対する並行した作業単位は待機し、コミット済みの状態を読み直す。
/// Activeな貸出の部分一意インデックスが最後の防衛線となる。
pub struct EntityStore {
    pool: PgPool,
}

impl EntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStoreTrait for EntityStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(Transaction { tx }))
    }

    async fn find_book(&self, code: &BookCode) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT code, title, author, cover_image_url, status
            FROM books
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn find_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            r#"
            SELECT code, title, author, cover_image_url, status
            FROM books
            ORDER BY code ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }

    async fn find_member(&self, number: MemberNumber) -> Result<Option<Member>> {
        let row = sqlx::query(
            r#"
            SELECT member_number, name, document_id, registered_at
            FROM members
            WHERE member_number = $1
            "#,
        )
        .bind(number.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_member).transpose()
    }

    async fn find_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query(
            r#"
            SELECT member_number, name, document_id, registered_at
            FROM members
            ORDER BY member_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_member).collect()
    }

    async fn find_loan(&self, id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            r#"
            SELECT loan_id, book_code, member_number, started_at, returned_at, status
            FROM loans
            WHERE loan_id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn find_loans(&self, filter: &LoanFilter) -> Result<Vec<Loan>> {
        let rows = sqlx::query(
            r#"
            SELECT loan_id, book_code, member_number, started_at, returned_at, status
            FROM loans
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::bigint IS NULL OR member_number = $2)
              AND ($3::text IS NULL OR book_code = $3)
            ORDER BY started_at ASC, loan_id ASC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.member_number.map(|n| n.value()))
        .bind(filter.book_code.as_ref().map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    async fn find_fine(&self, id: FineId) -> Result<Option<Fine>> {
        let row = sqlx::query(
            r#"
            SELECT fine_id, member_number, loan_id, reason, amount_cents, issued_at, status
            FROM fines
            WHERE fine_id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_fine).transpose()
    }

    async fn find_fines(&self, filter: &FineFilter) -> Result<Vec<Fine>> {
        let rows = sqlx::query(
            r#"
            SELECT fine_id, member_number, loan_id, reason, amount_cents, issued_at, status
            FROM fines
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::bigint IS NULL OR member_number = $2)
            ORDER BY issued_at ASC, fine_id ASC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.member_number.map(|n| n.value()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_fine).collect()
    }
}

/// データベーストランザクション（コミットせずにドロップするとロールバック）
pub struct Transaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for Transaction {
    async fn lock_member(&mut self, number: MemberNumber) -> Result<Option<Member>> {
        let row = sqlx::query(
            r#"
            SELECT member_number, name, document_id, registered_at
            FROM members
            WHERE member_number = $1
            FOR UPDATE
            "#,
        )
        .bind(number.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(map_row_to_member).transpose()
    }

    async fn lock_book(&mut self, code: &BookCode) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT code, title, author, cover_image_url, status
            FROM books
            WHERE code = $1
            FOR UPDATE
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn lock_loan(&mut self, id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            r#"
            SELECT loan_id, book_code, member_number, started_at, returned_at, status
            FROM loans
            WHERE loan_id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn lock_fine(&mut self, id: FineId) -> Result<Option<Fine>> {
        let row = sqlx::query(
            r#"
            SELECT fine_id, member_number, loan_id, reason, amount_cents, issued_at, status
            FROM fines
            WHERE fine_id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(map_row_to_fine).transpose()
    }

    async fn exists_loan(&mut self, filter: &LoanFilter) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM loans
                WHERE ($1::text IS NULL OR status = $1)
                  AND ($2::bigint IS NULL OR member_number = $2)
                  AND ($3::text IS NULL OR book_code = $3)
            )
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.member_number.map(|n| n.value()))
        .bind(filter.book_code.as_ref().map(|c| c.as_str()))
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn exists_fine(&mut self, filter: &FineFilter) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM fines
                WHERE ($1::text IS NULL OR status = $1)
                  AND ($2::bigint IS NULL OR member_number = $2)
            )
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.member_number.map(|n| n.value()))
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_book(&mut self, book: &Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (code, title, author, cover_image_url, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(book.code.as_str())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.cover_image_url.as_deref())
        .bind(book.status.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// 会員番号はIDENTITY列が採番する。ロールバックされた番号は欠番になり、再利用されない。
    async fn insert_member(&mut self, member: &NewMember) -> Result<Member> {
        let number: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO members (name, document_id, registered_at)
            VALUES ($1, $2, $3)
            RETURNING member_number
            "#,
        )
        .bind(&member.name)
        .bind(member.document_id.as_str())
        .bind(member.registered_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(member.clone().with_number(MemberNumber::new(number)))
    }

    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (loan_id, book_code, member_number, started_at, returned_at, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(loan.id.value())
        .bind(loan.book_code.as_str())
        .bind(loan.member_number.value())
        .bind(loan.started_at)
        .bind(loan.returned_at)
        .bind(loan.status.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE loans
            SET returned_at = $2, status = $3
            WHERE loan_id = $1
            "#,
        )
        .bind(loan.id.value())
        .bind(loan.returned_at)
        .bind(loan.status.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_book_status(&mut self, code: &BookCode, status: BookStatus) -> Result<()> {
        sqlx::query("UPDATE books SET status = $2 WHERE code = $1")
            .bind(code.as_str())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_fine(&mut self, fine: &Fine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fines (fine_id, member_number, loan_id, reason, amount_cents, issued_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(fine.id.value())
        .bind(fine.member_number.value())
        .bind(fine.loan_id.map(|id| id.value()))
        .bind(&fine.reason)
        .bind(fine.amount.cents())
        .bind(fine.issued_at)
        .bind(fine.status.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_fine(&mut self, fine: &Fine) -> Result<()> {
        sqlx::query("UPDATE fines SET status = $2 WHERE fine_id = $1")
            .bind(fine.id.value())
            .bind(fine.status.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Transaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
