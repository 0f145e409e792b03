//! Loans repository: the borrow/return ledger
//!
//! Every mutation runs in a single transaction that locks the reader row and
//! then the book row (always in that order), evaluates the loan policy against
//! that locked snapshot, and applies the stock change together with the loan
//! row change.

use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{is_unique_violation, AppError, AppResult, LoanRejection},
    models::{
        book::{BookShort, UserBookStatus},
        loan::{Loan, LoanBookRow, LoanDetails, LoanOutcome, LoanPolicy, LoanStatus},
        pagination,
    },
};

const LOAN_COLUMNS: &str = "id, reader_id, book_id, borrow_date, due_date, return_date, status";

const LOAN_BOOK_SELECT: &str = r#"
    SELECT l.id, l.reader_id, l.book_id, l.borrow_date, l.due_date, l.return_date, l.status,
           b.title, b.isbn, b.quantity
    FROM loans l
    JOIN books b ON b.id = l.book_id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn lock_reader(tx: &mut Transaction<'_, Postgres>, reader_id: i32) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(reader_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", reader_id)))?;
        Ok(())
    }

    async fn lock_book(tx: &mut Transaction<'_, Postgres>, book_id: i32) -> AppResult<BookShort> {
        sqlx::query_as::<_, BookShort>(
            "SELECT id, title, isbn, quantity FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }

    async fn outstanding_for_reader(
        tx: &mut Transaction<'_, Postgres>,
        reader_id: i32,
    ) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE reader_id = $1 AND return_date IS NULL",
            LOAN_COLUMNS
        ))
        .bind(reader_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(loans)
    }

    /// Borrow a book: decrement stock and open a loan, atomically
    pub async fn borrow(
        &self,
        reader_id: i32,
        book_id: i32,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> AppResult<LoanOutcome> {
        let mut tx = self.pool.begin().await?;

        Self::lock_reader(&mut tx, reader_id).await?;
        let mut book = Self::lock_book(&mut tx, book_id).await?;
        let reader_loans = Self::outstanding_for_reader(&mut tx, reader_id).await?;

        policy.check_borrow(&reader_loans, book_id, book.quantity, today)?;

        let quantity = sqlx::query_scalar::<_, i32>(
            "UPDATE books SET quantity = quantity - 1 WHERE id = $1 AND quantity > 0 RETURNING quantity",
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LoanRejection::OutOfStock)?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (reader_id, book_id, borrow_date, due_date, return_date, status)
            VALUES ($1, $2, $3, $4, NULL, $5)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(reader_id)
        .bind(book_id)
        .bind(today)
        .bind(policy.due_date(today))
        .bind(LoanStatus::OnLoan)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Loan(LoanRejection::AlreadyBorrowed)
            } else {
                AppError::Database(e)
            }
        })?;

        tx.commit().await?;

        tracing::info!(
            reader_id,
            book_id,
            loan_id = loan.id,
            due_date = %loan.due_date,
            quantity,
            "Book borrowed"
        );

        book.quantity = quantity;
        Ok(LoanOutcome {
            loan: LoanDetails::new(&loan, book, today),
            quantity,
            user_status: UserBookStatus::Borrowed,
        })
    }

    /// Return a book: close the outstanding loan and increment stock, atomically
    pub async fn return_book(
        &self,
        reader_id: i32,
        book_id: i32,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> AppResult<LoanOutcome> {
        let mut tx = self.pool.begin().await?;

        Self::lock_reader(&mut tx, reader_id).await?;
        let mut book = Self::lock_book(&mut tx, book_id).await?;
        let reader_loans = Self::outstanding_for_reader(&mut tx, reader_id).await?;

        let open = policy.find_returnable(&reader_loans, book_id)?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE loans SET return_date = $1, status = $2
            WHERE id = $3 AND return_date IS NULL
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(today)
        .bind(LoanStatus::Returned)
        .bind(open.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LoanRejection::NotBorrowed)?;

        let quantity = sqlx::query_scalar::<_, i32>(
            "UPDATE books SET quantity = quantity + 1 WHERE id = $1 RETURNING quantity",
        )
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(reader_id, book_id, loan_id = loan.id, quantity, "Book returned");

        book.quantity = quantity;
        Ok(LoanOutcome {
            loan: LoanDetails::new(&loan, book, today),
            quantity,
            user_status: UserBookStatus::derive(false, quantity),
        })
    }

    /// Outstanding loans of a reader, soonest due first
    pub async fn outstanding(&self, reader_id: i32, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query_as::<_, LoanBookRow>(&format!(
            "{} WHERE l.reader_id = $1 AND l.return_date IS NULL ORDER BY l.due_date ASC, l.id ASC",
            LOAN_BOOK_SELECT
        ))
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_details(today)).collect())
    }

    /// Returned loans of a reader, most recently returned first
    pub async fn history(
        &self,
        reader_id: i32,
        page: Option<i64>,
        per_page: Option<i64>,
        today: NaiveDate,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let (_, per_page, offset) = pagination(page, per_page);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE reader_id = $1 AND return_date IS NOT NULL",
        )
        .bind(reader_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, LoanBookRow>(&format!(
            r#"
            {} WHERE l.reader_id = $1 AND l.return_date IS NOT NULL
            ORDER BY l.return_date DESC, l.id DESC
            LIMIT $2 OFFSET $3
            "#,
            LOAN_BOOK_SELECT
        ))
        .bind(reader_id)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(|r| r.into_details(today)).collect(), total))
    }

    /// Administrative correction: delete all outstanding loans of a book and
    /// give their copies back to stock. Returns (loans removed, new quantity).
    pub async fn clear_outstanding(&self, book_id: i32) -> AppResult<(i64, i32)> {
        let mut tx = self.pool.begin().await?;

        Self::lock_book(&mut tx, book_id).await?;

        let removed = sqlx::query("DELETE FROM loans WHERE book_id = $1 AND return_date IS NULL")
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected() as i64;

        let quantity = sqlx::query_scalar::<_, i32>(
            "UPDATE books SET quantity = quantity + $1 WHERE id = $2 RETURNING quantity",
        )
        .bind(removed as i32)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::warn!(book_id, removed, quantity, "Outstanding loans cleared by administrator");

        Ok((removed, quantity))
    }
}
