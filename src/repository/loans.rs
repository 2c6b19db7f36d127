//! Loans repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{book::Book, loan::Loan},
};

use super::is_unique_violation;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansStore: Send + Sync {
    /// Books held by the user (loans without a return date), oldest loan first
    async fn active_books_for_user(&self, user_id: i64) -> AppResult<Vec<Book>>;

    /// Active loans of one user on one book
    async fn active_loans(&self, user_id: i64, book_id: i64) -> AppResult<Vec<Loan>>;

    /// Every loan ever recorded on a book
    async fn loans_for_book(&self, book_id: i64) -> AppResult<Vec<Loan>>;

    /// Marks the book unavailable and records the loan as one unit.
    /// Returns None, writing nothing, when the book is missing or not available.
    async fn open_loan(&self, book_id: i64, user_id: i64, on: NaiveDate) -> AppResult<Option<Loan>>;

    /// Sets the return date and recomputes the book's availability as one unit.
    /// Returns false, writing nothing, when the loan is not active anymore.
    async fn close_loan(&self, loan_id: i64, book_id: i64, on: NaiveDate) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoansStore for LoansRepository {
    async fn active_books_for_user(&self, user_id: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.id, b.title, b.author, b.description, b.available
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.user_id = $1 AND l.returned_on IS NULL
            ORDER BY l.borrowed_on, l.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn active_loans(&self, user_id: i64, book_id: i64) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, user_id, book_id, borrowed_on, returned_on
            FROM loans
            WHERE user_id = $1 AND book_id = $2 AND returned_on IS NULL
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn loans_for_book(&self, book_id: i64) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, user_id, book_id, borrowed_on, returned_on
            FROM loans
            WHERE book_id = $1
            ORDER BY id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn open_loan(&self, book_id: i64, user_id: i64, on: NaiveDate) -> AppResult<Option<Loan>> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-set: only one concurrent borrower can flip the flag
        let flipped = sqlx::query("UPDATE books SET available = FALSE WHERE id = $1 AND available")
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if flipped == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let inserted = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, borrowed_on, returned_on)
            VALUES ($1, $2, $3, NULL)
            RETURNING id, user_id, book_id, borrowed_on, returned_on
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(on)
        .fetch_one(&mut *tx)
        .await;

        let loan = match inserted {
            Ok(loan) => loan,
            // loans_one_active_per_book: an active loan exists despite the flag
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Ok(None);
            }
            Err(e) => return Err(AppError::Database(e)),
        };

        tx.commit().await?;
        Ok(Some(loan))
    }

    async fn close_loan(&self, loan_id: i64, book_id: i64, on: NaiveDate) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            "UPDATE loans SET returned_on = $2 WHERE id = $1 AND returned_on IS NULL",
        )
        .bind(loan_id)
        .bind(on)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if closed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE books
            SET available = NOT EXISTS (
                SELECT 1 FROM loans WHERE book_id = $1 AND returned_on IS NULL
            )
            WHERE id = $1
            "#,
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
