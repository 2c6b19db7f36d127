//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksStore: Send + Sync {
    /// Books not currently on loan, ordered by id
    async fn list_available(&self) -> AppResult<Vec<Book>>;

    async fn get(&self, id: i64) -> AppResult<Option<Book>>;

    /// New books are always stored as available
    async fn insert(&self, book: &CreateBook) -> AppResult<Book>;

    /// Applies title and author; None when the book does not exist
    async fn update(&self, id: i64, book: &UpdateBook) -> AppResult<Option<Book>>;

    /// Deletes the book and all of its loans in one unit.
    /// Returns the number of loans removed, or None when the book does not exist.
    async fn delete(&self, id: i64) -> AppResult<Option<u64>>;
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksStore for BooksRepository {
    async fn list_available(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, description, available FROM books WHERE available ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn get(&self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, description, available FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn insert(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, description, available)
            VALUES ($1, $2, $3, TRUE)
            RETURNING id, title, author, description, available
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, id: i64, book: &UpdateBook) -> AppResult<Option<Book>> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET title = $2, author = $3
            WHERE id = $1
            RETURNING id, title, author, description, available
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&book.author)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete(&self, id: i64) -> AppResult<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        let loans_removed = sqlx::query("DELETE FROM loans WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(loans_removed))
    }
}
