//! Catalog management service

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Books that can be borrowed right now
    pub async fn list_available(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list_available().await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository
            .books
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        let created = self.repository.books.insert(&book).await?;
        tracing::info!(book_id = created.id, title = %created.title, "Book created");
        Ok(created)
    }

    /// Update title and author of an existing book
    pub async fn update_book(&self, id: i64, book: UpdateBook) -> AppResult<Book> {
        self.repository
            .books
            .update(id, &book)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book together with its loan history
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        let loans_removed = self
            .repository
            .books
            .delete(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        tracing::info!(book_id = id, loans_removed, "Book deleted");
        Ok(())
    }

    /// Books currently held by a user; empty when the user is unknown
    pub async fn active_loans(&self, username: &str) -> AppResult<Vec<Book>> {
        match self.repository.users.find_by_username(username).await? {
            Some(user) => self.repository.loans.active_books_for_user(user.id).await,
            None => Ok(Vec::new()),
        }
    }
}
