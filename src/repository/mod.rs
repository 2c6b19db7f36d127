//! Repository layer: store traits and their PostgreSQL / in-memory backends

pub mod books;
pub mod loans;
pub mod memory;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::error::AppResult;

pub use books::BooksStore;
pub use loans::LoansStore;
pub use memory::MemoryStore;
pub use users::UsersStore;

/// Handles to every store, shared by the services
#[derive(Clone)]
pub struct Repository {
    /// Present only for the PostgreSQL backend
    pub pool: Option<Pool<Postgres>>,
    pub users: Arc<dyn UsersStore>,
    pub books: Arc<dyn BooksStore>,
    pub loans: Arc<dyn LoansStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by a fresh in-process store
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            pool: None,
            users: store.clone(),
            books: store.clone(),
            loans: store,
        }
    }

    /// Check that the backing database answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
