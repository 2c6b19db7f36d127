//! In-process store implementing every store trait.
//!
//! All tables live behind a single mutex, so each trait call, including the
//! borrow and return transitions, is applied atomically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        loan::Loan,
        user::User,
    },
};

use super::{BooksStore, LoansStore, UsersStore};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    books: BTreeMap<i64, Book>,
    loans: BTreeMap<i64, Loan>,
    last_user_id: i64,
    last_book_id: i64,
    last_loan_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn has_active_loan(&self, book_id: i64) -> bool {
        self.loans
            .values()
            .any(|loan| loan.book_id == book_id && loan.is_active())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an active loan without touching the book, bypassing the
    /// one-active-loan rule. Only used to build inconsistent fixtures.
    #[cfg(test)]
    pub(crate) fn insert_loan_unchecked(&self, user_id: i64, book_id: i64, on: NaiveDate) -> Loan {
        let mut tables = self.tables.lock();
        let loan = Loan {
            id: next_id(&mut tables.last_loan_id),
            user_id,
            book_id,
            borrowed_on: on,
            returned_on: None,
        };
        tables.loans.insert(loan.id, loan.clone());
        loan
    }
}

#[async_trait]
impl UsersStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock();
        Ok(tables
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn insert(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|user| user.username == username) {
            return Err(AppError::Validation(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let user = User {
            id: next_id(&mut tables.last_user_id),
            username: username.to_string(),
            password: password_hash.to_string(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl BooksStore for MemoryStore {
    async fn list_available(&self) -> AppResult<Vec<Book>> {
        let tables = self.tables.lock();
        Ok(tables
            .books
            .values()
            .filter(|book| book.available)
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.tables.lock().books.get(&id).cloned())
    }

    async fn insert(&self, book: &CreateBook) -> AppResult<Book> {
        let mut tables = self.tables.lock();
        let created = Book {
            id: next_id(&mut tables.last_book_id),
            title: book.title.clone(),
            author: book.author.clone(),
            description: book.description.clone(),
            available: true,
        };
        tables.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, book: &UpdateBook) -> AppResult<Option<Book>> {
        let mut tables = self.tables.lock();
        Ok(tables.books.get_mut(&id).map(|existing| {
            existing.title = book.title.clone();
            existing.author = book.author.clone();
            existing.clone()
        }))
    }

    async fn delete(&self, id: i64) -> AppResult<Option<u64>> {
        let mut tables = self.tables.lock();
        if tables.books.remove(&id).is_none() {
            return Ok(None);
        }

        let before = tables.loans.len();
        tables.loans.retain(|_, loan| loan.book_id != id);
        Ok(Some((before - tables.loans.len()) as u64))
    }
}

#[async_trait]
impl LoansStore for MemoryStore {
    async fn active_books_for_user(&self, user_id: i64) -> AppResult<Vec<Book>> {
        let tables = self.tables.lock();
        let mut active: Vec<&Loan> = tables
            .loans
            .values()
            .filter(|loan| loan.user_id == user_id && loan.is_active())
            .collect();
        active.sort_by_key(|loan| (loan.borrowed_on, loan.id));

        Ok(active
            .into_iter()
            .filter_map(|loan| tables.books.get(&loan.book_id).cloned())
            .collect())
    }

    async fn active_loans(&self, user_id: i64, book_id: i64) -> AppResult<Vec<Loan>> {
        let tables = self.tables.lock();
        Ok(tables
            .loans
            .values()
            .filter(|loan| loan.user_id == user_id && loan.book_id == book_id && loan.is_active())
            .cloned()
            .collect())
    }

    async fn loans_for_book(&self, book_id: i64) -> AppResult<Vec<Loan>> {
        let tables = self.tables.lock();
        Ok(tables
            .loans
            .values()
            .filter(|loan| loan.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn open_loan(&self, book_id: i64, user_id: i64, on: NaiveDate) -> AppResult<Option<Loan>> {
        let mut tables = self.tables.lock();

        match tables.books.get(&book_id) {
            Some(book) if book.available => {}
            _ => return Ok(None),
        }
        if tables.has_active_loan(book_id) {
            return Ok(None);
        }

        let loan = Loan {
            id: next_id(&mut tables.last_loan_id),
            user_id,
            book_id,
            borrowed_on: on,
            returned_on: None,
        };
        tables.loans.insert(loan.id, loan.clone());
        if let Some(book) = tables.books.get_mut(&book_id) {
            book.available = false;
        }

        Ok(Some(loan))
    }

    async fn close_loan(&self, loan_id: i64, book_id: i64, on: NaiveDate) -> AppResult<bool> {
        let mut tables = self.tables.lock();

        match tables.loans.get_mut(&loan_id) {
            Some(loan) if loan.is_active() => loan.returned_on = Some(on),
            _ => return Ok(false),
        }

        let available = !tables.has_active_loan(book_id);
        if let Some(book) = tables.books.get_mut(&book_id) {
            book.available = available;
        }

        Ok(true)
    }
}
