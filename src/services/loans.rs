//! Loan management service: the borrow and return transitions

use chrono::{NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{most_recent, LoanState},
        user::User,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Resolve the authenticated caller to its user record
    async fn caller(&self, username: &str) -> AppResult<User> {
        self.repository
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication(format!("Unknown user '{}'", username)))
    }

    /// Borrow a book (Available -> OnLoan)
    pub async fn borrow(&self, book_id: i64, username: &str) -> AppResult<Book> {
        let user = self.caller(username).await?;

        let book = match self.repository.books.get(book_id).await? {
            Some(book) if book.state() == LoanState::Available => book,
            _ => {
                return Err(AppError::Conflict(format!(
                    "Book {} is not available",
                    book_id
                )))
            }
        };

        let loan = self
            .repository
            .loans
            .open_loan(book.id, user.id, Self::today())
            .await?
            .ok_or_else(|| {
                tracing::warn!(book_id, username, "Borrow lost to a concurrent loan");
                AppError::Conflict(format!("Book {} is not available", book_id))
            })?;

        tracing::info!(loan_id = loan.id, book_id, username, "Book borrowed");
        Ok(Book {
            available: false,
            ..book
        })
    }

    /// Return a borrowed book (OnLoan -> Available)
    pub async fn return_book(&self, book_id: i64, username: &str) -> AppResult<Book> {
        let user = self.caller(username).await?;

        let candidates = self.repository.loans.active_loans(user.id, book_id).await?;
        let loan = most_recent(&candidates).ok_or_else(|| {
            AppError::Conflict(format!(
                "Book {} is not on loan to '{}'",
                book_id, username
            ))
        })?;

        if !self
            .repository
            .loans
            .close_loan(loan.id, book_id, Self::today())
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Loan {} was already returned",
                loan.id
            )));
        }

        tracing::info!(loan_id = loan.id, book_id, username, "Book returned");

        self.repository
            .books
            .get(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        models::book::CreateBook,
        repository::{loans::MockLoansStore, BooksStore, LoansStore, MemoryStore, UsersStore},
    };

    struct Fixture {
        store: Arc<MemoryStore>,
        loans: LoansService,
        book_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        UsersStore::insert(store.as_ref(), "alice", "hash").await.unwrap();
        UsersStore::insert(store.as_ref(), "bob", "hash").await.unwrap();
        let book = BooksStore::insert(
            store.as_ref(),
            &CreateBook {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

        Fixture {
            loans: LoansService::new(Repository::from_memory(store.clone())),
            store,
            book_id: book.id,
        }
    }

    /// available == true iff no active loan on the book
    async fn assert_flag_consistent(store: &MemoryStore, book_id: i64) {
        let book = store.get(book_id).await.unwrap().unwrap();
        let active = store
            .loans_for_book(book_id)
            .await
            .unwrap()
            .iter()
            .filter(|loan| loan.is_active())
            .count();
        assert_eq!(book.available, active == 0);
    }

    #[tokio::test]
    async fn test_borrow_marks_book_on_loan() {
        let f = fixture().await;
        let book = f.loans.borrow(f.book_id, "alice").await.unwrap();
        assert!(!book.available);
        assert_eq!(book.state(), LoanState::OnLoan);

        let loans = f.store.loans_for_book(f.book_id).await.unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].borrowed_on, Utc::now().date_naive());
        assert!(loans[0].is_active());
        assert_flag_consistent(&f.store, f.book_id).await;
    }

    #[tokio::test]
    async fn test_borrow_twice_conflicts() {
        let f = fixture().await;
        f.loans.borrow(f.book_id, "alice").await.unwrap();

        let again = f.loans.borrow(f.book_id, "alice").await.unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));
        let other = f.loans.borrow(f.book_id, "bob").await.unwrap_err();
        assert!(matches!(other, AppError::Conflict(_)));
        assert_eq!(f.store.loans_for_book(f.book_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_borrow_missing_book_conflicts() {
        let f = fixture().await;
        let err = f.loans.borrow(404, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_borrow_by_unknown_user() {
        let f = fixture().await;
        let err = f.loans.borrow(f.book_id, "mallory").await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
        assert_flag_consistent(&f.store, f.book_id).await;
    }

    #[tokio::test]
    async fn test_return_without_loan_conflicts() {
        let f = fixture().await;
        let err = f.loans.return_book(f.book_id, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_return_by_other_user_conflicts() {
        let f = fixture().await;
        f.loans.borrow(f.book_id, "alice").await.unwrap();

        let err = f.loans.return_book(f.book_id, "bob").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!f.store.get(f.book_id).await.unwrap().unwrap().available);
    }

    #[tokio::test]
    async fn test_borrow_return_borrow_cycle() {
        let f = fixture().await;

        assert!(!f.loans.borrow(f.book_id, "alice").await.unwrap().available);
        assert_flag_consistent(&f.store, f.book_id).await;

        assert!(f.loans.return_book(f.book_id, "alice").await.unwrap().available);
        assert_flag_consistent(&f.store, f.book_id).await;

        assert!(!f.loans.borrow(f.book_id, "bob").await.unwrap().available);
        assert_flag_consistent(&f.store, f.book_id).await;

        let loans = f.store.loans_for_book(f.book_id).await.unwrap();
        assert_eq!(loans.len(), 2);
        assert_eq!(loans[0].returned_on, Some(Utc::now().date_naive()));
        assert!(loans[1].is_active());
    }

    #[tokio::test]
    async fn test_return_closes_most_recent_loan() {
        let f = fixture().await;
        let older = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let newer = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let recent = f.store.insert_loan_unchecked(1, f.book_id, newer);
        let stale = f.store.insert_loan_unchecked(1, f.book_id, older);

        f.loans.return_book(f.book_id, "alice").await.unwrap();

        let loans = f.store.loans_for_book(f.book_id).await.unwrap();
        let closed = loans.iter().find(|l| l.id == recent.id).unwrap();
        let open = loans.iter().find(|l| l.id == stale.id).unwrap();
        assert!(!closed.is_active());
        assert!(open.is_active());
    }

    #[tokio::test]
    async fn test_borrow_losing_race_conflicts() {
        let f = fixture().await;
        let mut loans = MockLoansStore::new();
        loans.expect_open_loan().times(1).returning(|_, _, _| Ok(None));

        let repository = Repository {
            loans: Arc::new(loans),
            ..Repository::from_memory(f.store.clone())
        };
        let service = LoansService::new(repository);

        let err = service.borrow(f.book_id, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_return_after_concurrent_return_conflicts() {
        let f = fixture().await;
        let active = f.store.insert_loan_unchecked(1, f.book_id, Utc::now().date_naive());

        let mut loans = MockLoansStore::new();
        loans
            .expect_active_loans()
            .returning(move |_, _| Ok(vec![active.clone()]));
        loans.expect_close_loan().returning(|_, _, _| Ok(false));

        let repository = Repository {
            loans: Arc::new(loans),
            ..Repository::from_memory(f.store.clone())
        };
        let service = LoansService::new(repository);

        let err = service.return_book(f.book_id, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
