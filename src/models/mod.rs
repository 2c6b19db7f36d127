//! Data models for the Livres server

pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, CreateBook, UpdateBook};
pub use loan::{Loan, LoanState};
pub use user::{Credentials, User, UserClaims};
