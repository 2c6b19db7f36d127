//! Book (livre) model and request types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::loan::LoanState;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    /// False while a loan on this book is open
    pub available: bool,
}

impl Book {
    pub fn state(&self) -> LoanState {
        if self.available {
            LoanState::Available
        } else {
            LoanState::OnLoan
        }
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
}

/// Update book request (only title and author are applied)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateBook {
    pub title: String,
    pub author: String,
}
