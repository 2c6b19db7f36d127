//! Loan (emprunt) model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrowed_on: NaiveDate,
    /// None while the loan is active
    pub returned_on: Option<NaiveDate>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.returned_on.is_none()
    }
}

/// Lending state of a single book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    Available,
    OnLoan,
}

/// Picks the loan to close among the active candidates: latest borrow date, then highest id.
pub fn most_recent(loans: &[Loan]) -> Option<&Loan> {
    loans
        .iter()
        .filter(|loan| loan.is_active())
        .max_by_key(|loan| (loan.borrowed_on, loan.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(id: i64, borrowed_on: NaiveDate, returned_on: Option<NaiveDate>) -> Loan {
        Loan {
            id,
            user_id: 1,
            book_id: 1,
            borrowed_on,
            returned_on,
        }
    }

    #[test]
    fn test_most_recent_prefers_latest_date() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let loans = vec![loan(7, d2, None), loan(9, d1, None)];
        assert_eq!(most_recent(&loans).map(|l| l.id), Some(7));
    }

    #[test]
    fn test_most_recent_breaks_ties_by_id() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let loans = vec![loan(3, d, None), loan(4, d, None)];
        assert_eq!(most_recent(&loans).map(|l| l.id), Some(4));
    }

    #[test]
    fn test_most_recent_ignores_returned() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let loans = vec![loan(1, d1, None), loan(2, d2, Some(d2))];
        assert_eq!(most_recent(&loans).map(|l| l.id), Some(1));
        assert!(most_recent(&[]).is_none());
    }
}
