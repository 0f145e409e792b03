//! Loan ledger service

use chrono::{NaiveDate, Utc};

use crate::{
    config::LoansConfig,
    error::AppResult,
    models::loan::{LoanDetails, LoanOutcome, LoanPolicy},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    policy: LoanPolicy,
}

impl LoansService {
    pub fn new(repository: Repository, config: &LoansConfig) -> Self {
        Self {
            repository,
            policy: LoanPolicy::from(config),
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Borrow a book for a reader
    pub async fn borrow(&self, reader_id: i32, book_id: i32) -> AppResult<LoanOutcome> {
        self.repository
            .loans
            .borrow(reader_id, book_id, &self.policy, Self::today())
            .await
    }

    /// Return a book borrowed by a reader
    pub async fn return_book(&self, reader_id: i32, book_id: i32) -> AppResult<LoanOutcome> {
        self.repository
            .loans
            .return_book(reader_id, book_id, &self.policy, Self::today())
            .await
    }

    /// Outstanding loans, soonest due first
    pub async fn outstanding_loans(&self, reader_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.outstanding(reader_id, Self::today()).await
    }

    /// Returned loans, most recent first
    pub async fn loan_history(
        &self,
        reader_id: i32,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.repository
            .loans
            .history(reader_id, page, per_page, Self::today())
            .await
    }

    /// Delete every outstanding loan of a book, restoring its stock
    pub async fn clear_outstanding(&self, book_id: i32) -> AppResult<(i64, i32)> {
        self.repository.loans.clear_outstanding(book_id).await
    }
}
