//! Data models for Shelfmark

pub mod author;
pub mod book;
pub mod category;
pub mod loan;
pub mod publisher;
pub mod user;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookShort, UserBookStatus};
pub use category::Category;
pub use loan::{Loan, LoanDetails, LoanPolicy, LoanStatus};
pub use publisher::Publisher;
pub use user::{User, UserShort};

/// Name filter shared by the author, publisher and category listings
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct NameQuery {
    /// Case-insensitive substring match on name
    pub search: Option<String>,
}

/// Resolve page/per_page query values into (page, per_page, offset)
pub fn pagination(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, (page - 1).saturating_mul(per_page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(pagination(None, None), (1, 20, 0));
        assert_eq!(pagination(Some(3), Some(10)), (3, 10, 20));
    }

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(pagination(Some(0), Some(1000)), (1, 100, 0));
        assert_eq!(pagination(Some(-2), Some(0)), (1, 1, 0));
        assert_eq!(pagination(Some(i64::MAX), Some(100)), (i64::MAX, 100, i64::MAX));
    }
}
