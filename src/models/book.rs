//! Book (catalog entry) model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{author::Author, category::Category, publisher::Publisher};

/// Availability of a book as seen by a given viewer. Computed per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserBookStatus {
    /// The viewer holds an outstanding loan for this book
    Borrowed,
    /// Not held by the viewer and at least one copy in stock
    Available,
    /// Not held by the viewer and no copy in stock
    NoStock,
}

impl UserBookStatus {
    pub fn derive(viewer_has_outstanding: bool, quantity: i32) -> Self {
        if viewer_has_outstanding {
            UserBookStatus::Borrowed
        } else if quantity > 0 {
            UserBookStatus::Available
        } else {
            UserBookStatus::NoStock
        }
    }
}

/// Flat row from the books/publishers join
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub publisher_id: i32,
    pub publisher_name: String,
    pub publication_date: NaiveDate,
    pub summary: String,
    pub quantity: i32,
}

/// Full book with its publisher, authors and categories
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub publisher: Publisher,
    pub authors: Vec<Author>,
    pub categories: Vec<Category>,
    pub publication_date: NaiveDate,
    pub summary: String,
    /// Copies currently available for loan
    pub quantity: i32,
    pub user_status: UserBookStatus,
}

impl Book {
    pub fn from_row(
        row: BookRow,
        authors: Vec<Author>,
        categories: Vec<Category>,
        viewer_has_outstanding: bool,
    ) -> Self {
        Book {
            id: row.id,
            title: row.title,
            isbn: row.isbn,
            publisher: Publisher {
                id: row.publisher_id,
                name: row.publisher_name,
            },
            authors,
            categories,
            publication_date: row.publication_date,
            summary: row.summary,
            user_status: UserBookStatus::derive(viewer_has_outstanding, row.quantity),
            quantity: row.quantity,
        }
    }
}

/// Short book representation embedded in loan records
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub quantity: i32,
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive match on title, ISBN, author, publisher or category name
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create or update book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 to 13 characters"))]
    pub isbn: String,
    pub publisher_id: i32,
    #[serde(default)]
    pub author_ids: Vec<i32>,
    #[serde(default)]
    pub category_ids: Vec<i32>,
    pub publication_date: NaiveDate,
    #[serde(default)]
    pub summary: String,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_borrowed_wins_over_stock() {
        assert_eq!(UserBookStatus::derive(true, 0), UserBookStatus::Borrowed);
        assert_eq!(UserBookStatus::derive(true, 3), UserBookStatus::Borrowed);
    }

    #[test]
    fn test_status_from_stock() {
        assert_eq!(UserBookStatus::derive(false, 1), UserBookStatus::Available);
        assert_eq!(UserBookStatus::derive(false, 0), UserBookStatus::NoStock);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&UserBookStatus::NoStock).unwrap(),
            "\"NO_STOCK\""
        );
        assert_eq!(
            serde_json::to_string(&UserBookStatus::Borrowed).unwrap(),
            "\"BORROWED\""
        );
    }

    #[test]
    fn test_book_request_validation() {
        let request: BookRequest = serde_json::from_value(serde_json::json!({
            "title": "",
            "isbn": "123",
            "publisher_id": 1,
            "publication_date": "2020-01-01",
            "quantity": -1
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("isbn"));
        assert!(fields.contains_key("quantity"));
        assert!(request.author_ids.is_empty());
    }
}
