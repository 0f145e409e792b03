//! Book catalog and loan ledger endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, BookRequest, UserBookStatus},
        loan::{LoanDetails, LoanHistoryQuery, LoanOutcome},
    },
};

use super::{AuthenticatedUser, MaybeUser, PaginatedResponse, StaffUser};

/// Delete book query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteBookQuery {
    /// Delete even while loans are outstanding (their rows go with the book)
    pub force: Option<bool>,
}

/// Result of a borrow or a return
#[derive(Serialize, ToSchema)]
pub struct LoanActionResponse {
    /// Always "success"
    pub status: String,
    pub message: String,
    /// Copies available after the operation
    pub quantity: i32,
    pub user_status: UserBookStatus,
    pub loan: LoanDetails,
}

impl LoanActionResponse {
    fn new(message: String, outcome: LoanOutcome) -> Self {
        Self {
            status: "success".to_string(),
            message,
            quantity: outcome.quantity,
            user_status: outcome.user_status,
            loan: outcome.loan,
        }
    }
}

/// Result of an administrative loan reset
#[derive(Serialize, ToSchema)]
pub struct ClearLoansResponse {
    /// Always "success"
    pub status: String,
    /// Number of outstanding loans deleted
    pub removed: i64,
    /// Copies available after the reset
    pub quantity: i32,
}

/// Search books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books, newest publication first", body = PaginatedResponse<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    viewer: MaybeUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total) = state
        .services
        .catalog
        .search_books(&query, viewer.user_id())
        .await?;

    Ok(Json(PaginatedResponse::new(books, total, query.page, query.per_page)))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    viewer: MaybeUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id, viewer.user_id()).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown publisher, author or category", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Json(book): Json<BookRequest>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Path(id): Path<i32>,
    Json(book): Json<BookRequest>,
) -> AppResult<Json<Book>> {
    let updated = state.services.catalog.update_book(id, book).await?;
    Ok(Json(updated))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID"),
        DeleteBookQuery
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book has outstanding loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Path(id): Path<i32>,
    Query(query): Query<DeleteBookQuery>,
) -> AppResult<StatusCode> {
    state
        .services
        .catalog
        .delete_book(id, query.force.unwrap_or(false))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book borrowed", body = LoanActionResponse),
        (status = 400, description = "HasOverdue, LimitReached, AlreadyBorrowed or OutOfStock", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanActionResponse>> {
    let outcome = state.services.loans.borrow(claims.user_id, id).await?;
    let message = format!("Successfully borrowed «{}»", outcome.loan.book.title);

    Ok(Json(LoanActionResponse::new(message, outcome)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/books/{id}/return_book",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = LoanActionResponse),
        (status = 400, description = "NotBorrowed", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanActionResponse>> {
    let outcome = state.services.loans.return_book(claims.user_id, id).await?;
    let message = format!("Successfully returned «{}»", outcome.loan.book.title);

    Ok(Json(LoanActionResponse::new(message, outcome)))
}

/// Delete every outstanding loan of a book and restore its stock
#[utoipa::path(
    post,
    path = "/books/{id}/clear_loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Loans cleared", body = ClearLoansResponse),
        (status = 403, description = "Admin privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn clear_loans(
    State(state): State<crate::AppState>,
    _staff: StaffUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ClearLoansResponse>> {
    let (removed, quantity) = state.services.loans.clear_outstanding(id).await?;

    Ok(Json(ClearLoansResponse {
        status: "success".to_string(),
        removed,
        quantity,
    }))
}

/// Books the current user holds, soonest due first
#[utoipa::path(
    get,
    path = "/books/my_borrowed_books",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Outstanding loans", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_borrowed_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.outstanding_loans(claims.user_id).await?;
    Ok(Json(loans))
}

/// Books the current user has returned, most recent first
#[utoipa::path(
    get,
    path = "/books/borrow_history",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanHistoryQuery),
    responses(
        (status = 200, description = "Returned loans", body = PaginatedResponse<LoanDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanHistoryQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let (loans, total) = state
        .services
        .loans
        .loan_history(claims.user_id, query.page, query.per_page)
        .await?;

    Ok(Json(PaginatedResponse::new(loans, total, query.page, query.per_page)))
}
