//! Shelfmark library catalog server
//!
//! REST JSON API over a book catalog (books, authors, publishers, categories)
//! and a loan ledger that keeps book stock consistent with outstanding loans.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Accounts
        .route("/register", post(api::auth::register))
        .route("/token", post(api::auth::token))
        .route("/me", get(api::auth::me).put(api::auth::update_me))
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users/:id/staff", put(api::users::update_staff))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route("/books/my_borrowed_books", get(api::books::my_borrowed_books))
        .route("/books/borrow_history", get(api::books::borrow_history))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        .route("/books/:id/borrow", post(api::books::borrow))
        .route("/books/:id/return_book", post(api::books::return_book))
        .route("/books/:id/clear_loans", post(api::books::clear_loans))
        // Authors
        .route("/authors", get(api::authors::list_authors).post(api::authors::create_author))
        .route(
            "/authors/:id",
            get(api::authors::get_author)
                .put(api::authors::update_author)
                .delete(api::authors::delete_author),
        )
        // Publishers
        .route(
            "/publishers",
            get(api::publishers::list_publishers).post(api::publishers::create_publisher),
        )
        .route(
            "/publishers/:id",
            get(api::publishers::get_publisher)
                .put(api::publishers::update_publisher)
                .delete(api::publishers::delete_publisher),
        )
        // Categories
        .route(
            "/categories",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        .route(
            "/categories/:id",
            get(api::categories::get_category)
                .put(api::categories::update_category)
                .delete(api::categories::delete_category),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(api::openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
