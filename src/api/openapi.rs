//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, categories, health, publishers, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelfmark API",
        version = "1.0.0",
        description = "Library catalog and loan ledger REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::token,
        auth::me,
        auth::update_me,
        // Users
        users::list_users,
        users::update_staff,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Loans
        books::borrow,
        books::return_book,
        books::clear_loans,
        books::my_borrowed_books,
        books::borrow_history,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Publishers
        publishers::list_publishers,
        publishers::get_publisher,
        publishers::create_publisher,
        publishers::update_publisher,
        publishers::delete_publisher,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Users
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::RegisterUser,
            crate::models::user::UpdateProfile,
            crate::models::user::UpdateStaff,
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookRequest,
            crate::models::book::UserBookStatus,
            // Loans
            books::LoanActionResponse,
            books::ClearLoansResponse,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            // Catalog
            crate::models::author::Author,
            crate::models::author::AuthorRequest,
            crate::models::publisher::Publisher,
            crate::models::publisher::PublisherRequest,
            crate::models::category::Category,
            crate::models::category::CategoryRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, tokens and own profile"),
        (name = "users", description = "User management"),
        (name = "books", description = "Book catalog"),
        (name = "loans", description = "Borrowing and returning books"),
        (name = "authors", description = "Authors"),
        (name = "publishers", description = "Publishers"),
        (name = "categories", description = "Categories")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected endpoints
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
