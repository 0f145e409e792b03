//! Catalog repository: authors, publishers and categories

use sqlx::{Pool, Postgres};

use super::books::like_pattern;
use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{author::Author, category::Category, publisher::Publisher},
};

fn name_conflict(kind: &str, name: &str) -> impl FnOnce(sqlx::Error) -> AppError {
    let message = format!("{} '{}' already exists", kind, name);
    move |e| {
        if is_unique_violation(&e) {
            AppError::Conflict(message)
        } else {
            AppError::Database(e)
        }
    }
}

/// Escaped ILIKE pattern for a non-blank search, `None` otherwise
fn search_term(search: Option<&str>) -> Option<String> {
    search.map(str::trim).filter(|s| !s.is_empty()).map(like_pattern)
}

#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn list_authors(&self, search: Option<&str>) -> AppResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT id, name, bio FROM authors
            WHERE ($1::text IS NULL OR name ILIKE $1)
            ORDER BY name
            "#,
        )
        .bind(search_term(search))
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT id, name, bio FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    pub async fn create_author(&self, name: &str, bio: Option<&str>) -> AppResult<Author> {
        let author = sqlx::query_as::<_, Author>(
            "INSERT INTO authors (name, bio) VALUES ($1, $2) RETURNING id, name, bio",
        )
        .bind(name)
        .bind(bio)
        .fetch_one(&self.pool)
        .await
        .map_err(name_conflict("Author", name))?;
        Ok(author)
    }

    pub async fn update_author(&self, id: i32, name: &str, bio: Option<&str>) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            "UPDATE authors SET name = $1, bio = $2 WHERE id = $3 RETURNING id, name, bio",
        )
        .bind(name)
        .bind(bio)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(name_conflict("Author", name))?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }
        Ok(())
    }

    // =========================================================================
    // PUBLISHERS
    // =========================================================================

    pub async fn list_publishers(&self, search: Option<&str>) -> AppResult<Vec<Publisher>> {
        let publishers = sqlx::query_as::<_, Publisher>(
            r#"
            SELECT id, name FROM publishers
            WHERE ($1::text IS NULL OR name ILIKE $1)
            ORDER BY name
            "#,
        )
        .bind(search_term(search))
        .fetch_all(&self.pool)
        .await?;
        Ok(publishers)
    }

    pub async fn get_publisher(&self, id: i32) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>("SELECT id, name FROM publishers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Publisher with id {} not found", id)))
    }

    pub async fn create_publisher(&self, name: &str) -> AppResult<Publisher> {
        let publisher = sqlx::query_as::<_, Publisher>(
            "INSERT INTO publishers (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(name_conflict("Publisher", name))?;
        Ok(publisher)
    }

    pub async fn update_publisher(&self, id: i32, name: &str) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>(
            "UPDATE publishers SET name = $1 WHERE id = $2 RETURNING id, name",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(name_conflict("Publisher", name))?
        .ok_or_else(|| AppError::NotFound(format!("Publisher with id {} not found", id)))
    }

    /// Delete a publisher and, by cascade, its books. Refused while any of
    /// those books is on loan.
    pub async fn delete_publisher(&self, id: i32) -> AppResult<()> {
        let on_loan: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans l JOIN books b ON b.id = l.book_id
                WHERE b.publisher_id = $1 AND l.return_date IS NULL
            )
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if on_loan {
            return Err(AppError::Conflict(
                "Publisher has books currently on loan".to_string(),
            ));
        }

        let deleted = sqlx::query("DELETE FROM publishers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Publisher with id {} not found", id)));
        }
        Ok(())
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(&self, search: Option<&str>) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name FROM categories
            WHERE ($1::text IS NULL OR name ILIKE $1)
            ORDER BY name
            "#,
        )
        .bind(search_term(search))
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn create_category(&self, name: &str) -> AppResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(name_conflict("Category", name))?;
        Ok(category)
    }

    pub async fn update_category(&self, id: i32, name: &str) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $1 WHERE id = $2 RETURNING id, name",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(name_conflict("Category", name))?
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        Ok(())
    }
}
