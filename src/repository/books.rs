//! Books repository for database operations

use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Postgres, Row, Transaction};

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{
        author::Author,
        book::{Book, BookQuery, BookRequest, BookRow},
        category::Category,
        pagination,
    },
};

const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.isbn, b.publisher_id, p.name AS publisher_name,
           b.publication_date, b.summary, b.quantity
    FROM books b
    JOIN publishers p ON p.id = b.publisher_id
"#;

/// Matches title, ISBN, publisher, author or category name
const SEARCH_CONDITION: &str = r#"
    ($1::text IS NULL
     OR b.title ILIKE $1
     OR b.isbn ILIKE $1
     OR p.name ILIKE $1
     OR EXISTS (SELECT 1 FROM book_authors ba JOIN authors a ON a.id = ba.author_id
                WHERE ba.book_id = b.id AND a.name ILIKE $1)
     OR EXISTS (SELECT 1 FROM book_categories bc JOIN categories c ON c.id = bc.category_id
                WHERE bc.book_id = b.id AND c.name ILIKE $1))
"#;

/// Build an ILIKE substring pattern, escaping LIKE wildcards in user input
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn dedup(ids: &[i32]) -> Vec<i32> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Get book by ID; `viewer` drives the derived user status
    pub async fn get_by_id(&self, id: i32, viewer: Option<i32>) -> AppResult<Book> {
        let row = sqlx::query_as::<_, BookRow>(&format!("{} WHERE b.id = $1", BOOK_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let mut books = self.assemble(vec![row], viewer).await?;
        books
            .pop()
            .ok_or_else(|| AppError::Internal("Book assembly returned no row".to_string()))
    }

    /// Search books with pagination, newest publication first
    pub async fn search(&self, query: &BookQuery, viewer: Option<i32>) -> AppResult<(Vec<Book>, i64)> {
        let (_, per_page, offset) = pagination(query.page, query.per_page);
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM books b JOIN publishers p ON p.id = b.publisher_id WHERE {}",
            SEARCH_CONDITION
        ))
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "{} WHERE {} ORDER BY b.publication_date DESC, b.id DESC LIMIT $2 OFFSET $3",
            BOOK_SELECT, SEARCH_CONDITION
        ))
        .bind(pattern.as_deref())
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let books = self.assemble(rows, viewer).await?;
        Ok((books, total))
    }

    /// Attach authors, categories and viewer status to book rows
    async fn assemble(&self, rows: Vec<BookRow>, viewer: Option<i32>) -> AppResult<Vec<Book>> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut authors: HashMap<i32, Vec<Author>> = HashMap::new();
        for r in sqlx::query(
            r#"
            SELECT ba.book_id, a.id, a.name, a.bio
            FROM book_authors ba
            JOIN authors a ON a.id = ba.author_id
            WHERE ba.book_id = ANY($1)
            ORDER BY a.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?
        {
            authors.entry(r.get("book_id")).or_default().push(Author {
                id: r.get("id"),
                name: r.get("name"),
                bio: r.get("bio"),
            });
        }

        let mut categories: HashMap<i32, Vec<Category>> = HashMap::new();
        for r in sqlx::query(
            r#"
            SELECT bc.book_id, c.id, c.name
            FROM book_categories bc
            JOIN categories c ON c.id = bc.category_id
            WHERE bc.book_id = ANY($1)
            ORDER BY c.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?
        {
            categories.entry(r.get("book_id")).or_default().push(Category {
                id: r.get("id"),
                name: r.get("name"),
            });
        }

        let held: HashSet<i32> = match viewer {
            Some(reader_id) => sqlx::query_scalar::<_, i32>(
                r#"
                SELECT book_id FROM loans
                WHERE reader_id = $1 AND return_date IS NULL AND book_id = ANY($2)
                "#,
            )
            .bind(reader_id)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect(),
            None => HashSet::new(),
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                Book::from_row(
                    row,
                    authors.remove(&id).unwrap_or_default(),
                    categories.remove(&id).unwrap_or_default(),
                    held.contains(&id),
                )
            })
            .collect())
    }

    // =========================================================================
    // CREATE / UPDATE
    // =========================================================================

    /// Create a new book with its author and category links
    pub async fn create(&self, book: &BookRequest) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        Self::check_references(&mut tx, book).await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO books (title, isbn, publisher_id, publication_date, summary, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.publisher_id)
        .bind(book.publication_date)
        .bind(&book.summary)
        .bind(book.quantity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| isbn_conflict(e, &book.isbn))?;

        Self::link(&mut tx, id, book).await?;
        tx.commit().await?;

        self.get_by_id(id, None).await
    }

    /// Replace a book's fields and links
    pub async fn update(&self, id: i32, book: &BookRequest) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        Self::check_references(&mut tx, book).await?;

        let updated = sqlx::query(
            r#"
            UPDATE books SET
                title = $1, isbn = $2, publisher_id = $3,
                publication_date = $4, summary = $5, quantity = $6
            WHERE id = $7
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.publisher_id)
        .bind(book.publication_date)
        .bind(&book.summary)
        .bind(book.quantity)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| isbn_conflict(e, &book.isbn))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM book_categories WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::link(&mut tx, id, book).await?;

        tx.commit().await?;

        self.get_by_id(id, None).await
    }

    async fn check_references(tx: &mut Transaction<'_, Postgres>, book: &BookRequest) -> AppResult<()> {
        let publisher_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM publishers WHERE id = $1)")
                .bind(book.publisher_id)
                .fetch_one(&mut **tx)
                .await?;
        if !publisher_exists {
            return Err(AppError::NotFound(format!(
                "Publisher with id {} not found",
                book.publisher_id
            )));
        }

        let author_ids = dedup(&book.author_ids);
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors WHERE id = ANY($1)")
            .bind(&author_ids)
            .fetch_one(&mut **tx)
            .await?;
        if found != author_ids.len() as i64 {
            return Err(AppError::NotFound("One or more authors not found".to_string()));
        }

        let category_ids = dedup(&book.category_ids);
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ANY($1)")
            .bind(&category_ids)
            .fetch_one(&mut **tx)
            .await?;
        if found != category_ids.len() as i64 {
            return Err(AppError::NotFound("One or more categories not found".to_string()));
        }

        Ok(())
    }

    async fn link(tx: &mut Transaction<'_, Postgres>, book_id: i32, book: &BookRequest) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO book_authors (book_id, author_id) SELECT $1, UNNEST($2::int[])",
        )
        .bind(book_id)
        .bind(dedup(&book.author_ids))
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO book_categories (book_id, category_id) SELECT $1, UNNEST($2::int[])",
        )
        .bind(book_id)
        .bind(dedup(&book.category_ids))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Delete a book. Refused while it is on loan unless `force` is set,
    /// in which case its loans are removed with it.
    pub async fn delete(&self, id: i32, force: bool) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        let on_loan: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if on_loan > 0 && !force {
            return Err(AppError::Conflict(format!(
                "Book has {} outstanding loan(s)",
                on_loan
            )));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn isbn_conflict(e: sqlx::Error, isbn: &str) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(format!("A book with ISBN {} already exists", isbn))
    } else {
        AppError::Database(e)
    }
}
