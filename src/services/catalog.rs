//! Catalog management service

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorRequest},
        book::{Book, BookQuery, BookRequest},
        category::{Category, CategoryRequest},
        publisher::{Publisher, PublisherRequest},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // Books

    /// Search books; `viewer` is the authenticated reader, if any
    pub async fn search_books(&self, query: &BookQuery, viewer: Option<i32>) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query, viewer).await
    }

    pub async fn get_book(&self, id: i32, viewer: Option<i32>) -> AppResult<Book> {
        self.repository.books.get_by_id(id, viewer).await
    }

    pub async fn create_book(&self, book: BookRequest) -> AppResult<Book> {
        book.validate()?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book created");
        Ok(created)
    }

    pub async fn update_book(&self, id: i32, book: BookRequest) -> AppResult<Book> {
        book.validate()?;
        self.repository.books.update(id, &book).await
    }

    pub async fn delete_book(&self, id: i32, force: bool) -> AppResult<()> {
        self.repository.books.delete(id, force).await?;
        tracing::info!(book_id = id, force, "Book deleted");
        Ok(())
    }

    // Authors

    pub async fn list_authors(&self, search: Option<&str>) -> AppResult<Vec<Author>> {
        self.repository.catalog.list_authors(search).await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.catalog.get_author(id).await
    }

    pub async fn create_author(&self, author: AuthorRequest) -> AppResult<Author> {
        author.validate()?;
        self.repository
            .catalog
            .create_author(author.name.trim(), author.bio.as_deref())
            .await
    }

    pub async fn update_author(&self, id: i32, author: AuthorRequest) -> AppResult<Author> {
        author.validate()?;
        self.repository
            .catalog
            .update_author(id, author.name.trim(), author.bio.as_deref())
            .await
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.catalog.delete_author(id).await
    }

    // Publishers

    pub async fn list_publishers(&self, search: Option<&str>) -> AppResult<Vec<Publisher>> {
        self.repository.catalog.list_publishers(search).await
    }

    pub async fn get_publisher(&self, id: i32) -> AppResult<Publisher> {
        self.repository.catalog.get_publisher(id).await
    }

    pub async fn create_publisher(&self, publisher: PublisherRequest) -> AppResult<Publisher> {
        publisher.validate()?;
        self.repository.catalog.create_publisher(publisher.name.trim()).await
    }

    pub async fn update_publisher(&self, id: i32, publisher: PublisherRequest) -> AppResult<Publisher> {
        publisher.validate()?;
        self.repository.catalog.update_publisher(id, publisher.name.trim()).await
    }

    pub async fn delete_publisher(&self, id: i32) -> AppResult<()> {
        self.repository.catalog.delete_publisher(id).await
    }

    // Categories

    pub async fn list_categories(&self, search: Option<&str>) -> AppResult<Vec<Category>> {
        self.repository.catalog.list_categories(search).await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.catalog.get_category(id).await
    }

    pub async fn create_category(&self, category: CategoryRequest) -> AppResult<Category> {
        category.validate()?;
        self.repository.catalog.create_category(category.name.trim()).await
    }

    pub async fn update_category(&self, id: i32, category: CategoryRequest) -> AppResult<Category> {
        category.validate()?;
        self.repository.catalog.update_category(id, category.name.trim()).await
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.catalog.delete_category(id).await
    }
}
