//! Book catalog operations.
//!
//! Every call re-reads the whole catalog from the store. Mutations hold the
//! writer lock across load, change and save, so writers in this process never
//! overwrite each other's changes.

use std::sync::Arc;

use libris_store::{DocumentStore, StoreError};
use thiserror::Error;
use time::Date;
use tokio::sync::Mutex;

use super::models::{Book, BookFields, BookFilter, Catalog, Loan};

#[derive(Error, Debug)]
pub enum BookError {
    #[error("book {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type BookResult<T> = Result<T, BookError>;

pub struct BookService {
    store: Arc<dyn DocumentStore<Catalog>>,
    writer: Mutex<()>,
}

impl BookService {
    pub fn new(store: Arc<dyn DocumentStore<Catalog>>) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    /// Books matching `filter`, using today's UTC date for the overdue check.
    pub async fn list(&self, filter: &BookFilter) -> Vec<Book> {
        self.list_as_of(filter, crate::utils::today()).await
    }

    pub async fn list_as_of(&self, filter: &BookFilter, today: Date) -> Vec<Book> {
        let catalog = self.store.load().await;
        filter.apply(catalog.books, today)
    }

    pub async fn get(&self, id: u64) -> BookResult<Book> {
        let catalog = self.store.load().await;
        catalog
            .books
            .into_iter()
            .find(|b| b.id == id)
            .ok_or(BookError::NotFound(id))
    }

    pub async fn count(&self) -> usize {
        self.store.load().await.books.len()
    }

    pub async fn create(&self, fields: BookFields) -> BookResult<Book> {
        self.mutate(|catalog| {
            let book = Book {
                id: catalog.next_id(),
                title: fields.title,
                author: fields.author,
                year: Some(fields.year),
                isbn: fields.isbn,
                description: fields.description,
                is_available: true,
                reader: None,
                due_date: None,
            };
            catalog.books.push(book.clone());
            Ok(book)
        })
        .await
        .inspect(|book| tracing::info!(book_id = book.id, "book created"))
    }

    /// Replace the descriptive fields; lending state is left alone.
    pub async fn update(&self, id: u64, fields: BookFields) -> BookResult<Book> {
        self.mutate(|catalog| {
            let book = catalog.find_mut(id).ok_or(BookError::NotFound(id))?;
            book.title = fields.title;
            book.author = fields.author;
            book.year = Some(fields.year);
            book.isbn = fields.isbn;
            book.description = fields.description;
            Ok(book.clone())
        })
        .await
        .inspect(|_| tracing::info!(book_id = id, "book updated"))
    }

    /// Lend a book. An existing loan is overwritten without complaint.
    pub async fn lend(&self, id: u64, loan: Loan) -> BookResult<Book> {
        self.mutate(|catalog| {
            let book = catalog.find_mut(id).ok_or(BookError::NotFound(id))?;
            book.is_available = false;
            book.reader = Some(loan.reader);
            book.due_date = Some(loan.due_date);
            Ok(book.clone())
        })
        .await
        .inspect(|book| {
            tracing::info!(book_id = id, due_date = ?book.due_date, "book lent")
        })
    }

    pub async fn return_book(&self, id: u64) -> BookResult<Book> {
        self.mutate(|catalog| {
            let book = catalog.find_mut(id).ok_or(BookError::NotFound(id))?;
            book.is_available = true;
            book.reader = None;
            book.due_date = None;
            Ok(book.clone())
        })
        .await
        .inspect(|_| tracing::info!(book_id = id, "book returned"))
    }

    /// Remove a book and hand it back for confirmation messages.
    pub async fn delete(&self, id: u64) -> BookResult<Book> {
        self.mutate(|catalog| {
            let index = catalog
                .books
                .iter()
                .position(|b| b.id == id)
                .ok_or(BookError::NotFound(id))?;
            Ok(catalog.books.remove(index))
        })
        .await
        .inspect(|_| tracing::info!(book_id = id, "book deleted"))
    }

    async fn mutate<T, F>(&self, change: F) -> BookResult<T>
    where
        F: FnOnce(&mut Catalog) -> BookResult<T>,
    {
        let _guard = self.writer.lock().await;
        // An unreadable catalog must never become the base of a save.
        let mut catalog = self.store.try_load().await?;
        let result = change(&mut catalog)?;
        self.store.save(&catalog).await?;
        Ok(result)
    }
}
