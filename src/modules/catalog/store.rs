//! The catalog's persistence: every table behind one lock.
//!
//! Multi-step operations (the deletion guard, reference clean-up on delete)
//! run under a single write guard, so they are atomic with respect to any
//! concurrent mutation.

use std::cmp::Ordering;

use libris_db::{icontains, nulls_last, paginate, DbError, Page, PageRequest, Table};
use libris_http::error::AppError;
use thiserror::Error;
use time::Date;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::forms::{AuthorDraft, BookDraft, BookInstanceDraft};
use super::models::{
    Author, AuthorDetail, AuthorId, Book, BookDetail, BookId, BookInstance, Genre, GenreId,
    InstanceId, Language, LanguageId, LoanStatus, LoanView,
};

pub const BOOKS_PER_PAGE: usize = 5;
pub const AUTHORS_PER_PAGE: usize = 5;
pub const LOANS_PER_PAGE: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("{field} '{id}' does not exist")]
    MissingReference { field: &'static str, id: String },

    #[error("This book has instances on loan. Cannot be deleted.")]
    BookOnLoan { book_id: BookId },
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Db(db) => db.into(),
            StoreError::MissingReference { field, ref id } => AppError::validation(
                vec![serde_json::json!({
                    "field": field,
                    "error": format!(
                        "Select a valid choice. {id} is not one of the available choices."
                    ),
                })],
                err.to_string(),
            ),
            StoreError::BookOnLoan { .. } => {
                AppError::forbidden_by_rule("book_on_loan", err.to_string())
            }
        }
    }
}

/// Home page counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogCounts {
    pub books: usize,
    pub instances: usize,
    pub instances_available: usize,
    pub authors: usize,
    pub genres_matching: usize,
    pub books_matching: usize,
}

/// Whose loans a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanScope<'a> {
    Everyone,
    Borrower(&'a str),
}

struct Tables {
    authors: Table<Author>,
    books: Table<Book>,
    genres: Table<Genre>,
    languages: Table<Language>,
    instances: Table<BookInstance>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_book_references(&self, draft: &BookDraft) -> Result<(), StoreError> {
        if let Some(author) = draft.author {
            if !self.authors.contains(&author) {
                return Err(missing("author", author));
            }
        }
        if let Some(genre) = draft.genres.iter().find(|g| !self.genres.contains(g)) {
            return Err(missing("genres", genre));
        }
        if let Some(language) = draft.language {
            if !self.languages.contains(&language) {
                return Err(missing("language", language));
            }
        }
        Ok(())
    }

    fn book_title(&self, id: &BookId) -> String {
        self.books
            .get(id)
            .map(|book| book.title.clone())
            .unwrap_or_default()
    }
}

fn missing(field: &'static str, id: impl ToString) -> StoreError {
    StoreError::MissingReference {
        field,
        id: id.to_string(),
    }
}

fn by_due_back(a: &BookInstance, b: &BookInstance) -> Ordering {
    nulls_last(a.due_back.as_ref(), b.due_back.as_ref()).then_with(|| a.id.cmp(&b.id))
}

/// Shared, lock-guarded catalog.
pub struct CatalogStore {
    tables: RwLock<Tables>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                authors: Table::new("author"),
                books: Table::new("book"),
                genres: Table::new("genre"),
                languages: Table::new("language"),
                instances: Table::new("book instance"),
                next_id: 0,
            }),
        }
    }

    pub async fn counts(&self, genre_contains: &str, title_contains: &str) -> CatalogCounts {
        let tables = self.tables.read().await;
        CatalogCounts {
            books: tables.books.count(),
            instances: tables.instances.count(),
            instances_available: tables
                .instances
                .count_where(|copy| copy.status == LoanStatus::Available),
            authors: tables.authors.count(),
            genres_matching: tables
                .genres
                .count_where(|genre| icontains(&genre.name, genre_contains)),
            books_matching: tables
                .books
                .count_where(|book| icontains(&book.title, title_contains)),
        }
    }

    // Books

    pub async fn list_books(&self, request: PageRequest) -> Result<Page<Book>, StoreError> {
        let tables = self.tables.read().await;
        let mut books: Vec<Book> = tables.books.all().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(books, request, BOOKS_PER_PAGE)?)
    }

    pub async fn get_book(&self, id: BookId) -> Result<Book, StoreError> {
        Ok(self.tables.read().await.books.get(&id)?.clone())
    }

    pub async fn book_detail(&self, id: BookId) -> Result<BookDetail, StoreError> {
        let tables = self.tables.read().await;
        let book = tables.books.get(&id)?.clone();

        let author_name = book
            .author
            .and_then(|author| tables.authors.get(&author).ok())
            .map(Author::display_name);
        let genre_names = book
            .genres
            .iter()
            .filter_map(|genre| tables.genres.get(genre).ok())
            .map(|genre| genre.name.clone())
            .collect();
        let language_name = book
            .language
            .and_then(|language| tables.languages.get(&language).ok())
            .map(|language| language.name.clone());
        let copies = tables
            .instances
            .filter(move |copy| copy.book == id)
            .cloned()
            .collect();

        Ok(BookDetail {
            book,
            author_name,
            genre_names,
            language_name,
            copies,
        })
    }

    pub async fn create_book(&self, draft: BookDraft) -> Result<Book, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_book_references(&draft)?;

        let book = Book {
            id: tables.next_id(),
            title: draft.title,
            author: draft.author,
            summary: draft.summary,
            isbn: draft.isbn,
            genres: draft.genres,
            language: draft.language,
        };
        tables.books.save(book.clone());
        tracing::info!(book_id = book.id, title = %book.title, "book created");
        Ok(book)
    }

    pub async fn update_book(&self, id: BookId, draft: BookDraft) -> Result<Book, StoreError> {
        let mut tables = self.tables.write().await;
        tables.books.get(&id)?;
        tables.check_book_references(&draft)?;

        let book = Book {
            id,
            title: draft.title,
            author: draft.author,
            summary: draft.summary,
            isbn: draft.isbn,
            genres: draft.genres,
            language: draft.language,
        };
        tables.books.save(book.clone());
        tracing::info!(book_id = id, "book updated");
        Ok(book)
    }

    /// Delete a book and its copies unless one of them is on loan.
    ///
    /// The on-loan check and the removal share one write guard. Returns the
    /// number of copies removed with the book.
    pub async fn delete_book(&self, id: BookId) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().await;
        tables.books.get(&id)?;

        if tables
            .instances
            .exists(|copy| copy.book == id && copy.is_on_loan())
        {
            tracing::warn!(book_id = id, "refusing to delete book with copies on loan");
            return Err(StoreError::BookOnLoan { book_id: id });
        }

        tables.books.delete(&id)?;
        let copies = tables.instances.delete_where(|copy| copy.book == id);
        tracing::info!(book_id = id, copies, "book deleted");
        Ok(copies)
    }

    // Authors

    pub async fn list_authors(&self, request: PageRequest) -> Result<Page<Author>, StoreError> {
        let tables = self.tables.read().await;
        let mut authors: Vec<Author> = tables.authors.all().cloned().collect();
        authors.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paginate(authors, request, AUTHORS_PER_PAGE)?)
    }

    pub async fn author_detail(&self, id: AuthorId) -> Result<AuthorDetail, StoreError> {
        let tables = self.tables.read().await;
        let author = tables.authors.get(&id)?.clone();
        let books = tables
            .books
            .filter(move |book| book.author == Some(id))
            .cloned()
            .collect();
        Ok(AuthorDetail { author, books })
    }

    pub async fn create_author(&self, draft: AuthorDraft) -> Result<Author, StoreError> {
        let mut tables = self.tables.write().await;
        let author = Author {
            id: tables.next_id(),
            first_name: draft.first_name,
            last_name: draft.last_name,
            date_of_birth: draft.date_of_birth,
            date_of_death: draft.date_of_death,
        };
        tables.authors.save(author.clone());
        tracing::info!(author_id = author.id, "author created");
        Ok(author)
    }

    pub async fn update_author(
        &self,
        id: AuthorId,
        draft: AuthorDraft,
    ) -> Result<Author, StoreError> {
        let mut tables = self.tables.write().await;
        let author = tables.authors.get_mut(&id)?;
        author.first_name = draft.first_name;
        author.last_name = draft.last_name;
        author.date_of_birth = draft.date_of_birth;
        author.date_of_death = draft.date_of_death;
        let updated = author.clone();
        tracing::info!(author_id = id, "author updated");
        Ok(updated)
    }

    /// Delete an author; their books stay, without an author.
    pub async fn delete_author(&self, id: AuthorId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.authors.delete(&id)?;
        let mut orphaned = 0;
        for book in tables.books.iter_mut().filter(|book| book.author == Some(id)) {
            book.author = None;
            orphaned += 1;
        }
        tracing::info!(author_id = id, orphaned, "author deleted");
        Ok(())
    }

    // Genres and languages

    pub async fn list_genres(&self) -> Vec<Genre> {
        let tables = self.tables.read().await;
        let mut genres: Vec<Genre> = tables.genres.all().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        genres
    }

    pub async fn create_genre(&self, name: String) -> Genre {
        let mut tables = self.tables.write().await;
        let genre = Genre {
            id: tables.next_id(),
            name,
        };
        tables.genres.save(genre.clone());
        tracing::info!(genre_id = genre.id, name = %genre.name, "genre created");
        genre
    }

    pub async fn delete_genre(&self, id: GenreId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.genres.delete(&id)?;
        for book in tables.books.iter_mut() {
            book.genres.remove(&id);
        }
        tracing::info!(genre_id = id, "genre deleted");
        Ok(())
    }

    pub async fn list_languages(&self) -> Vec<Language> {
        let tables = self.tables.read().await;
        let mut languages: Vec<Language> = tables.languages.all().cloned().collect();
        languages.sort_by(|a, b| a.name.cmp(&b.name));
        languages
    }

    pub async fn create_language(&self, name: String) -> Language {
        let mut tables = self.tables.write().await;
        let language = Language {
            id: tables.next_id(),
            name,
        };
        tables.languages.save(language.clone());
        tracing::info!(language_id = language.id, name = %language.name, "language created");
        language
    }

    pub async fn delete_language(&self, id: LanguageId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.languages.delete(&id)?;
        for book in tables.books.iter_mut().filter(|book| book.language == Some(id)) {
            book.language = None;
        }
        tracing::info!(language_id = id, "language deleted");
        Ok(())
    }

    // Copies and loans

    pub async fn get_instance(&self, id: InstanceId) -> Result<BookInstance, StoreError> {
        Ok(self.tables.read().await.instances.get(&id)?.clone())
    }

    pub async fn loan_view(&self, id: InstanceId, today: Date) -> Result<LoanView, StoreError> {
        let tables = self.tables.read().await;
        let instance = tables.instances.get(&id)?;
        Ok(LoanView::new(instance, tables.book_title(&instance.book), today))
    }

    pub async fn create_instance(
        &self,
        draft: BookInstanceDraft,
    ) -> Result<BookInstance, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.books.contains(&draft.book) {
            return Err(missing("book", draft.book));
        }

        let instance = BookInstance {
            id: Uuid::new_v4(),
            book: draft.book,
            imprint: draft.imprint,
            status: draft.status,
            due_back: draft.due_back,
            borrower: draft.borrower,
        };
        tables.instances.save(instance.clone());
        tracing::info!(
            instance_id = %instance.id,
            book_id = instance.book,
            "book instance created"
        );
        Ok(instance)
    }

    pub async fn update_instance(
        &self,
        id: InstanceId,
        draft: BookInstanceDraft,
    ) -> Result<BookInstance, StoreError> {
        let mut tables = self.tables.write().await;
        tables.instances.get(&id)?;
        if !tables.books.contains(&draft.book) {
            return Err(missing("book", draft.book));
        }

        let instance = BookInstance {
            id,
            book: draft.book,
            imprint: draft.imprint,
            status: draft.status,
            due_back: draft.due_back,
            borrower: draft.borrower,
        };
        tables.instances.save(instance.clone());
        tracing::info!(
            instance_id = %id,
            status = instance.status.as_str(),
            "book instance updated"
        );
        Ok(instance)
    }

    pub async fn delete_instance(&self, id: InstanceId) -> Result<(), StoreError> {
        self.tables.write().await.instances.delete(&id)?;
        tracing::info!(instance_id = %id, "book instance deleted");
        Ok(())
    }

    /// Assign a new due date; status and borrower are left alone.
    pub async fn set_due_back(
        &self,
        id: InstanceId,
        due_back: Date,
    ) -> Result<BookInstance, StoreError> {
        let mut tables = self.tables.write().await;
        let instance = tables.instances.get_mut(&id)?;
        instance.due_back = Some(due_back);
        Ok(instance.clone())
    }

    /// Copies on loan, soonest due first, undated ones last.
    pub async fn loans(
        &self,
        scope: LoanScope<'_>,
        request: PageRequest,
        today: Date,
    ) -> Result<Page<LoanView>, StoreError> {
        let tables = self.tables.read().await;
        let mut loans: Vec<&BookInstance> = tables
            .instances
            .filter(move |copy| {
                copy.is_on_loan()
                    && match scope {
                        LoanScope::Everyone => true,
                        LoanScope::Borrower(username) => copy.borrower.as_deref() == Some(username),
                    }
            })
            .collect();
        loans.sort_by(|a, b| by_due_back(a, b));

        let views = loans
            .into_iter()
            .map(|copy| LoanView::new(copy, tables.book_title(&copy.book), today))
            .collect();
        Ok(paginate(views, request, LOANS_PER_PAGE)?)
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use time::macros::date;

    const TODAY: Date = date!(2024 - 03 - 10);

    fn book_draft(title: &str) -> BookDraft {
        BookDraft {
            title: title.to_string(),
            author: None,
            summary: String::new(),
            isbn: "9780000000000".to_string(),
            genres: BTreeSet::new(),
            language: None,
        }
    }

    fn copy_draft(
        book: BookId,
        status: LoanStatus,
        due_back: Option<Date>,
        borrower: Option<&str>,
    ) -> BookInstanceDraft {
        BookInstanceDraft {
            book,
            imprint: "First edition".to_string(),
            status,
            due_back,
            borrower: borrower.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn counts_match_case_insensitive_substrings() {
        let store = CatalogStore::new();
        store.create_genre("Poetry".to_string()).await;
        store.create_genre("Science Fiction".to_string()).await;
        store.create_genre("Epic".to_string()).await;
        let book = store.create_book(book_draft("The Left Hand of Darkness")).await.unwrap();
        store.create_book(book_draft("Kindred")).await.unwrap();
        store
            .create_instance(copy_draft(book.id, LoanStatus::Available, None, None))
            .await
            .unwrap();
        store
            .create_instance(copy_draft(book.id, LoanStatus::Maintenance, None, None))
            .await
            .unwrap();

        let counts = store.counts("p", "O").await;
        assert_eq!(
            counts,
            CatalogCounts {
                books: 2,
                instances: 2,
                instances_available: 1,
                authors: 0,
                genres_matching: 2,
                books_matching: 1,
            }
        );
        assert_eq!(store.counts("qqq", "qqq").await.genres_matching, 0);
        assert_eq!(store.counts("qqq", "qqq").await.books_matching, 0);
    }

    #[tokio::test]
    async fn deletion_guard_blocks_books_with_copies_on_loan() {
        let store = CatalogStore::new();
        let book = store.create_book(book_draft("Dune")).await.unwrap();
        store
            .create_instance(copy_draft(book.id, LoanStatus::Available, None, None))
            .await
            .unwrap();
        let loaned = store
            .create_instance(copy_draft(book.id, LoanStatus::OnLoan, Some(TODAY), Some("borrower")))
            .await
            .unwrap();

        assert_eq!(
            store.delete_book(book.id).await,
            Err(StoreError::BookOnLoan { book_id: book.id })
        );
        assert_eq!(store.book_detail(book.id).await.unwrap().copies.len(), 2);
        assert_eq!(store.get_instance(loaned.id).await.unwrap(), loaned);

        store
            .update_instance(loaned.id, copy_draft(book.id, LoanStatus::Available, None, None))
            .await
            .unwrap();
        assert_eq!(store.delete_book(book.id).await, Ok(2));
        assert!(matches!(
            store.get_book(book.id).await,
            Err(StoreError::Db(DbError::NotFound { .. }))
        ));
        assert!(store.get_instance(loaned.id).await.is_err());
    }

    #[tokio::test]
    async fn deleting_a_missing_book_is_not_found() {
        let store = CatalogStore::new();
        assert!(matches!(
            store.delete_book(42).await,
            Err(StoreError::Db(DbError::NotFound { table: "book", .. }))
        ));
    }

    #[tokio::test]
    async fn loans_are_filtered_and_ordered_with_undated_last() {
        let store = CatalogStore::new();
        let book = store.create_book(book_draft("Beloved")).await.unwrap();
        let late = store
            .create_instance(copy_draft(
                book.id,
                LoanStatus::OnLoan,
                Some(date!(2024 - 04 - 01)),
                Some("ann"),
            ))
            .await
            .unwrap();
        let undated = store
            .create_instance(copy_draft(book.id, LoanStatus::OnLoan, None, Some("bob")))
            .await
            .unwrap();
        let soon = store
            .create_instance(copy_draft(
                book.id,
                LoanStatus::OnLoan,
                Some(date!(2024 - 03 - 01)),
                Some("bob"),
            ))
            .await
            .unwrap();
        store
            .create_instance(copy_draft(
                book.id,
                LoanStatus::Reserved,
                Some(date!(2024 - 02 - 01)),
                Some("bob"),
            ))
            .await
            .unwrap();

        let everyone = store
            .loans(LoanScope::Everyone, PageRequest::default(), TODAY)
            .await
            .unwrap();
        let ids: Vec<_> = everyone.items.iter().map(|loan| loan.id).collect();
        assert_eq!(ids, vec![soon.id, late.id, undated.id]);
        assert!(everyone.items[0].is_overdue);
        assert_eq!(everyone.items[0].book_title, "Beloved");

        let bob = store
            .loans(LoanScope::Borrower("bob"), PageRequest::default(), TODAY)
            .await
            .unwrap();
        let ids: Vec<_> = bob.items.iter().map(|loan| loan.id).collect();
        assert_eq!(ids, vec![soon.id, undated.id]);
    }

    #[tokio::test]
    async fn book_listing_pages_by_five() {
        let store = CatalogStore::new();
        for title in ["G", "F", "E", "D", "C", "B", "A"] {
            store.create_book(book_draft(title)).await.unwrap();
        }

        let first = store.list_books(PageRequest::new(1)).await.unwrap();
        let titles: Vec<_> = first.items.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(store.list_books(PageRequest::new(2)).await.unwrap().items.len(), 2);
        assert!(matches!(
            store.list_books(PageRequest::new(3)).await,
            Err(StoreError::Db(DbError::InvalidPage { .. }))
        ));
    }

    #[tokio::test]
    async fn set_due_back_only_touches_the_date() {
        let store = CatalogStore::new();
        let book = store.create_book(book_draft("Parable of the Sower")).await.unwrap();
        let copy = store
            .create_instance(copy_draft(book.id, LoanStatus::OnLoan, Some(TODAY), Some("ann")))
            .await
            .unwrap();

        let renewed = store.set_due_back(copy.id, date!(2024 - 03 - 31)).await.unwrap();
        assert_eq!(renewed.due_back, Some(date!(2024 - 03 - 31)));
        assert_eq!(renewed.status, copy.status);
        assert_eq!(renewed.borrower, copy.borrower);

        let again = store.set_due_back(copy.id, date!(2024 - 03 - 31)).await.unwrap();
        assert_eq!(again, renewed);
    }

    #[tokio::test]
    async fn book_references_must_exist() {
        let store = CatalogStore::new();
        let mut draft = book_draft("Lilith's Brood");
        draft.author = Some(99);
        assert_eq!(
            store.create_book(draft).await,
            Err(StoreError::MissingReference {
                field: "author",
                id: "99".to_string()
            })
        );

        let mut draft = book_draft("Lilith's Brood");
        draft.genres.insert(7);
        assert!(matches!(
            store.create_book(draft).await,
            Err(StoreError::MissingReference { field: "genres", .. })
        ));

        assert!(matches!(
            store
                .create_instance(copy_draft(5, LoanStatus::Available, None, None))
                .await,
            Err(StoreError::MissingReference { field: "book", .. })
        ));
    }

    #[tokio::test]
    async fn deleting_references_clears_them_on_books() {
        let store = CatalogStore::new();
        let author = store
            .create_author(AuthorDraft {
                first_name: "Toni".to_string(),
                last_name: "Morrison".to_string(),
                date_of_birth: None,
                date_of_death: None,
            })
            .await
            .unwrap();
        let genre = store.create_genre("Literary".to_string()).await;
        let language = store.create_language("English".to_string()).await;

        let mut draft = book_draft("Sula");
        draft.author = Some(author.id);
        draft.genres.insert(genre.id);
        draft.language = Some(language.id);
        let book = store.create_book(draft).await.unwrap();

        store.delete_author(author.id).await.unwrap();
        store.delete_genre(genre.id).await.unwrap();
        store.delete_language(language.id).await.unwrap();

        let book = store.get_book(book.id).await.unwrap();
        assert_eq!(book.author, None);
        assert!(book.genres.is_empty());
        assert_eq!(book.language, None);
    }
}
