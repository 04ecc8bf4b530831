use std::collections::BTreeSet;

use libris_db::Record;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

pub type AuthorId = u64;
pub type BookId = u64;
pub type GenreId = u64;
pub type LanguageId = u64;
pub type InstanceId = Uuid;

/// Loan state of one physical copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Available,
    OnLoan,
    #[default]
    Maintenance,
    Reserved,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        LoanStatus::Available,
        LoanStatus::OnLoan,
        LoanStatus::Maintenance,
        LoanStatus::Reserved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Available => "available",
            LoanStatus::OnLoan => "on_loan",
            LoanStatus::Maintenance => "maintenance",
            LoanStatus::Reserved => "reserved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<Date>,
    pub date_of_death: Option<Date>,
}

impl Author {
    /// "Last, First", as shown in listings.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,
    pub name: String,
}

/// A catalog title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: Option<AuthorId>,
    pub summary: String,
    pub isbn: String,
    pub genres: BTreeSet<GenreId>,
    pub language: Option<LanguageId>,
}

/// One loanable copy of a [`Book`].
///
/// `due_back` only means something while `status` is on loan, and an on-loan
/// copy carries its borrower's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInstance {
    pub id: InstanceId,
    pub book: BookId,
    pub imprint: String,
    pub status: LoanStatus,
    pub due_back: Option<Date>,
    pub borrower: Option<String>,
}

impl BookInstance {
    pub fn is_on_loan(&self) -> bool {
        self.status == LoanStatus::OnLoan
    }

    pub fn is_overdue(&self, today: Date) -> bool {
        self.is_on_loan() && self.due_back.is_some_and(|due| due < today)
    }
}

impl Record for Author {
    type Id = AuthorId;

    fn id(&self) -> &AuthorId {
        &self.id
    }
}

impl Record for Genre {
    type Id = GenreId;

    fn id(&self) -> &GenreId {
        &self.id
    }
}

impl Record for Language {
    type Id = LanguageId;

    fn id(&self) -> &LanguageId {
        &self.id
    }
}

impl Record for Book {
    type Id = BookId;

    fn id(&self) -> &BookId {
        &self.id
    }
}

impl Record for BookInstance {
    type Id = InstanceId;

    fn id(&self) -> &InstanceId {
        &self.id
    }
}

/// Book with its references resolved and its copies attached.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub author_name: Option<String>,
    pub genre_names: Vec<String>,
    pub language_name: Option<String>,
    pub copies: Vec<BookInstance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorDetail {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<Book>,
}

/// A copy as shown in the loan listings and the renewal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanView {
    pub id: InstanceId,
    pub book_id: BookId,
    pub book_title: String,
    pub imprint: String,
    pub status: LoanStatus,
    pub due_back: Option<Date>,
    pub borrower: Option<String>,
    pub is_overdue: bool,
}

impl LoanView {
    pub fn new(instance: &BookInstance, book_title: impl Into<String>, today: Date) -> Self {
        Self {
            id: instance.id,
            book_id: instance.book,
            book_title: book_title.into(),
            imprint: instance.imprint.clone(),
            status: instance.status,
            due_back: instance.due_back,
            borrower: instance.borrower.clone(),
            is_overdue: instance.is_overdue(today),
        }
    }
}
