//! Demo catalog loaded at start-up when `catalog.seed_demo_data` is set.

use std::collections::BTreeSet;

use time::{Date, Duration};

use super::forms::{AuthorDraft, BookDraft, BookInstanceDraft};
use super::models::LoanStatus;
use super::store::{CatalogStore, StoreError};

struct SeedBook {
    title: &'static str,
    author: usize,
    summary: &'static str,
    isbn: &'static str,
    genres: &'static [usize],
    /// (imprint, status, days until due, borrower)
    copies: &'static [(&'static str, LoanStatus, Option<i64>, Option<&'static str>)],
}

const AUTHORS: &[(&str, &str, Option<(i32, u8, u8)>)] = &[
    ("Patrick", "Rothfuss", Some((1973, 6, 6))),
    ("Ben", "Bova", Some((1932, 11, 8))),
    ("Isaac", "Asimov", Some((1920, 1, 2))),
    ("Bob", "Billings", None),
];

const GENRES: &[&str] = &["Fantasy", "Science Fiction", "Poetry"];

const LANGUAGES: &[&str] = &["English", "French"];

const BOOKS: &[SeedBook] = &[
    SeedBook {
        title: "The Name of the Wind",
        author: 0,
        summary: "The tale of Kvothe, from his childhood in a troupe of traveling players \
                  to his years as a near-feral orphan.",
        isbn: "9780756404741",
        genres: &[0],
        copies: &[
            ("DAW, 2007", LoanStatus::OnLoan, Some(-2), Some("borrower")),
            ("DAW, 2007", LoanStatus::Available, None, None),
        ],
    },
    SeedBook {
        title: "The Wise Man's Fear",
        author: 0,
        summary: "Picking up the tale of Kvothe Kingkiller once again.",
        isbn: "9780756407919",
        genres: &[0],
        copies: &[("DAW, 2011", LoanStatus::OnLoan, Some(10), Some("borrower"))],
    },
    SeedBook {
        title: "Apes and Angels",
        author: 1,
        summary: "Humankind's first wave of interstellar exploration.",
        isbn: "9780765379528",
        genres: &[1],
        copies: &[
            ("Tor, 2015", LoanStatus::Maintenance, None, None),
            ("Tor, 2015", LoanStatus::Reserved, None, None),
        ],
    },
    SeedBook {
        title: "Foundation",
        author: 2,
        summary: "The first novel of the Foundation series.",
        isbn: "9780553293357",
        genres: &[1],
        copies: &[("Bantam, 1991", LoanStatus::OnLoan, Some(5), Some("librarian"))],
    },
    SeedBook {
        title: "Verses of a Quiet Shelf",
        author: 3,
        summary: "Short poems about reading rooms.",
        isbn: "9781234567897",
        genres: &[2],
        copies: &[],
    },
];

/// Insert the demo authors, genres, languages, books and copies.
///
/// Loan due dates are relative to `today` so a fresh start always has one
/// overdue loan.
pub async fn seed_demo_data(store: &CatalogStore, today: Date) -> Result<(), StoreError> {
    let mut author_ids = Vec::with_capacity(AUTHORS.len());
    for (first_name, last_name, born) in AUTHORS {
        let date_of_birth = born.and_then(|(year, month, day)| {
            let month = time::Month::try_from(month).ok()?;
            Date::from_calendar_date(year, month, day).ok()
        });
        let author = store
            .create_author(AuthorDraft {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                date_of_birth,
                date_of_death: None,
            })
            .await?;
        author_ids.push(author.id);
    }

    let mut genre_ids = Vec::with_capacity(GENRES.len());
    for name in GENRES {
        genre_ids.push(store.create_genre(name.to_string()).await.id);
    }

    let mut language_ids = Vec::with_capacity(LANGUAGES.len());
    for name in LANGUAGES {
        language_ids.push(store.create_language(name.to_string()).await.id);
    }

    let mut copies = 0;
    for seed in BOOKS {
        let book = store
            .create_book(BookDraft {
                title: seed.title.to_string(),
                author: author_ids.get(seed.author).copied(),
                summary: seed.summary.to_string(),
                isbn: seed.isbn.to_string(),
                genres: seed
                    .genres
                    .iter()
                    .filter_map(|index| genre_ids.get(*index).copied())
                    .collect::<BTreeSet<_>>(),
                language: language_ids.first().copied(),
            })
            .await?;

        for (imprint, status, due_in, borrower) in seed.copies {
            store
                .create_instance(BookInstanceDraft {
                    book: book.id,
                    imprint: imprint.to_string(),
                    status: *status,
                    due_back: due_in.map(|days| today + Duration::days(days)),
                    borrower: borrower.map(str::to_string),
                })
                .await?;
            copies += 1;
        }
    }

    tracing::info!(
        authors = author_ids.len(),
        books = BOOKS.len(),
        copies,
        "demo catalog seeded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_db::PageRequest;
    use time::macros::date;

    use crate::modules::catalog::store::LoanScope;

    #[tokio::test]
    async fn seeds_a_browsable_catalog() {
        let store = CatalogStore::new();
        let today = date!(2024 - 03 - 01);
        seed_demo_data(&store, today).await.unwrap();

        let counts = store.counts("p", "o").await;
        assert_eq!(counts.books, 5);
        assert_eq!(counts.authors, 4);
        assert_eq!(counts.instances, 6);
        assert_eq!(counts.instances_available, 1);

        let loans = store
            .loans(LoanScope::Borrower("borrower"), PageRequest::default(), today)
            .await
            .unwrap();
        assert_eq!(loans.total_items, 2);
        assert!(loans.items[0].is_overdue);
        assert!(!loans.items[1].is_overdue);
    }
}
