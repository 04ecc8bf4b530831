//! In-memory persistence for Libris: typed record tables, ordering helpers and pagination.
//!
//! Tables are plain data; callers own the locking so that multi-table
//! operations (check-then-delete, cascades) happen under one guard.

pub mod page;
pub mod table;

pub use page::{paginate, Page, PageRequest};
pub use table::{icontains, nulls_last, Record, Table};

use thiserror::Error;

/// Errors raised by the persistence layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("{table} '{id}' does not exist")]
    NotFound { table: &'static str, id: String },

    #[error("page {page} is out of range (1..={last_page})")]
    InvalidPage { page: usize, last_page: usize },
}
