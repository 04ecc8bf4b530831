use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::DbError;

/// A row stored in a [`Table`].
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Ord + Clone + Display + Send + Sync;

    fn id(&self) -> &Self::Id;
}

/// Ordered in-memory table keyed by record id.
#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    name: &'static str,
    rows: BTreeMap<R::Id, R>,
}

impl<R: Record> Table<R> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: BTreeMap::new(),
        }
    }

    /// Fetch a row or fail with [`DbError::NotFound`].
    pub fn get(&self, id: &R::Id) -> Result<&R, DbError> {
        self.rows.get(id).ok_or_else(|| self.not_found(id))
    }

    pub fn get_mut(&mut self, id: &R::Id) -> Result<&mut R, DbError> {
        let name = self.name;
        self.rows.get_mut(id).ok_or_else(|| DbError::NotFound {
            table: name,
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &R::Id) -> bool {
        self.rows.contains_key(id)
    }

    /// Insert or replace a row, returning the previous version.
    pub fn save(&mut self, record: R) -> Option<R> {
        tracing::trace!(table = self.name, id = %record.id(), "saving row");
        self.rows.insert(record.id().clone(), record)
    }

    pub fn delete(&mut self, id: &R::Id) -> Result<R, DbError> {
        let removed = self.rows.remove(id).ok_or_else(|| self.not_found(id))?;
        tracing::trace!(table = self.name, id = %id, "deleted row");
        Ok(removed)
    }

    /// Remove every row matching `predicate`, returning how many went.
    pub fn delete_where(&mut self, mut predicate: impl FnMut(&R) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| !predicate(&*row));
        before - self.rows.len()
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn count_where(&self, mut predicate: impl FnMut(&R) -> bool) -> usize {
        self.rows.values().filter(|&row| predicate(row)).count()
    }

    pub fn exists(&self, mut predicate: impl FnMut(&R) -> bool) -> bool {
        self.rows.values().any(|row| predicate(row))
    }

    /// Rows in id order.
    pub fn all(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn filter<'a>(
        &'a self,
        mut predicate: impl FnMut(&R) -> bool + 'a,
    ) -> impl Iterator<Item = &'a R> + 'a {
        self.rows.values().filter(move |&row| predicate(row))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut R> {
        self.rows.values_mut()
    }

    fn not_found(&self, id: &R::Id) -> DbError {
        DbError::NotFound {
            table: self.name,
            id: id.to_string(),
        }
    }
}

/// Case-insensitive substring match. An empty needle matches everything.
pub fn icontains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Ascending order with absent values after every present one.
pub fn nulls_last<T: Ord>(a: Option<&T>, b: Option<&T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
