use serde::{Deserialize, Serialize};

use crate::DbError;

/// 1-indexed page selection, as received from `?page=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "PageRequest::first")]
    pub page: usize,
}

impl PageRequest {
    fn first() -> usize {
        1
    }

    pub fn new(page: usize) -> Self {
        Self { page }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::first())
    }
}

/// One page of an ordered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Slice an already ordered listing into pages of `per_page`.
///
/// Page 1 of an empty listing is an empty page; any page past the last one
/// (or page 0) is [`DbError::InvalidPage`].
pub fn paginate<T>(
    items: Vec<T>,
    request: PageRequest,
    per_page: usize,
) -> Result<Page<T>, DbError> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);

    if request.page == 0 || request.page > total_pages {
        return Err(DbError::InvalidPage {
            page: request.page,
            last_page: total_pages,
        });
    }

    let start = (request.page - 1) * per_page;
    let items: Vec<T> = items.into_iter().skip(start).take(per_page).collect();

    Ok(Page {
        items,
        page: request.page,
        per_page,
        total_items,
        total_pages,
        has_next: request.page < total_pages,
        has_previous: request.page > 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_seven_items_into_pages_of_five() {
        let items: Vec<u32> = (1..=7).collect();

        let first = paginate(items.clone(), PageRequest::new(1), 5).unwrap();
        assert_eq!(first.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next);
        assert!(!first.has_previous);

        let second = paginate(items.clone(), PageRequest::new(2), 5).unwrap();
        assert_eq!(second.items, vec![6, 7]);
        assert!(!second.has_next);
        assert!(second.has_previous);

        assert_eq!(
            paginate(items, PageRequest::new(3), 5).unwrap_err(),
            DbError::InvalidPage {
                page: 3,
                last_page: 2
            }
        );
    }

    #[test]
    fn empty_listing_has_one_empty_page() {
        let page = paginate(Vec::<u32>::new(), PageRequest::default(), 10).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 0);
    }

    #[test]
    fn page_zero_is_rejected() {
        assert!(paginate(vec![1], PageRequest::new(0), 10).is_err());
    }
}
