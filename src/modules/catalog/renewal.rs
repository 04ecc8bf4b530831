//! Loan renewal: show a copy with a proposed due date, then apply the
//! librarian's chosen date.

use serde::Serialize;
use time::Date;

use super::forms::{FieldErrors, RenewalForm};
use super::models::{BookInstance, InstanceId, LoanView};
use super::store::{CatalogStore, StoreError};

/// What the librarian sees: the copy and the form, with errors after a bad submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalPage {
    pub book_instance: LoanView,
    pub form: RenewalForm,
    pub errors: FieldErrors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    Renewed(BookInstance),
    /// Nothing was written; re-display the submitted form.
    Invalid(RenewalPage),
}

pub async fn display(
    store: &CatalogStore,
    id: InstanceId,
    today: Date,
) -> Result<RenewalPage, StoreError> {
    let book_instance = store.loan_view(id, today).await?;
    Ok(RenewalPage {
        book_instance,
        form: RenewalForm::proposed(today),
        errors: FieldErrors::new(),
    })
}

/// Validate the submitted form and, if it holds, set the copy's due date.
pub async fn apply(
    store: &CatalogStore,
    id: InstanceId,
    form: RenewalForm,
    today: Date,
) -> Result<RenewalOutcome, StoreError> {
    let book_instance = store.loan_view(id, today).await?;

    match form.validate(today) {
        Ok(due_back) => {
            let renewed = store.set_due_back(id, due_back).await?;
            tracing::info!(instance_id = %id, due_back = %due_back, "loan renewed");
            Ok(RenewalOutcome::Renewed(renewed))
        }
        Err(errors) => {
            tracing::debug!(instance_id = %id, "renewal form rejected");
            Ok(RenewalOutcome::Invalid(RenewalPage {
                book_instance,
                form,
                errors,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::forms::{BookDraft, BookInstanceDraft};
    use crate::modules::catalog::models::LoanStatus;
    use libris_db::DbError;
    use time::macros::date;
    use uuid::Uuid;

    const TODAY: Date = date!(2024 - 03 - 10);

    async fn store_with_loan() -> (CatalogStore, BookInstance) {
        let store = CatalogStore::new();
        let book = store
            .create_book(BookDraft {
                title: "Kindred".to_string(),
                author: None,
                summary: String::new(),
                isbn: "9780807083697".to_string(),
                genres: Default::default(),
                language: None,
            })
            .await
            .unwrap();
        let copy = store
            .create_instance(BookInstanceDraft {
                book: book.id,
                imprint: "Beacon, 2003".to_string(),
                status: LoanStatus::OnLoan,
                due_back: Some(date!(2024 - 03 - 12)),
                borrower: Some("borrower".to_string()),
            })
            .await
            .unwrap();
        (store, copy)
    }

    fn form(raw: &str) -> RenewalForm {
        RenewalForm {
            due_back: Some(raw.to_string()),
        }
    }

    #[tokio::test]
    async fn display_proposes_three_weeks() {
        let (store, copy) = store_with_loan().await;
        let page = display(&store, copy.id, TODAY).await.unwrap();
        assert_eq!(page.form.due_back.as_deref(), Some("2024-03-31"));
        assert_eq!(page.book_instance.book_title, "Kindred");
        assert!(page.errors.is_empty());
    }

    #[tokio::test]
    async fn apply_sets_only_the_due_date() {
        let (store, copy) = store_with_loan().await;
        let outcome = apply(&store, copy.id, form("2024-03-30"), TODAY).await.unwrap();

        let RenewalOutcome::Renewed(renewed) = outcome else {
            panic!("expected renewal, got {outcome:?}");
        };
        assert_eq!(renewed.due_back, Some(date!(2024 - 03 - 30)));
        assert_eq!(renewed.status, copy.status);
        assert_eq!(renewed.borrower, copy.borrower);
        assert_eq!(store.get_instance(copy.id).await.unwrap(), renewed);
    }

    #[tokio::test]
    async fn invalid_form_leaves_the_copy_alone() {
        let (store, copy) = store_with_loan().await;
        for bad in [RenewalForm::default(), form("2024-99-01"), form("2024-03-01")] {
            let outcome = apply(&store, copy.id, bad.clone(), TODAY).await.unwrap();
            let RenewalOutcome::Invalid(page) = outcome else {
                panic!("expected the form back, got {outcome:?}");
            };
            assert_eq!(page.form, bad);
            assert!(page.errors.get("due_back").is_some());
        }
        assert_eq!(store.get_instance(copy.id).await.unwrap(), copy);
    }

    #[tokio::test]
    async fn unknown_copy_is_not_found() {
        let (store, _) = store_with_loan().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            display(&store, missing, TODAY).await,
            Err(StoreError::Db(DbError::NotFound { .. }))
        ));
        assert!(matches!(
            apply(&store, missing, form("2024-03-20"), TODAY).await,
            Err(StoreError::Db(DbError::NotFound { .. }))
        ));
    }
}
