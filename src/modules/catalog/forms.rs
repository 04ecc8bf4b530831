//! Field-level validation of catalog payloads.
//!
//! Forms arrive with every field optional so that a missing value becomes a
//! field error rather than a decoding failure.

use std::collections::{BTreeMap, BTreeSet};

use libris_http::error::AppError;
use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, Duration};

use super::models::{AuthorId, BookId, GenreId, LanguageId, LoanStatus};

const REQUIRED: &str = "This field is required.";
const INVALID_DATE: &str = "Enter a valid date.";

/// How far ahead the renewal form proposes by default.
pub const RENEWAL_PERIOD: Duration = Duration::weeks(3);
/// Latest due date a renewal may set, counted from today.
pub const MAX_RENEWAL_AHEAD: Duration = Duration::weeks(4);

/// Errors keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        let details = errors
            .0
            .into_iter()
            .flat_map(|(field, messages)| {
                messages
                    .into_iter()
                    .map(move |error| serde_json::json!({ "field": field, "error": error }))
            })
            .collect();
        AppError::validation(details, "submitted form is invalid")
    }
}

/// Trimmed, required text no longer than `max` characters.
fn required_text(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else {
        check_length(errors, field, &value, max);
    }
    value
}

fn check_length(errors: &mut FieldErrors, field: &'static str, value: &str, max: usize) {
    let length = value.chars().count();
    if length > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters (it has {length})."),
        );
    }
}

/// `YYYY-MM-DD`, or `None` when absent or blank.
fn optional_date(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&str>,
) -> Option<Date> {
    let raw = value.map(str::trim).filter(|raw| !raw.is_empty())?;
    match parse_date(raw) {
        Some(date) => Some(date),
        None => {
            errors.add(field, INVALID_DATE);
            None
        }
    }
}

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthorForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub date_of_death: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDraft {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<Date>,
    pub date_of_death: Option<Date>,
}

impl AuthorForm {
    pub fn validate(self) -> Result<AuthorDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let first_name = required_text(&mut errors, "first_name", self.first_name, 100);
        let last_name = required_text(&mut errors, "last_name", self.last_name, 100);
        let date_of_birth =
            optional_date(&mut errors, "date_of_birth", self.date_of_birth.as_deref());
        let date_of_death =
            optional_date(&mut errors, "date_of_death", self.date_of_death.as_deref());

        if let (Some(born), Some(died)) = (date_of_birth, date_of_death) {
            if died < born {
                errors.add("date_of_death", "Date of death precedes date of birth.");
            }
        }

        errors.into_result(|| AuthorDraft {
            first_name,
            last_name,
            date_of_birth,
            date_of_death,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookForm {
    pub title: Option<String>,
    pub author: Option<AuthorId>,
    pub summary: Option<String>,
    pub isbn: Option<String>,
    pub genres: Vec<GenreId>,
    pub language: Option<LanguageId>,
}

/// Field-valid book; references are checked by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author: Option<AuthorId>,
    pub summary: String,
    pub isbn: String,
    pub genres: BTreeSet<GenreId>,
    pub language: Option<LanguageId>,
}

impl BookForm {
    pub fn validate(self) -> Result<BookDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = required_text(&mut errors, "title", self.title, 200);

        let summary = self.summary.map(|s| s.trim().to_string()).unwrap_or_default();
        check_length(&mut errors, "summary", &summary, 1000);

        let isbn = required_text(&mut errors, "isbn", self.isbn, 13);
        if !isbn.is_empty() && (isbn.len() != 13 || !isbn.bytes().all(|b| b.is_ascii_digit())) {
            errors.add("isbn", "Enter a 13 digit ISBN.");
        }

        errors.into_result(|| BookDraft {
            title,
            author: self.author,
            summary,
            isbn,
            genres: self.genres.into_iter().collect(),
            language: self.language,
        })
    }
}

/// Payload for genres and languages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NameForm {
    pub name: Option<String>,
}

impl NameForm {
    pub fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "name", self.name, 200);
        errors.into_result(|| name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookInstanceForm {
    pub book: Option<BookId>,
    pub imprint: Option<String>,
    pub status: Option<String>,
    pub due_back: Option<String>,
    pub borrower: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInstanceDraft {
    pub book: BookId,
    pub imprint: String,
    pub status: LoanStatus,
    pub due_back: Option<Date>,
    pub borrower: Option<String>,
}

impl BookInstanceForm {
    pub fn validate(self) -> Result<BookInstanceDraft, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.book.is_none() {
            errors.add("book", REQUIRED);
        }
        let imprint = required_text(&mut errors, "imprint", self.imprint, 200);

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => LoanStatus::default(),
            Some(raw) => LoanStatus::parse(raw).unwrap_or_else(|| {
                errors.add(
                    "status",
                    format!("Select a valid choice. {raw} is not one of the available choices."),
                );
                LoanStatus::default()
            }),
        };

        let due_back = optional_date(&mut errors, "due_back", self.due_back.as_deref());
        let borrower = self
            .borrower
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());

        if status == LoanStatus::OnLoan {
            if borrower.is_none() {
                errors.add("borrower", "A copy on loan needs a borrower.");
            }
            if due_back.is_none() && errors.get("due_back").is_none() {
                errors.add("due_back", "A copy on loan needs a due date.");
            }
        }

        errors.into_result(|| BookInstanceDraft {
            book: self.book.unwrap_or_default(),
            imprint,
            status,
            due_back,
            borrower,
        })
    }
}

/// The renewal form: one required date, between today and four weeks out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewalForm {
    /// The value as submitted (or proposed), echoed back when re-displayed.
    pub due_back: Option<String>,
}

impl RenewalForm {
    /// Pre-filled with today plus three weeks.
    pub fn proposed(today: Date) -> Self {
        Self {
            due_back: Some((today + RENEWAL_PERIOD).to_string()),
        }
    }

    /// Read `due_back` out of an arbitrary JSON payload. Non-string values are
    /// kept as their JSON text so they fail date validation.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let due_back = match payload.get("due_back") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(raw)) => Some(raw.clone()),
            Some(other) => Some(other.to_string()),
        };
        Self { due_back }
    }

    pub fn validate(&self, today: Date) -> Result<Date, FieldErrors> {
        let mut errors = FieldErrors::new();

        let raw = self.due_back.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            errors.add("due_back", REQUIRED);
            return Err(errors);
        }

        let Some(due_back) = parse_date(raw) else {
            errors.add("due_back", INVALID_DATE);
            return Err(errors);
        };

        if due_back < today {
            errors.add("due_back", "Invalid date - renewal in past");
        } else if due_back > today + MAX_RENEWAL_AHEAD {
            errors.add("due_back", "Invalid date - renewal more than 4 weeks ahead");
        }

        errors.into_result(|| due_back)
    }
}
