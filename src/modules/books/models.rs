use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub const MIN_YEAR: i32 = 1000;

/// A catalog record with lending status.
///
/// `reader` and `due_date` are set exactly when the book is lent out.
/// Deserialization accepts older records with a null year, missing text
/// fields or a due date that is not `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: u64,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub author: String,
    #[serde(default, deserialize_with = "year_or_none")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub isbn: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub description: String,
    pub is_available: bool,
    #[serde(default)]
    pub reader: Option<String>,
    #[serde(
        default,
        serialize_with = "iso_date::option::serialize",
        deserialize_with = "date_or_none"
    )]
    pub due_date: Option<Date>,
}

impl Book {
    /// Lent out with a due date strictly before `today`.
    pub fn is_overdue(&self, today: Date) -> bool {
        !self.is_available && self.due_date.is_some_and(|due| due < today)
    }

    fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.author.to_lowercase().contains(needle)
    }
}

/// The persisted document: `{ "books": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub books: Vec<Book>,
}

impl Catalog {
    pub fn next_id(&self) -> u64 {
        self.books.iter().map(|b| b.id).max().map_or(1, |max| max + 1)
    }

    pub fn find_mut(&mut self, id: u64) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.id == id)
    }
}

/// Descriptive fields shared by create and update, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub year: i32,
    pub isbn: String,
    pub description: String,
}

/// Raw create/edit form body as posted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl BookForm {
    /// Validate against the inclusive year range `MIN_YEAR..=current_year`.
    pub fn validate(self, current_year: i32) -> Result<BookFields, Vec<serde_json::Value>> {
        let mut problems = Vec::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            problems.push(json!({"field": "title", "error": "required"}));
        }

        let author = self.author.trim().to_string();
        if author.is_empty() {
            problems.push(json!({"field": "author", "error": "required"}));
        }

        let year = match self.year.trim().parse::<i32>() {
            Ok(year) if (MIN_YEAR..=current_year).contains(&year) => year,
            Ok(_) => {
                problems.push(json!({
                    "field": "year",
                    "error": format!("must be between {} and {}", MIN_YEAR, current_year)
                }));
                0
            }
            Err(_) => {
                problems.push(json!({"field": "year", "error": "required"}));
                0
            }
        };

        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(BookFields {
            title,
            author,
            year,
            isbn: trimmed_or_empty(self.isbn),
            description: trimmed_or_empty(self.description),
        })
    }
}

fn trimmed_or_empty(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Lend request body as sent by the AJAX client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendRequest {
    #[serde(default)]
    pub reader: String,
    #[serde(default)]
    pub due_date: String,
}

/// Validated lend input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    pub reader: String,
    pub due_date: Date,
}

impl LendRequest {
    pub fn validate(self) -> Result<Loan, Vec<serde_json::Value>> {
        let mut problems = Vec::new();

        let reader = self.reader.trim().to_string();
        if reader.is_empty() {
            problems.push(json!({"field": "reader", "error": "required"}));
        }

        let due_date = match Date::parse(
            self.due_date.trim(),
            time::macros::format_description!("[year]-[month]-[day]"),
        ) {
            Ok(date) => Some(date),
            Err(_) => {
                problems.push(json!({"field": "dueDate", "error": "expected YYYY-MM-DD"}));
                None
            }
        };

        match due_date {
            Some(due_date) if problems.is_empty() => Ok(Loan { reader, due_date }),
            _ => Err(problems),
        }
    }
}

/// List filters from the query string. Only the literal `true` enables a flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFilter {
    #[serde(default, deserialize_with = "flag", skip_serializing_if = "is_false")]
    pub available: bool,
    #[serde(default, deserialize_with = "flag", skip_serializing_if = "is_false")]
    pub overdue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl BookFilter {
    /// Keep the books matching every active filter, preserving storage order.
    pub fn apply(&self, books: Vec<Book>, today: Date) -> Vec<Book> {
        let needle = self
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        books
            .into_iter()
            .filter(|book| !self.available || book.is_available)
            .filter(|book| !self.overdue || book.is_overdue(today))
            .filter(|book| needle.as_deref().map_or(true, |n| book.matches_search(n)))
            .collect()
    }
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn year_or_none<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_i64)
        .and_then(|year| i32::try_from(year).ok()))
}

fn date_or_none<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        Date::parse(
            s.trim(),
            time::macros::format_description!("[year]-[month]-[day]"),
        )
        .ok()
    }))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref() == Some("true"))
}

fn is_false(value: &bool) -> bool {
    !*value
}
