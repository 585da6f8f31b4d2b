//! Book and book metadata as they appear on the wire

use super::lenient;
use serde::{Deserialize, Serialize};

/// Server-assigned book identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(u64);

impl BookId {
    /// Wraps a raw server id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BookId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A book in a library
///
/// Only `id` is required. Everything else degrades to `None`/empty when the
/// server omits it, sends null, or sends a value of the wrong type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub book_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_u64")]
    pub library_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub file_sub_path: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_u64")]
    pub file_size_kb: Option<u64>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub added_on: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub last_read_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::metadata")]
    pub metadata: Option<BookMetadata>,
}

impl Book {
    /// Creates a book with only an id
    pub fn new(id: u64) -> Self {
        Self {
            id: BookId::new(id),
            book_type: None,
            library_id: None,
            file_name: None,
            file_sub_path: None,
            file_size_kb: None,
            added_on: None,
            last_read_time: None,
            metadata: None,
        }
    }

    /// Sets the metadata title (builder style)
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BookMetadata::default)
            .title = Some(title.into());
        self
    }

    /// Sets the library (builder style)
    pub fn with_library(mut self, library_id: u64) -> Self {
        self.library_id = Some(library_id);
        self
    }

    /// Best display title: metadata title, then file name, then the id
    pub fn display_title(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.title.clone())
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.file_name.clone())
            .unwrap_or_else(|| format!("Book #{}", self.id))
    }
}

/// Descriptive metadata for a book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookMetadata {
    #[serde(deserialize_with = "lenient::optional_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub subtitle: Option<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub authors: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub categories: Vec<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub publisher: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub published_date: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub isbn13: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub isbn10: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub language: Option<String>,
    #[serde(deserialize_with = "lenient::optional_u32")]
    pub page_count: Option<u32>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub series_name: Option<String>,
    #[serde(deserialize_with = "lenient::optional_f32")]
    pub series_number: Option<f32>,
}
