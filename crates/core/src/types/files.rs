//! Actionable file notifications: duplicates and bookdrop arrivals

use super::lenient;
use serde::{Deserialize, Serialize};

/// A file detected as a duplicate of an existing book
///
/// Every field is optional on the wire. Unusable values decode as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateFile {
    #[serde(deserialize_with = "lenient::optional_u64")]
    pub library_id: Option<u64>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub library_name: Option<String>,
    #[serde(deserialize_with = "lenient::optional_u64")]
    pub file_id: Option<u64>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub file_name: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub full_path: Option<String>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub hash: Option<String>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: Option<String>,
}

impl DuplicateFile {
    /// Key used to recognise the same duplicate twice: file id, else path
    pub fn key(&self) -> Option<String> {
        self.file_id
            .map(|id| id.to_string())
            .or_else(|| self.full_path.clone())
    }
}

/// A file that landed in the bookdrop folder and awaits import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookdropFile {
    #[serde(deserialize_with = "lenient::optional_u64")]
    pub file_id: Option<u64>,
    #[serde(deserialize_with = "lenient::optional_string")]
    pub file_name: Option<String>,
    /// Files still pending review on the server
    #[serde(deserialize_with = "lenient::count")]
    pub pending_count: u32,
    /// Files known to the bookdrop on the server
    #[serde(deserialize_with = "lenient::count")]
    pub total_count: u32,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub last_updated_at: Option<String>,
}
