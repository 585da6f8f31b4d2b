// crates/core/src/decode.rs
//! Payload decoders
//!
//! One pure function per topic turns a raw message body into a typed
//! [`Notification`]. Bodies are JSON with no schema versioning, so every field
//! except the ones a sink keys on is treated as optional and defaulted.

use crate::error::{DecodeError, DecodeResult};
use crate::notification::Notification;
use crate::topic::Topic;
use crate::types::{
    Book, BookId, BookdropFile, DuplicateFile, LogNotification, MetadataBatchProgress,
    MetadataBatchStatus, Severity, TaskProgress, TaskStatus,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Signature shared by all decoders
pub type Decoder = fn(&str) -> DecodeResult<Notification>;

/// Returns the decoder registered for a topic
pub fn decoder_for(topic: Topic) -> Decoder {
    match topic {
        Topic::BookAdd => decode_book_added,
        Topic::BooksRemove => decode_books_removed,
        Topic::BookMetadataUpdate => decode_book_metadata_updated,
        Topic::BookMetadataBatchUpdate => decode_book_metadata_batch_updated,
        Topic::BookMetadataBatchProgress => decode_metadata_batch_progress,
        Topic::Log => decode_log,
        Topic::TaskProgress => decode_task_progress,
        Topic::DuplicateFile => decode_duplicate_file,
        Topic::BookdropFile => decode_bookdrop_file,
    }
}

/// Decodes a body received on `topic`
pub fn decode(topic: Topic, body: &str) -> DecodeResult<Notification> {
    decoder_for(topic)(body)
}

pub fn decode_book_added(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    Ok(Notification::BookAdded(book_from_value(value)?))
}

pub fn decode_books_removed(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    let items = expect_array(value)?;
    let ids = items
        .iter()
        .map(book_id_from_value)
        .collect::<DecodeResult<Vec<_>>>()?;
    Ok(Notification::BooksRemoved(ids))
}

pub fn decode_book_metadata_updated(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    Ok(Notification::BookMetadataUpdated(book_from_value(value)?))
}

/// Entries without a usable id are skipped; the rest of the batch still applies.
pub fn decode_book_metadata_batch_updated(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    let items = expect_array(value)?;
    let total = items.len();
    let books: Vec<Book> = items
        .into_iter()
        .filter_map(|item| match book_from_value(item) {
            Ok(book) => Some(book),
            Err(e) => {
                log::warn!("Skipping book in batch update: {}", e);
                None
            }
        })
        .collect();

    if total > 0 && books.is_empty() {
        return Err(DecodeError::InvalidField {
            field: "books",
            reason: format!("none of {} entries could be decoded", total),
        });
    }
    Ok(Notification::BookMetadataBatchUpdated(books))
}

pub fn decode_metadata_batch_progress(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    let obj = expect_object(&value)?;

    let task_id = required_id(obj, "taskId")?;
    let completed = u32_field(obj, "completed");
    let total = u32_field(obj, "total");
    let status = match obj.get("status") {
        Some(Value::String(s)) => serde_json::from_value(Value::String(s.to_uppercase()))?,
        _ if total > 0 && completed >= total => MetadataBatchStatus::Completed,
        _ => MetadataBatchStatus::InProgress,
    };
    let review = bool_field(obj, "review")
        .or_else(|| bool_field(obj, "isReview"))
        .unwrap_or(false);

    Ok(Notification::MetadataBatchProgress(MetadataBatchProgress {
        task_id,
        completed,
        total,
        message: string_field(obj, "message"),
        status,
        review,
    }))
}

pub fn decode_log(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    let obj = expect_object(&value)?;

    let severity = match string_field(obj, "severity") {
        Some(s) => parse_severity(&s),
        None => Severity::Info,
    };
    let timestamp = obj.get("timestamp").and_then(parse_timestamp);

    Ok(Notification::Log(LogNotification {
        timestamp,
        message: string_field(obj, "message").unwrap_or_default(),
        severity,
    }))
}

pub fn decode_task_progress(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    let obj = expect_object(&value)?;

    let task_id = required_id(obj, "taskId")?;
    let progress = obj
        .get("progress")
        .and_then(Value::as_f64)
        .map(|p| p.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(0);
    let task_status = match obj.get("taskStatus") {
        Some(Value::String(s)) => serde_json::from_value(Value::String(s.to_uppercase()))?,
        _ if progress >= 100 => TaskStatus::Completed,
        _ => TaskStatus::InProgress,
    };

    Ok(Notification::TaskProgress(TaskProgress {
        task_id,
        task_type: string_field(obj, "taskType"),
        message: string_field(obj, "message"),
        progress,
        task_status,
    }))
}

/// Only a missing key (no `fileId` and no `fullPath`) rejects the notice.
pub fn decode_duplicate_file(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    expect_object(&value)?;
    let file: DuplicateFile = serde_json::from_value(value)?;
    if file.key().is_none() {
        return Err(DecodeError::MissingField("fileId"));
    }
    Ok(Notification::DuplicateFile(file))
}

pub fn decode_bookdrop_file(body: &str) -> DecodeResult<Notification> {
    let value = parse_body(body)?;
    expect_object(&value)?;
    let file: BookdropFile = serde_json::from_value(value)?;
    Ok(Notification::BookdropFile(file))
}

fn parse_body(body: &str) -> DecodeResult<Value> {
    if body.trim().is_empty() {
        return Err(DecodeError::EmptyBody);
    }
    Ok(serde_json::from_str(body)?)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_object(value: &Value) -> DecodeResult<&Map<String, Value>> {
    value.as_object().ok_or(DecodeError::UnexpectedShape {
        expected: "object",
        actual: kind_of(value),
    })
}

fn expect_array(value: Value) -> DecodeResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(DecodeError::UnexpectedShape {
            expected: "array",
            actual: kind_of(&other),
        }),
    }
}

fn book_from_value(mut value: Value) -> DecodeResult<Book> {
    let id = match expect_object(&value)?.get("id") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("id")),
        Some(id) => book_id_from_value(id)?,
    };
    // Normalise string ids so the typed parse below accepts them
    value["id"] = Value::from(id.value());
    Ok(serde_json::from_value(value)?)
}

fn book_id_from_value(value: &Value) -> DecodeResult<BookId> {
    match value {
        Value::Number(n) => n.as_u64().map(BookId::new).ok_or_else(|| DecodeError::InvalidField {
            field: "id",
            reason: format!("{} is not a non-negative integer", n),
        }),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map(BookId::new)
            .map_err(|e| DecodeError::InvalidField {
                field: "id",
                reason: format!("{:?}: {}", s, e),
            }),
        other => Err(DecodeError::InvalidField {
            field: "id",
            reason: format!("expected number, got {}", kind_of(other)),
        }),
    }
}

/// Ids may arrive as strings or numbers; both become strings.
fn required_id(obj: &Map<String, Value>, key: &'static str) -> DecodeResult<String> {
    string_field(obj, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or(DecodeError::MissingField(key))
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn u32_field(obj: &Map<String, Value>, key: &str) -> u32 {
    obj.get(key)
        .and_then(Value::as_f64)
        .map(|n| n.clamp(0.0, u32::MAX as f64) as u32)
        .unwrap_or(0)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

fn parse_severity(raw: &str) -> Severity {
    match raw.trim().to_ascii_uppercase().as_str() {
        "WARN" | "WARNING" => Severity::Warn,
        "ERROR" | "FATAL" => Severity::Error,
        _ => Severity::Info,
    }
}

/// RFC 3339, naive ISO-8601 (taken as UTC) or epoch milliseconds
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_topic_has_a_decoder() {
        for topic in Topic::ALL {
            let result = decode(topic, "");
            assert!(matches!(result, Err(DecodeError::EmptyBody)), "{}", topic);
        }
    }

    #[test]
    fn test_decoded_topic_matches_route() {
        let cases = [
            (Topic::BookAdd, r#"{"id": 1}"#),
            (Topic::BooksRemove, "[1, 2]"),
            (Topic::BookMetadataUpdate, r#"{"id": 1}"#),
            (Topic::BookMetadataBatchUpdate, r#"[{"id": 1}]"#),
            (Topic::BookMetadataBatchProgress, r#"{"taskId": "j"}"#),
            (Topic::Log, r#"{"message": "hi"}"#),
            (Topic::TaskProgress, r#"{"taskId": "t"}"#),
            (Topic::DuplicateFile, r#"{"fileId": 3}"#),
            (Topic::BookdropFile, r#"{}"#),
        ];
        for (topic, body) in cases {
            let n = decode(topic, body).unwrap();
            assert_eq!(n.topic(), topic);
        }
    }

    #[test]
    fn test_book_requires_id() {
        let err = decode_book_added(r#"{"fileName": "a.epub"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("id")));
        let err = decode_book_added(r#"{"id": null}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("id")));
    }

    #[test]
    fn test_book_wrong_shape() {
        let err = decode_book_metadata_updated("[1]").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedShape {
                expected: "object",
                actual: "array"
            }
        ));
    }

    #[test]
    fn test_books_removed_accepts_string_ids() {
        match decode_books_removed(r#"[1, "2", " 3 "]"#).unwrap() {
            Notification::BooksRemoved(ids) => {
                assert_eq!(ids, vec![BookId::new(1), BookId::new(2), BookId::new(3)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_books_removed_rejects_garbage_id() {
        let err = decode_books_removed(r#"[1, "abc"]"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "id", .. }));
        let err = decode_books_removed(r#"[-4]"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "id", .. }));
    }

    #[test]
    fn test_batch_update_skips_bad_entries() {
        match decode_book_metadata_batch_updated(r#"[{"id": 1}, {"title": "x"}, {"id": 2}]"#)
            .unwrap()
        {
            Notification::BookMetadataBatchUpdated(books) => {
                let ids: Vec<u64> = books.iter().map(|b| b.id.value()).collect();
                assert_eq!(ids, vec![1, 2]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_batch_update_all_bad_fails() {
        let err = decode_book_metadata_batch_updated(r#"[{"title": "x"}]"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "books", .. }));
        assert!(decode_book_metadata_batch_updated("[]").is_ok());
    }

    #[test]
    fn test_task_progress_scenario_payload() {
        let n = decode_task_progress(r#"{"taskId":"t1", "progress":40, "taskStatus":"IN_PROGRESS"}"#)
            .unwrap();
        assert_eq!(
            n,
            Notification::TaskProgress(TaskProgress::new("t1", 40, TaskStatus::InProgress))
        );
    }

    #[test]
    fn test_task_progress_defaults() {
        match decode_task_progress(r#"{"taskId": 17, "progress": 100}"#).unwrap() {
            Notification::TaskProgress(p) => {
                assert_eq!(p.task_id, "17");
                assert_eq!(p.task_status, TaskStatus::Completed);
                assert!(p.message.is_none());
                assert!(p.task_type.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        match decode_task_progress(r#"{"taskId": "t", "progress": 180.6, "taskStatus": "paused"}"#)
            .unwrap()
        {
            Notification::TaskProgress(p) => {
                assert_eq!(p.progress, 100);
                assert_eq!(p.task_status, TaskStatus::Unknown);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_task_progress_requires_task_id() {
        let err = decode_task_progress(r#"{"progress": 5}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("taskId")));
        let err = decode_task_progress(r#"{"taskId": "  "}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("taskId")));
    }

    #[test]
    fn test_metadata_batch_progress() {
        let body = r#"{"taskId":"job-1","completed":3,"total":10,"message":"Processing 'Dune'","status":"IN_PROGRESS","isReview":true}"#;
        match decode_metadata_batch_progress(body).unwrap() {
            Notification::MetadataBatchProgress(p) => {
                assert_eq!(p.task_id, "job-1");
                assert_eq!(p.completed, 3);
                assert_eq!(p.total, 10);
                assert_eq!(p.status, MetadataBatchStatus::InProgress);
                assert!(p.review);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_metadata_batch_progress_infers_completion() {
        match decode_metadata_batch_progress(r#"{"taskId":"j","completed":4,"total":4}"#).unwrap() {
            Notification::MetadataBatchProgress(p) => {
                assert_eq!(p.status, MetadataBatchStatus::Completed);
                assert!(!p.review);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_log_normalisation() {
        match decode_log(r#"{"message":"Started processing library: Comics","severity":"warning","timestamp":"2024-05-01T10:15:30"}"#).unwrap() {
            Notification::Log(log) => {
                assert_eq!(log.severity, Severity::Warn);
                assert_eq!(log.message, "Started processing library: Comics");
                let ts = log.timestamp.unwrap();
                assert_eq!(ts.to_rfc3339(), "2024-05-01T10:15:30+00:00");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_log_tolerates_missing_fields() {
        match decode_log(r#"{"timestamp":"yesterday"}"#).unwrap() {
            Notification::Log(log) => {
                assert_eq!(log.message, "");
                assert_eq!(log.severity, Severity::Info);
                assert!(log.timestamp.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_log_epoch_millis_timestamp() {
        match decode_log(r#"{"message":"m","timestamp":0}"#).unwrap() {
            Notification::Log(log) => {
                assert_eq!(log.timestamp.unwrap().timestamp(), 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_file_needs_a_key() {
        let err = decode_duplicate_file(r#"{"fileName":"a.epub"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("fileId")));

        match decode_duplicate_file(r#"{"fullPath":"/lib/a.epub","hash":"abc"}"#).unwrap() {
            Notification::DuplicateFile(d) => assert_eq!(d.hash.as_deref(), Some("abc")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_book_with_null_and_mistyped_metadata() {
        let n = decode_book_added(r#"{"id":1,"metadata":{"title":"Dune","authors":null}}"#).unwrap();
        match n {
            Notification::BookAdded(book) => {
                assert_eq!(book.display_title(), "Dune");
                assert!(book.metadata.unwrap().authors.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = r#"{"id":"2","libraryId":"x","fileSizeKb":null,"metadata":{"categories":7,"seriesNumber":"2.5"}}"#;
        match decode_book_metadata_updated(body).unwrap() {
            Notification::BookMetadataUpdated(book) => {
                assert_eq!(book.id, BookId::new(2));
                assert!(book.library_id.is_none());
                let metadata = book.metadata.unwrap();
                assert!(metadata.categories.is_empty());
                assert_eq!(metadata.series_number, Some(2.5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_batch_update_keeps_entries_with_bad_optionals() {
        let body = r#"[{"id":1,"metadata":{"authors":[null]}},{"id":2,"addedOn":false}]"#;
        match decode_book_metadata_batch_updated(body).unwrap() {
            Notification::BookMetadataBatchUpdated(books) => assert_eq!(books.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_file_tolerates_mistyped_fields() {
        let body = r#"{"fileId":3,"fileName":"a.epub","timestamp":1714558530000}"#;
        match decode_duplicate_file(body).unwrap() {
            Notification::DuplicateFile(d) => {
                assert_eq!(d.file_id, Some(3));
                assert_eq!(d.timestamp.as_deref(), Some("2024-05-01T10:15:30+00:00"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = r#"{"fileId":"9","libraryId":"lib","libraryName":null,"hash":12}"#;
        match decode_duplicate_file(body).unwrap() {
            Notification::DuplicateFile(d) => {
                assert_eq!(d.key(), Some("9".to_string()));
                assert!(d.library_id.is_none());
                assert!(d.library_name.is_none());
                assert_eq!(d.hash.as_deref(), Some("12"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = decode_duplicate_file(r#"{"fileId":"abc","fullPath":null}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("fileId")));
    }

    #[test]
    fn test_bookdrop_file_tolerates_mistyped_fields() {
        let body = r#"{"fileId":"4","fileName":["x"],"pendingCount":2.0,"totalCount":"many","lastUpdatedAt":1714558530000}"#;
        match decode_bookdrop_file(body).unwrap() {
            Notification::BookdropFile(f) => {
                assert_eq!(f.file_id, Some(4));
                assert!(f.file_name.is_none());
                assert_eq!(f.pending_count, 2);
                assert_eq!(f.total_count, 0);
                assert!(f.last_updated_at.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = decode_bookdrop_file("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        let err = decode_bookdrop_file("[]").unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedShape { .. }));
    }
}
