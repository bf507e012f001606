//! Request line parsing
//!
//! Lines are parsed from raw bytes so that a line with broken UTF-8 is just another
//! malformed request instead of an error on the input stream.

use keytag_common::protocol::{filename_for, TagAction, TagRequest};
use serde_json::{Map, Value};

/// Classification of one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Whitespace only; skipped without logging
    Blank,
    /// Valid request ready for the job queue
    Request(TagRequest),
    /// Malformed line
    Rejected(RejectedLine),
}

/// A line that could not become a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    /// Request id, when one could be salvaged
    pub id: Option<String>,

    /// Base name of the salvaged path (or "unknown")
    pub filename: String,

    /// Why the line was rejected
    pub reason: String,
}

impl RejectedLine {
    fn new(id: Option<String>, path: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename_for(path.unwrap_or_default()),
            reason: reason.into(),
        }
    }
}

/// Parse one line (without or with its trailing newline)
pub fn parse_line(line: &[u8]) -> ParsedLine {
    if line.iter().all(u8::is_ascii_whitespace) {
        return ParsedLine::Blank;
    }

    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => {
            return ParsedLine::Rejected(RejectedLine::new(
                None,
                None,
                format!("Invalid JSON: {}", e),
            ))
        }
    };

    let Value::Object(fields) = value else {
        return ParsedLine::Rejected(RejectedLine::new(
            None,
            None,
            "Request must be a JSON object",
        ));
    };

    match validate(&fields) {
        Ok(request) => ParsedLine::Request(request),
        Err(rejected) => ParsedLine::Rejected(rejected),
    }
}

fn validate(fields: &Map<String, Value>) -> Result<TagRequest, RejectedLine> {
    let id = string_field(fields, "id");
    let path = string_field(fields, "path");

    let Some(id) = id else {
        return Err(RejectedLine::new(None, path, "Missing or non-string field: id"));
    };
    let id = id.to_string();

    let Some(path) = path else {
        return Err(RejectedLine::new(
            Some(id),
            None,
            "Missing or non-string field: path",
        ));
    };

    let action = match fields.get("action") {
        None | Some(Value::Null) => TagAction::default(),
        Some(value) => match serde_json::from_value::<TagAction>(value.clone()) {
            Ok(action) => action,
            Err(_) => {
                let reason = match value.as_str() {
                    Some(name) => format!("Unknown action: {}", name),
                    None => "Field action must be a string".to_string(),
                };
                return Err(RejectedLine::new(Some(id), Some(path), reason));
            }
        },
    };

    let key = string_field(fields, "key").map(str::to_string);
    if action == TagAction::Write && key.is_none() {
        return Err(RejectedLine::new(
            Some(id),
            Some(path),
            "Missing or non-string field: key",
        ));
    }

    Ok(TagRequest {
        id,
        path: path.to_string(),
        key,
        action,
    })
}

fn string_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(Value::as_str)
}
