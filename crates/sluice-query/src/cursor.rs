//! Opaque keyset pagination tokens.
//!
//! A token is the base64url (unpadded) encoding of a small JSON document
//! naming the sort column, the last value seen and the direction.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sluice_core::Value;

use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorData {
    #[serde(rename = "c")]
    pub column: String,
    #[serde(rename = "v", default)]
    pub value: Value,
    #[serde(rename = "d", default)]
    pub desc: bool,
}

impl CursorData {
    pub fn new(column: impl Into<String>, value: impl Into<Value>, desc: bool) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            desc,
        }
    }

    /// Comparison that selects rows strictly after the cursor position.
    pub fn comparison(&self) -> &'static str {
        if self.desc { "<" } else { ">" }
    }
}

pub fn encode_cursor(cursor: &CursorData) -> String {
    // Serializing a struct of strings, bools and plain values cannot fail.
    let json = serde_json::to_vec(cursor).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

pub fn decode_cursor(token: &str) -> Result<CursorData, QueryError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| QueryError::InvalidCursor(format!("not base64url: {}", e)))?;
    let cursor: CursorData = serde_json::from_slice(&bytes)
        .map_err(|e| QueryError::InvalidCursor(format!("malformed payload: {}", e)))?;
    if cursor.column.is_empty() {
        return Err(QueryError::InvalidCursor("missing column".to_string()));
    }
    if cursor.value.is_null() {
        return Err(QueryError::InvalidCursor("null sort value".to_string()));
    }
    Ok(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_keeps_value_type() {
        for cursor in [
            CursorData::new("id", 42, false),
            CursorData::new("created_at", "2024-05-01T10:00:00Z", true),
            CursorData::new("score", 1.5, false),
        ] {
            let token = encode_cursor(&cursor);
            assert!(!token.contains('='));
            assert_eq!(decode_cursor(&token).unwrap(), cursor);
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode_cursor("%%%"), Err(QueryError::InvalidCursor(_))));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(decode_cursor(&not_json), Err(QueryError::InvalidCursor(_))));
    }

    #[test]
    fn empty_column_is_rejected() {
        let token = URL_SAFE_NO_PAD.encode(br#"{"c":"","v":1,"d":false}"#);
        assert!(matches!(decode_cursor(&token), Err(QueryError::InvalidCursor(_))));
    }

    #[test]
    fn null_or_missing_value_is_rejected() {
        for payload in [&br#"{"c":"id","v":null}"#[..], &br#"{"c":"id"}"#[..]] {
            let token = URL_SAFE_NO_PAD.encode(payload);
            assert_eq!(
                decode_cursor(&token),
                Err(QueryError::InvalidCursor("null sort value".to_string()))
            );
        }
    }

    #[test]
    fn direction_controls_comparison() {
        assert_eq!(CursorData::new("id", 1, false).comparison(), ">");
        assert_eq!(CursorData::new("id", 1, true).comparison(), "<");
    }
}
