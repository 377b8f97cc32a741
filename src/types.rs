use std::fmt::Write as _;

use chrono::{NaiveDateTime, Timelike};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be stored in a result row or bound to a statement placeholder.
///
/// ```rust
/// use clickhouse_session::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(1) => Some(true),
            RowValues::Int(0) => Some(false),
            _ => None,
        }
    }

    /// Render this value as a ClickHouse SQL literal suitable for inlining into a query.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            RowValues::Int(i) => i.to_string(),
            RowValues::Float(f) if f.is_nan() => "nan".to_string(),
            RowValues::Float(f) if f.is_infinite() => {
                if f.is_sign_negative() {
                    "-inf".to_string()
                } else {
                    "inf".to_string()
                }
            }
            RowValues::Float(f) => f.to_string(),
            RowValues::Text(s) => quote_string(s),
            RowValues::Bool(b) => b.to_string(),
            RowValues::Timestamp(ts) => {
                let rendered = if ts.nanosecond() == 0 {
                    ts.format("%Y-%m-%d %H:%M:%S").to_string()
                } else {
                    ts.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
                };
                quote_string(&rendered)
            }
            RowValues::Null => "NULL".to_string(),
            RowValues::JSON(json) => quote_string(&json.to_string()),
            RowValues::Blob(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2 + 9);
                hex.push_str("unhex('");
                for b in bytes {
                    let _ = write!(hex, "{b:02X}");
                }
                hex.push_str("')");
                hex
            }
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Transaction isolation level a caller may request.
///
/// ClickHouse has no isolation; the level is recorded so callers that insist on one
/// get a consistent answer back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Reported outside compliance mode; cannot be requested.
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// What happens to open result cursors when the logical transaction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Holdability {
    #[default]
    HoldOverCommit,
    CloseAtCommit,
}

/// The client-info properties forwarded to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientInfoProperty {
    /// Name of the application using the connection.
    ApplicationName,
    CustomHttpHeaders,
    CustomHttpParameters,
}

impl ClientInfoProperty {
    pub const ALL: [ClientInfoProperty; 3] = [
        ClientInfoProperty::ApplicationName,
        ClientInfoProperty::CustomHttpHeaders,
        ClientInfoProperty::CustomHttpParameters,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ClientInfoProperty::ApplicationName => "ApplicationName",
            ClientInfoProperty::CustomHttpHeaders => "CustomHttpHeaders",
            ClientInfoProperty::CustomHttpParameters => "CustomHttpParameters",
        }
    }

    /// Look a property up by its wire name; unknown names yield `None`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn literals_escape_quotes_and_backslashes() {
        assert_eq!(
            RowValues::Text("it's a \\ path".into()).to_sql_literal(),
            "'it\\'s a \\\\ path'"
        );
        assert_eq!(RowValues::Null.to_sql_literal(), "NULL");
        assert_eq!(RowValues::Int(-7).to_sql_literal(), "-7");
        assert_eq!(RowValues::Float(f64::NAN).to_sql_literal(), "nan");
        assert_eq!(RowValues::Blob(vec![0x0a, 0xff]).to_sql_literal(), "unhex('0AFF')");
    }

    #[test]
    fn timestamp_literal() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|d| d.and_hms_opt(13, 5, 9))
            .expect("valid timestamp");
        assert_eq!(
            RowValues::Timestamp(ts).to_sql_literal(),
            "'2024-02-29 13:05:09'"
        );
    }

    #[test]
    fn client_info_names_round_trip() {
        for prop in ClientInfoProperty::ALL {
            assert_eq!(ClientInfoProperty::from_name(prop.name()), Some(prop));
        }
        assert_eq!(ClientInfoProperty::from_name("ClientUser"), None);
    }
}
