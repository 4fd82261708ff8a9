//! Collected item model.
//!
//! Upstream payloads are kept as opaque JSON and passed through to storage
//! unmodified. Only the identifier and creation timestamp are extracted,
//! through narrow configured accessors, because upstream schemas are
//! versioned independently of this system.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Kind of item a search endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Submission,
    Comment,
    Post,
    Ad,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Comment => "comment",
            Self::Post => "post",
            Self::Ad => "ad",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submission" => Ok(Self::Submission),
            "comment" => Ok(Self::Comment),
            "post" => Ok(Self::Post),
            "ad" => Ok(Self::Ad),
            other => Err(AppError::validation(format!(
                "Unknown content type '{other}' (expected submission, comment, post, or ad)"
            ))),
        }
    }
}

/// How a platform encodes timestamps, in payload fields and request params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TimeEncoding {
    /// Unix epoch seconds as a JSON number (or numeric string).
    EpochSeconds,
    /// A chrono format string, e.g. `%Y-%m-%dT%H:%M:%S`. Times are UTC.
    Formatted { format: String },
}

impl TimeEncoding {
    /// Render a timestamp the way this platform expects it in a request.
    pub fn encode(&self, ts: DateTime<Utc>) -> String {
        match self {
            Self::EpochSeconds => ts.timestamp().to_string(),
            Self::Formatted { format } => ts.format(format).to_string(),
        }
    }

    /// Parse a timestamp out of a payload field.
    pub fn decode(&self, value: &Value) -> Option<DateTime<Utc>> {
        match self {
            Self::EpochSeconds => {
                let secs = match value {
                    Value::Number(n) => n.as_i64()?,
                    Value::String(s) => s.parse().ok()?,
                    _ => return None,
                };
                DateTime::from_timestamp(secs, 0)
            }
            Self::Formatted { format } => {
                let s = value.as_str()?;
                NaiveDateTime::parse_from_str(s, format)
                    .ok()
                    .map(|naive| naive.and_utc())
            }
        }
    }
}

/// Narrow accessors into an otherwise opaque item payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFields {
    /// JSON pointer to the item identifier, e.g. `/id`
    pub id_pointer: String,

    /// JSON pointer to the creation timestamp, e.g. `/created_utc`
    pub time_pointer: String,

    /// Encoding of the timestamp field
    pub time_encoding: TimeEncoding,
}

impl ItemFields {
    /// Extract the two required fields from a raw payload.
    ///
    /// A payload missing either field is a malformed response: without a
    /// timestamp no safe watermark advance exists.
    pub fn extract(&self, payload: Value) -> Result<Item> {
        let id = match payload.pointer(&self.id_pointer) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(AppError::malformed(
                    "item",
                    format!("no identifier at {}", self.id_pointer),
                ));
            }
        };

        let created_at = payload
            .pointer(&self.time_pointer)
            .and_then(|v| self.time_encoding.decode(v))
            .ok_or_else(|| {
                AppError::malformed("item", format!("no timestamp at {}", self.time_pointer))
            })?;

        Ok(Item {
            id,
            created_at,
            payload,
        })
    }
}

/// One collected item: identifier, creation time, raw payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Opaque identifier, used for logging and artifact naming only
    pub id: String,

    /// Creation timestamp, second resolution
    pub created_at: DateTime<Utc>,

    /// Untouched upstream payload
    pub payload: Value,
}
