//! Point-in-time captures of the bulletin board.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// A listing of finalized thread ids, as returned by the archive endpoint.
///
/// A finalized thread can no longer change, so a newly appearing id is safe
/// to fetch exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiveListing {
    /// When this listing was fetched
    pub captured_at: DateTime<Utc>,

    /// Thread ids present in the archive at capture time
    pub ids: BTreeSet<String>,
}

impl ArchiveListing {
    pub fn new(captured_at: DateTime<Utc>, ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            captured_at,
            ids: ids.into_iter().collect(),
        }
    }

    /// An empty listing, used when no previous capture exists.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse an archive payload: a JSON array of thread ids (numbers or
    /// strings). Anything else is a malformed response.
    pub fn from_payload(captured_at: DateTime<Utc>, payload: &Value) -> Result<Self> {
        let raw = payload
            .as_array()
            .ok_or_else(|| AppError::malformed("archive listing", "expected a JSON array"))?;

        let ids = raw
            .iter()
            .map(|v| match v {
                Value::Number(n) => Ok(n.to_string()),
                Value::String(s) => Ok(s.clone()),
                other => Err(AppError::malformed(
                    "archive listing",
                    format!("thread id is neither number nor string: {other}"),
                )),
            })
            .collect::<Result<BTreeSet<String>>>()?;

        Ok(Self { captured_at, ids })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One live-board poll record: the raw catalog plus the raw archive listing.
///
/// The catalog's reply previews are bounded by the platform, so this capture
/// is knowingly incomplete for replies; full threads come from the archive
/// sweep once they finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Unix epoch seconds at capture
    pub time: i64,

    /// Raw catalog payload
    pub catalog: Value,

    /// Raw archive payload
    pub archive: Value,
}
