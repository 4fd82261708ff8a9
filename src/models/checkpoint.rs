//! Durable checkpoint records.
//!
//! The only state carried across invocations: one small JSON file per
//! (platform, content type) with the last committed watermark, and one per
//! platform with the last archive listing. Checkpoints are read whole and
//! replaced whole (temp file + rename), never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ContentType;

/// Last committed watermark for a harvester.
///
/// Everything with `created_at < committed` is considered already collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watermark {
    pub platform: String,
    pub content_type: ContentType,

    /// The resumption point for the next run (inclusive lower bound)
    pub committed: DateTime<Utc>,

    /// When this record was written
    pub updated_at: DateTime<Utc>,
}

impl Watermark {
    pub fn new(
        platform: impl Into<String>,
        content_type: ContentType,
        committed: DateTime<Utc>,
    ) -> Self {
        Self {
            platform: platform.into(),
            content_type,
            committed,
            updated_at: Utc::now(),
        }
    }
}
